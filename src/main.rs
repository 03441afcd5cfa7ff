use anyhow::Result;
use clap::Parser;
use quality_governor::{
    EventBus, EventFilter, GovernorBuilder, GovernorConfig, GovernorCore, GovernorStats,
    QualityLevel, QualitySettings, SampleQueue, ThresholdPolicy,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Trace replayed when `--trace` is not given: a frame-rate collapse followed by recovery
const DEMO_TRACE: [f64; 12] = [
    60.0, 58.0, 44.0, 41.0, 38.0, 22.0, 18.0, 25.0, 48.0, 61.0, 64.0, 62.0,
];

#[derive(Parser, Debug)]
#[command(name = "quality-governor")]
#[command(about = "Adaptive rendering quality governor driven by measured frame rate")]
#[command(version)]
#[command(long_about = "Replays a frame-rate trace through the adaptive quality governor and \
reports every quality transition. Runs the state machine directly by default, or the full \
timer-driven governor with --realtime.")]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "quality-governor.toml",
        help = "Path to TOML configuration file"
    )]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Frame-rate samples to replay
    #[arg(
        long,
        value_name = "FPS",
        value_delimiter = ',',
        num_args = 1..,
        help = "Comma-separated FPS samples to replay"
    )]
    trace: Vec<f64>,

    /// Drive the timer-based governor instead of the bare state machine
    #[arg(long, help = "Replay the trace through the timer-driven governor")]
    realtime: bool,

    /// Sampling interval override for --realtime
    #[arg(long, value_name = "MS", help = "Sampling interval in milliseconds for --realtime")]
    interval_ms: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Transition {
    step: usize,
    previous: QualityLevel,
    level: QualityLevel,
    average_fps: f64,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    mode: &'static str,
    samples: usize,
    initial_level: QualityLevel,
    final_level: QualityLevel,
    final_average_fps: f64,
    settings: QualitySettings,
    transitions: Vec<Transition>,
    stats: GovernorStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting quality governor v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match GovernorConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let trace = if args.trace.is_empty() {
        info!("No trace given, replaying the built-in demo trace");
        DEMO_TRACE.to_vec()
    } else {
        args.trace.clone()
    };

    let summary = if args.realtime {
        run_realtime(&config, &trace, args.interval_ms).await?
    } else {
        run_offline(&config, &trace)
    };

    print_summary(&summary, args.json)?;

    Ok(())
}

/// Feed the trace straight into the state machine, one sample per step
fn run_offline(config: &GovernorConfig, trace: &[f64]) -> RunSummary {
    let adaptive = &config.adaptive;
    let mut core = GovernorCore::new(
        adaptive.initial_level,
        adaptive.history_capacity,
        ThresholdPolicy::new(config.thresholds, adaptive.min_samples),
        config.profiles.to_profiles(),
    );

    let mut transitions = Vec::new();
    for (step, &sample) in trace.iter().enumerate() {
        let outcome = core.process_sample(sample);
        debug!("Step {}: {:?}", step, outcome);
        if let Some(change) = outcome.change() {
            transitions.push(Transition {
                step,
                previous: change.previous,
                level: change.level,
                average_fps: change.average_fps,
            });
        }
    }

    RunSummary {
        mode: "offline",
        samples: trace.len(),
        initial_level: adaptive.initial_level,
        final_level: core.level(),
        final_average_fps: core.history().average(),
        settings: *core.settings(),
        transitions,
        stats: core.stats().clone(),
    }
}

/// Queue the trace behind a live governor and let its timer consume it
async fn run_realtime(
    config: &GovernorConfig,
    trace: &[f64],
    interval_ms: Option<u64>,
) -> Result<RunSummary> {
    let queue = Arc::new(SampleQueue::new());
    queue.extend(trace.iter().copied());

    let event_bus = Arc::new(EventBus::from_config(&config.events));

    let mut builder = GovernorBuilder::from_config(config)
        .source(queue.clone())
        .event_bus(Arc::clone(&event_bus));
    if let Some(ms) = interval_ms {
        builder = builder.sample_interval(Duration::from_millis(ms));
    }
    let governor = builder.build()?;

    let mut events = event_bus.subscribe_filtered(EventFilter::All, "cli");
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("Event: {}", event.description());
        }
    });

    let transitions = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&transitions);
    let steps = Arc::clone(&queue);
    let total = trace.len();
    governor.subscribe_fn(move |change| {
        info!(
            "Quality {} -> {} at {:.1} fps",
            change.previous, change.level, change.average_fps
        );
        sink.lock().push(Transition {
            step: total - steps.len() - 1,
            previous: change.previous,
            level: change.level,
            average_fps: change.average_fps,
        });
    });

    let interval = governor.sample_interval();
    info!(
        "Replaying {} samples every {:?} through governor {}",
        total,
        interval,
        governor.id()
    );

    governor.start()?;
    // The first tick fires one interval after start
    tokio::time::sleep(interval * total as u32 + interval / 2).await;
    governor.stop();

    if !queue.is_empty() {
        error!("{} samples were left unconsumed", queue.len());
    }

    let final_level = governor.level();
    let final_average_fps = governor.average_fps();
    let settings = *governor.settings();
    let stats = governor.stats();
    drop(governor);
    event_logger.abort();

    let transitions = std::mem::take(&mut *transitions.lock());

    Ok(RunSummary {
        mode: "realtime",
        samples: total,
        initial_level: config.adaptive.initial_level,
        final_level,
        final_average_fps,
        settings,
        transitions,
        stats,
    })
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Mode:            {}", summary.mode);
    println!("Samples:         {}", summary.samples);
    println!("Initial level:   {}", summary.initial_level);
    println!("Final level:     {}", summary.final_level);
    println!("Average FPS:     {:.1}", summary.final_average_fps);
    println!(
        "Settings:        shadow map {}, antialias {}, parallax {}, auto-rotate {}",
        summary.settings.shadow_map_size,
        summary.settings.antialias,
        summary.settings.parallax,
        summary.settings.auto_rotate
    );
    println!("Transitions:     {}", summary.transitions.len());
    for t in &summary.transitions {
        println!(
            "  step {:>3}: {} -> {} ({:.1} fps)",
            t.step, t.previous, t.level, t.average_fps
        );
    }

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quality_governor={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Quality governor configuration");
    println!("# Every key may be overridden with QUALITY_GOVERNOR_<SECTION>__<KEY>");
    println!();
    print!("{}", GovernorConfig::default().to_toml()?);
    Ok(())
}
