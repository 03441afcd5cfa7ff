use crate::config::MonitorConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Source of frames-per-second samples pulled once per governor tick
///
/// `None` means no new measurement is available (render loop stalled or not
/// yet measured). It is never treated as a zero reading.
pub trait FrameRateSource: Send + Sync {
    fn sample(&self) -> Option<f64>;
}

impl<F> FrameRateSource for F
where
    F: Fn() -> Option<f64> + Send + Sync,
{
    fn sample(&self) -> Option<f64> {
        self()
    }
}

/// Push-style source: producers enqueue samples, each tick takes the oldest
#[derive(Debug, Default)]
pub struct SampleQueue {
    pending: Mutex<VecDeque<f64>>,
}

impl SampleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, fps: f64) {
        self.pending.lock().push_back(fps);
    }

    pub fn extend<I: IntoIterator<Item = f64>>(&self, samples: I) {
        self.pending.lock().extend(samples);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl FrameRateSource for SampleQueue {
    fn sample(&self) -> Option<f64> {
        self.pending.lock().pop_front()
    }
}

/// Coarse classification of the measured frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceStatus {
    /// At or above the target frame rate
    Excellent,
    /// Between the warning threshold and the target
    Good,
    /// Below the warning threshold
    Poor,
}

impl PerformanceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PerformanceStatus::Excellent => "Excellent",
            PerformanceStatus::Good => "Good",
            PerformanceStatus::Poor => "Poor",
        }
    }
}

/// Snapshot of the most recent measurement window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameMetrics {
    /// Frames per second, rounded to the nearest integer
    pub fps: f64,
    /// Mean frame time in milliseconds
    pub frame_time_ms: f64,
    /// Completed measurement windows
    pub windows_completed: u64,
    /// Frames counted across all windows
    pub total_frames: u64,
}

#[derive(Debug)]
struct MonitorState {
    window_start: Option<Instant>,
    frames_in_window: u32,
    metrics: FrameMetrics,
    last_pulled_window: u64,
    running: bool,
}

/// Frame counter producing one FPS measurement per window
///
/// The render loop calls [`PerformanceMonitor::record_frame`] once per
/// rendered frame. Used as a [`FrameRateSource`] it yields the latest FPS
/// only when a window has completed since the previous pull.
///
/// The frame that opens counting is included in the first window, so that
/// window reads one frame high. Later windows start on the frame that closed
/// the previous one and count only the frames after it.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        debug!(
            "Created performance monitor (target {} fps, warning below {} fps, window {:?})",
            config.target_fps,
            config.warning_threshold,
            config.measurement_window()
        );

        Self {
            config,
            state: Mutex::new(MonitorState {
                window_start: None,
                frames_in_window: 0,
                metrics: FrameMetrics::default(),
                last_pulled_window: 0,
                running: true,
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Count a rendered frame at the current instant
    pub fn record_frame(&self) {
        self.record_frame_at(Instant::now());
    }

    /// Count a rendered frame at `now`. Returns the metrics when a window closed.
    pub fn record_frame_at(&self, now: Instant) -> Option<FrameMetrics> {
        let window = self.config.measurement_window();
        let mut state = self.state.lock();

        if !state.running {
            return None;
        }

        let start = match state.window_start {
            Some(start) => start,
            None => {
                // The opening frame counts toward the first window
                state.window_start = Some(now);
                state.frames_in_window = 1;
                return None;
            }
        };

        state.frames_in_window += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < window {
            return None;
        }

        let frames = state.frames_in_window;
        let metrics = compute_metrics(frames, elapsed, &state.metrics);
        state.metrics = metrics;
        state.frames_in_window = 0;
        state.window_start = Some(now);
        drop(state);

        debug!(
            "Measured {} fps ({:.2} ms/frame)",
            metrics.fps, metrics.frame_time_ms
        );

        if metrics.fps < self.config.warning_threshold {
            warn!("Low FPS detected: {}", metrics.fps);
            for suggestion in self.suggestions_for(metrics.fps) {
                info!("Optimization suggestion: {}", suggestion);
            }
        }

        Some(metrics)
    }

    /// Latest completed measurement
    pub fn metrics(&self) -> FrameMetrics {
        self.state.lock().metrics
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status_for(self.metrics().fps)
    }

    pub fn status_for(&self, fps: f64) -> PerformanceStatus {
        if fps >= self.config.target_fps {
            PerformanceStatus::Excellent
        } else if fps >= self.config.warning_threshold {
            PerformanceStatus::Good
        } else {
            PerformanceStatus::Poor
        }
    }

    /// Optimization hints for the latest measurement
    pub fn suggestions(&self) -> Vec<&'static str> {
        self.suggestions_for(self.metrics().fps)
    }

    fn suggestions_for(&self, fps: f64) -> Vec<&'static str> {
        if fps < 30.0 {
            vec![
                "Consider reducing animation complexity",
                "Disable auto-rotate on 3D models",
                "Reduce particle effects",
            ]
        } else {
            Vec::new()
        }
    }

    /// Log a one-shot performance report
    pub fn log_report(&self) {
        let metrics = self.metrics();
        info!(
            fps = metrics.fps,
            frame_time_ms = metrics.frame_time_ms,
            target_fps = self.config.target_fps,
            status = self.status().label(),
            "Performance report"
        );
    }

    /// Resume counting. The next frame opens a fresh window.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if !state.running {
            state.running = true;
            state.window_start = None;
            state.frames_in_window = 0;
            info!("Performance monitoring started");
        }
    }

    /// Stop counting frames. Pending partial windows are discarded.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.running {
            state.running = false;
            state.window_start = None;
            state.frames_in_window = 0;
            info!("Performance monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl FrameRateSource for PerformanceMonitor {
    fn sample(&self) -> Option<f64> {
        let mut state = self.state.lock();
        if state.metrics.windows_completed == state.last_pulled_window {
            return None;
        }
        state.last_pulled_window = state.metrics.windows_completed;
        Some(state.metrics.fps)
    }
}

fn compute_metrics(frames: u32, elapsed: Duration, previous: &FrameMetrics) -> FrameMetrics {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let fps = ((frames as f64 * 1000.0) / elapsed_ms).round();
    let frame_time_ms = if frames == 0 {
        0.0
    } else {
        elapsed_ms / frames as f64
    };

    FrameMetrics {
        fps,
        frame_time_ms,
        windows_completed: previous.windows_completed + 1,
        total_frames: previous.total_frames + frames as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Render `windows` full measurement windows at a steady `fps` cadence
    fn drive_frames(
        monitor: &PerformanceMonitor,
        start: Instant,
        fps: u64,
        windows: u64,
    ) -> Instant {
        // Round the step up so every window closes on exactly `fps` frames
        let step = Duration::from_nanos((1_000_000_000 + fps - 1) / fps);
        let mut now = start;
        monitor.record_frame_at(now);
        for _ in 0..(fps * windows) {
            now += step;
            monitor.record_frame_at(now);
        }
        now
    }

    #[test]
    fn test_sample_queue_is_fifo() {
        let queue = SampleQueue::new();
        queue.extend([60.0, 0.0]);
        queue.push(45.0);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.sample(), Some(60.0));
        assert_eq!(queue.sample(), Some(0.0));
        assert_eq!(queue.sample(), Some(45.0));
        assert_eq!(queue.sample(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_closure_source() {
        let source: Arc<dyn FrameRateSource> = Arc::new(|| Some(42.0));
        assert_eq!(source.sample(), Some(42.0));
    }

    #[test]
    fn test_monitor_measures_fps() {
        let monitor = PerformanceMonitor::default();

        assert_eq!(monitor.sample(), None);
        drive_frames(&monitor, Instant::now(), 60, 2);

        let metrics = monitor.metrics();
        assert_eq!(metrics.fps, 60.0);
        assert_eq!(metrics.windows_completed, 2);
        assert_eq!(metrics.total_frames, 121);
        assert!((metrics.frame_time_ms - 16.67).abs() < 0.1);
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
    }

    #[test]
    fn test_opening_frame_counts_in_first_window() {
        let monitor = PerformanceMonitor::default();
        let start = Instant::now();

        assert_eq!(monitor.record_frame_at(start), None);
        let mut closed = None;
        for k in 1..=40u32 {
            closed = monitor.record_frame_at(start + Duration::from_millis(25) * k);
        }

        // 41 frames, including the opening one, inside exactly one second
        let metrics = closed.expect("window should close after one second");
        assert_eq!(metrics.fps, 41.0);
        assert_eq!(metrics.total_frames, 41);
    }

    #[test]
    fn test_monitor_sample_only_once_per_window() {
        let monitor = PerformanceMonitor::default();
        drive_frames(&monitor, Instant::now(), 40, 2);

        assert_eq!(monitor.sample(), Some(40.0));
        // No new window since the last pull: stalled, not zero
        assert_eq!(monitor.sample(), None);
    }

    #[test]
    fn test_monitor_status_classification() {
        let monitor = PerformanceMonitor::default();
        assert_eq!(monitor.status_for(75.0), PerformanceStatus::Excellent);
        assert_eq!(monitor.status_for(55.0), PerformanceStatus::Good);
        assert_eq!(monitor.status_for(12.0), PerformanceStatus::Poor);
    }

    #[test]
    fn test_monitor_suggestions() {
        let monitor = PerformanceMonitor::default();
        drive_frames(&monitor, Instant::now(), 20, 2);

        assert_eq!(monitor.metrics().fps, 20.0);
        assert_eq!(monitor.status(), PerformanceStatus::Poor);
        assert_eq!(monitor.suggestions().len(), 3);
        assert!(monitor.suggestions_for(45.0).is_empty());
    }

    #[test]
    fn test_stopped_monitor_ignores_frames() {
        let monitor = PerformanceMonitor::default();
        monitor.stop();
        assert!(!monitor.is_running());

        drive_frames(&monitor, Instant::now(), 60, 2);
        assert_eq!(monitor.metrics().windows_completed, 0);
        assert_eq!(monitor.sample(), None);

        monitor.start();
        drive_frames(&monitor, Instant::now(), 30, 2);
        assert_eq!(monitor.sample(), Some(30.0));
    }
}
