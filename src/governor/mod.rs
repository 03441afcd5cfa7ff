mod builder;
mod handle;
mod lifecycle;
mod state_machine;
mod stats;
mod tick;
mod types;


pub use builder::GovernorBuilder;
pub use handle::Governor;
pub use state_machine::GovernorCore;
pub use stats::GovernorStats;
pub use types::{Lifecycle, TickOutcome};
