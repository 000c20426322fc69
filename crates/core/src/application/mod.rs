// Application Layer - Startup and maintenance orchestration

pub mod maintenance;
pub mod startup;

// Re-exports
pub use maintenance::{CompactionReport, CompactionScheduler};
pub use startup::{StartupReport, StartupService};
