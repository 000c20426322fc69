// Port Layer - Interfaces for external dependencies

pub mod fault;
pub mod lifecycle;
pub mod maintenance;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use fault::{DeviceFaultFlags, FaultReporter};
pub use lifecycle::StoreLifecycle;
pub use maintenance::{StoreMaintenance, StoreSizeInfo};
pub use time_provider::TimeProvider;
