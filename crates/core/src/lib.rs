// Dockstore Core - Storage Domain, Ports & Lifecycle Services
// NO infrastructure dependencies: sqlx and the filesystem live in infra-sqlite

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::StorageConfig;
pub use error::{AppError, Result};
