//! Dockstore - Main Entry Point
//! Starts both stores, keeps them compacted and closes them on shutdown

mod settings;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dockstore_core::application::{CompactionScheduler, StartupService};
use dockstore_core::port::time_provider::SystemTimeProvider;
use dockstore_core::port::{DeviceFaultFlags, FaultReporter, StoreLifecycle};
use dockstore_infra_sqlite::SqliteLifecycle;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "dockstore.log";

/// Console logging per `DOCKSTORE_LOG_FORMAT` (json | pretty), plus a daily
/// rolling JSON file when `DOCKSTORE_LOG_DIR` is set
fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("DOCKSTORE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("dockstore=info"))?;

    let (file_layer, guard) = match std::env::var_os("DOCKSTORE_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => registry.with(fmt::layer().json()).try_init()?,
        // Development: pretty formatting with colors
        _ => registry.with(fmt::layer().pretty()).try_init()?,
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (the guard flushes the file writer on exit)
    let _log_guard = init_logging()?;
    info!("Dockstore v{} starting...", VERSION);

    // 2. Configuration
    let config = settings::load()?;
    info!(
        media_dir = %config.media_dir.display(),
        image_dir = %config.image_dir.display(),
        lock_timeout_ms = config.lock_timeout_ms,
        "Storage configured"
    );

    // 3. Wiring
    let faults = Arc::new(DeviceFaultFlags::new());
    let lifecycle = SqliteLifecycle::new(config.clone(), Arc::new(SystemTimeProvider), faults.clone())?;
    let lifecycle_port: Arc<dyn StoreLifecycle> = Arc::new(lifecycle.clone());

    // 4. Start every store; failures stay down as device faults
    let report = StartupService::new(lifecycle_port.clone()).start_all().await;
    if !report.is_healthy() {
        for fault in faults.active() {
            warn!(fault = %fault, "Device fault active");
        }
    }

    // 5. Compaction
    match config.compaction_interval() {
        Some(period) => {
            let scheduler =
                CompactionScheduler::new(Arc::new(lifecycle.clone()), lifecycle_port.clone(), period);
            tokio::spawn(scheduler.run());
        }
        None => info!("Compaction disabled"),
    }

    info!("Stores ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Closing stores...");

    lifecycle.stop().await?;

    info!("Shutdown complete.");
    Ok(())
}
