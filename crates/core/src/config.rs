// Storage Configuration

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MEDIA_DIR: &str = "~/.dockstore/media";
const DEFAULT_IMAGE_DIR: &str = "~/.dockstore/images";

/// Default bound on waiting for the process-wide database lock (5 minutes)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// SQLite busy handler timeout (5 seconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Pool connection acquire timeout (30 seconds)
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Compaction interval (24 hours)
pub const DEFAULT_COMPACTION_INTERVAL_HOURS: u64 = 24;

/// One year
pub const MAX_COMPACTION_INTERVAL_HOURS: u64 = 24 * 366;

/// Where the stores live and how long callers may wait for them.
///
/// Loaded by the daemon from `DOCKSTORE_*` environment variables; every field
/// has a default so a bare device boots without any configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory on the removable media holding the live store files
    pub media_dir: PathBuf,

    /// Read-only directory holding the pristine images shipped with the firmware
    pub image_dir: PathBuf,

    /// Bound on waiting for the database lock; 0 waits forever
    pub lock_timeout_ms: u64,

    pub busy_timeout_ms: u64,

    pub acquire_timeout_ms: u64,

    /// How often the compaction scheduler runs; 0 disables it
    pub compaction_interval_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from(DEFAULT_MEDIA_DIR),
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            compaction_interval_hours: DEFAULT_COMPACTION_INTERVAL_HOURS,
        }
    }
}

impl StorageConfig {
    /// Default settings rooted at explicit directories
    pub fn for_dirs(media_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            image_dir: image_dir.into(),
            ..Default::default()
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn compaction_interval(&self) -> Option<Duration> {
        (self.compaction_interval_hours > 0)
            .then(|| Duration::from_secs(self.compaction_interval_hours.saturating_mul(3600)))
    }

    /// Reject settings that would make restore-from-image destructive or
    /// leave the busy handler disabled
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.media_dir) {
            return Err(AppError::Config("media_dir must not be empty".to_string()));
        }
        if is_blank(&self.image_dir) {
            return Err(AppError::Config("image_dir must not be empty".to_string()));
        }
        if self.media_dir == self.image_dir {
            return Err(AppError::Config(format!(
                "media_dir and image_dir must differ (both {})",
                self.media_dir.display()
            )));
        }
        if self.busy_timeout_ms == 0 {
            return Err(AppError::Config(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(AppError::Config(
                "acquire_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.compaction_interval_hours > MAX_COMPACTION_INTERVAL_HOURS {
            return Err(AppError::Config(format!(
                "compaction_interval_hours must be at most {} (got {})",
                MAX_COMPACTION_INTERVAL_HOURS, self.compaction_interval_hours
            )));
        }
        Ok(())
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().is_empty()
}
