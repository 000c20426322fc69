// Daemon settings: StorageConfig from an optional file plus DOCKSTORE_* variables

use anyhow::{Context, Result};
use dockstore_core::StorageConfig;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "DOCKSTORE";
const CONFIG_FILE_VAR: &str = "DOCKSTORE_CONFIG";

/// Load settings from `$DOCKSTORE_CONFIG` (if set) overridden by the
/// environment, e.g. `DOCKSTORE_MEDIA_DIR=/media/sd0/db`.
pub fn load() -> Result<StorageConfig> {
    let file = std::env::var(CONFIG_FILE_VAR).ok();
    load_from(file.as_deref(), config::Environment::with_prefix(ENV_PREFIX))
}

fn load_from(file: Option<&str>, env: config::Environment) -> Result<StorageConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(config::File::with_name(path).required(true));
    }

    let mut settings: StorageConfig = builder
        .add_source(env.try_parsing(true))
        .build()
        .context("Failed to read settings")?
        .try_deserialize()
        .context("Failed to parse settings")?;

    settings.media_dir = expand(&settings.media_dir);
    settings.image_dir = expand(&settings.image_dir);
    settings.validate()?;
    Ok(settings)
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
