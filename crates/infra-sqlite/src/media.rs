// Store files on the removable media
//
// Callers must have closed every connection to the store first.

use dockstore_core::error::{AppError, Result};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const STAGING_SUFFIX: &str = ".restoring";

fn io_error(err: io::Error, action: &str, path: &Path) -> AppError {
    AppError::Io(io::Error::new(
        err.kind(),
        format!("{} {}: {}", action, path.display(), err),
    ))
}

pub(crate) async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| io_error(e, "checking", path))
}

/// Remove a file; `false` when it was not there
pub(crate) async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error(e, "removing", path)),
    }
}

/// Delete the live file and its journal
pub(crate) async fn delete_store_files(store_path: &Path, journal_path: &Path) -> Result<()> {
    let removed_store = remove_if_present(store_path).await?;
    let removed_journal = remove_if_present(journal_path).await?;
    info!(
        path = %store_path.display(),
        removed_store,
        removed_journal,
        "Store files deleted"
    );
    Ok(())
}

/// Images ship read-only; the live copy must be writable
async fn clear_read_only(path: &Path) -> Result<()> {
    let mut permissions = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_error(e, "reading metadata of", path))?
        .permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        tokio::fs::set_permissions(path, permissions)
            .await
            .map_err(|e| io_error(e, "clearing read-only flag of", path))?;
    }
    Ok(())
}

fn staging_path(store_path: &Path) -> PathBuf {
    let mut name: OsString = store_path.as_os_str().to_owned();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

/// Replace the live file with a copy of the pristine image.
///
/// The copy lands under a temporary name and is renamed into place, so a power
/// loss mid-copy never leaves a truncated store behind. A journal left next to
/// the target is deleted first: replaying it against the image would corrupt it.
pub(crate) async fn restore_from_image(
    image_path: &Path,
    store_path: &Path,
    journal_path: &Path,
) -> Result<()> {
    if !exists(image_path).await? {
        return Err(AppError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("pristine image {} is missing", image_path.display()),
        )));
    }
    if let Some(parent) = store_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(e, "creating", parent))?;
    }

    let staging = staging_path(store_path);
    remove_if_present(&staging).await?;
    let bytes = tokio::fs::copy(image_path, &staging)
        .await
        .map_err(|e| io_error(e, "copying image to", &staging))?;
    clear_read_only(&staging).await?;
    tokio::fs::File::open(&staging)
        .await
        .map_err(|e| io_error(e, "opening", &staging))?
        .sync_all()
        .await
        .map_err(|e| io_error(e, "syncing", &staging))?;

    if remove_if_present(journal_path).await? {
        warn!(journal = %journal_path.display(), "Deleted stale journal before restore");
    }
    tokio::fs::rename(&staging, store_path)
        .await
        .map_err(|e| io_error(e, "renaming into place", store_path))?;

    info!(
        image = %image_path.display(),
        target = %store_path.display(),
        bytes,
        "Store restored from pristine image"
    );
    Ok(())
}
