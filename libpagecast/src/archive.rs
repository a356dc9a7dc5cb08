//! Moving processed files out of the watch directories
//!
//! The same move is used for the archive (after a publish) and the
//! quarantine (after too many failures). The file keeps its name and an
//! existing file at the destination is never overwritten.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PublishError;

/// Move `source` into `dir`, keeping its file name
///
/// Falls back to copy and remove when a rename is not possible, e.g. when
/// the directories live on different filesystems.
pub async fn move_into(source: &Path, dir: &Path) -> Result<PathBuf, PublishError> {
    let file_name = source.file_name().ok_or_else(|| {
        PublishError::fs(
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let target = dir.join(file_name);

    if tokio::fs::try_exists(&target)
        .await
        .map_err(|e| PublishError::fs(&target, e))?
    {
        return Err(PublishError::Collision { path: target });
    }

    match tokio::fs::rename(source, &target).await {
        Ok(()) => Ok(target),
        Err(rename_error) => {
            debug!(
                source = %source.display(),
                target = %target.display(),
                error = %rename_error,
                "Rename failed, copying instead"
            );
            tokio::fs::copy(source, &target)
                .await
                .map_err(|_| PublishError::fs(source, rename_error))?;
            tokio::fs::remove_file(source)
                .await
                .map_err(|e| PublishError::fs(source, e))?;
            Ok(target)
        }
    }
}

/// Create each directory (and its parents) if missing
pub async fn ensure_dirs<'a, I>(dirs: I) -> std::io::Result<()>
where
    I: IntoIterator<Item = &'a Path>,
{
    for dir in dirs {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
