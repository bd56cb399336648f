//! Filesystem utilities for artifact handling.
//!
//! Moves handle the EXDEV error that appears when the run workspace and the
//! output directory live on different filesystems.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is tried first. On EXDEV the file is copied to a
/// temporary name next to `dst`, renamed into place, and the source removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        ensure_dir(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::FileNotFound(src.to_path_buf()))
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("partial");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        if let Err(cleanup) = fs::remove_file(&tmp_dst).await {
            tracing::debug!("Failed to remove {}: {}", tmp_dst.display(), cleanup);
        }
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Create a directory and its parents if missing.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

/// Fail unless `path` is an existing, non-empty file. Returns its size.
pub async fn require_non_empty(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();
    let meta = match fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Err(MediaError::invalid_input(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(MediaError::EmptyFile(path.to_path_buf()));
    }
    Ok(meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_to_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("subtitled.mp4");
        let dst = dir.path().join("output").join("final.mp4");

        fs::write(&src, b"video").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp4");
        let dst = dir.path().join("b.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = move_file(dir.path().join("nope"), dir.path().join("dst"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }

    #[tokio::test]
    async fn test_require_non_empty() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.wav");
        let full = dir.path().join("full.wav");
        fs::write(&empty, b"").await.unwrap();
        fs::write(&full, b"RIFF").await.unwrap();

        assert!(matches!(
            require_non_empty(&empty).await,
            Err(MediaError::EmptyFile(_))
        ));
        assert!(matches!(
            require_non_empty(dir.path().join("missing")).await,
            Err(MediaError::FileNotFound(_))
        ));
        assert_eq!(require_non_empty(&full).await.unwrap(), 4);
        assert!(require_non_empty(dir.path()).await.is_err());
    }
}
