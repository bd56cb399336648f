//! Per-run working directory.
//!
//! Intermediate artifacts live in `<temp_dir>/run-<id>`. The directory is
//! removed after a successful run and kept after a failed one.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use shorts_models::RunId;

#[derive(Debug)]
pub struct RunWorkspace {
    root: PathBuf,
}

impl RunWorkspace {
    /// Create a fresh workspace for `run_id` under `temp_dir`.
    pub async fn create(temp_dir: &Path, run_id: &RunId) -> std::io::Result<Self> {
        let root = temp_dir.join(format!("run-{}", run_id));
        tokio::fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "Created run workspace");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact inside the workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Remove the workspace. Failure to clean up is logged, not returned.
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            warn!(path = %self.root.display(), "Failed to remove run workspace: {}", e);
        } else {
            debug!(path = %self.root.display(), "Removed run workspace");
        }
    }

    /// Keep the workspace on disk and return its path.
    pub fn preserve(self) -> PathBuf {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_remove() {
        let temp = TempDir::new().unwrap();
        let run_id = RunId::from_string("abc");

        let ws = RunWorkspace::create(temp.path(), &run_id).await.unwrap();
        assert_eq!(ws.root(), temp.path().join("run-abc"));
        assert!(ws.root().is_dir());
        assert_eq!(ws.path("narration.wav"), temp.path().join("run-abc/narration.wav"));

        tokio::fs::write(ws.path("x.txt"), b"x").await.unwrap();
        ws.remove().await;
        assert!(!temp.path().join("run-abc").exists());
    }

    #[tokio::test]
    async fn test_preserve_keeps_files() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(temp.path(), &RunId::from_string("keep"))
            .await
            .unwrap();
        tokio::fs::write(ws.path("x.txt"), b"x").await.unwrap();

        let kept = ws.preserve();
        assert!(kept.join("x.txt").exists());
    }
}
