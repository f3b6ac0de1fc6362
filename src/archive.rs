use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::FeedId;

/// Keeps the pages fetched by the latest cycle on disk for inspection.
/// Failures here are logged and never reach the cycle.
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Delete `.html` files left by earlier cycles.
    pub async fn clean(&self) -> usize {
        match self.try_clean().await {
            Ok(n) => {
                debug!(dir = %self.dir.display(), removed = n, "archive cleaned");
                n
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), "archive cleanup failed: {e}");
                0
            }
        }
    }

    pub async fn save(&self, feed: &FeedId, body: &str) -> Option<PathBuf> {
        match self.try_save(feed, body).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(feed = %feed, dir = %self.dir.display(), "archive save failed: {e}");
                None
            }
        }
    }

    async fn try_clean(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "html") && entry.file_type().await?.is_file() {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn try_save(&self, feed: &FeedId, body: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!("{}_{}.html", feed, Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(name);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_names_file_by_feed_and_time() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::new(tmp.path().join("download"));
        let path = archive.save(&FeedId::new("sf4"), "<html></html>").await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("sf4_"));
        assert!(name.ends_with(".html"));
        // sf4_ + yyyyMMdd_HHmmss + .html
        assert_eq!(name.len(), 4 + 15 + 5);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "<html></html>");
    }

    #[tokio::test]
    async fn clean_removes_only_html() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("sf1_20240101_000000.html"), "x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "keep").unwrap();

        let archive = Archive::new(tmp.path());
        assert_eq!(archive.clean().await, 1);
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn clean_of_missing_dir_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(Archive::new(tmp.path().join("absent")).clean().await, 0);
    }
}
