use async_trait::async_trait;
use edl_core::{CacheSnapshot, EdlError, RefreshObserver};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Keeps the last built list on disk so a restart serves it straight away.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved snapshot, if there is a readable one.
    pub fn load(&self) -> Option<CacheSnapshot> {
        if !self.path.exists() {
            return None;
        }
        let loaded = std::fs::read_to_string(&self.path)
            .map_err(EdlError::from)
            .and_then(|s| serde_json::from_str::<CacheSnapshot>(&s).map_err(EdlError::from));
        match loaded {
            Ok(snapshot) => {
                info!(
                    "Restored EDL cache from {} ({} entries, refreshed {:?})",
                    self.path.display(),
                    snapshot.len(),
                    snapshot.refreshed_at
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Ignoring unreadable EDL cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write via a temp file + rename so a crash never leaves half a file.
    pub async fn save(&self, snapshot: &CacheSnapshot) -> edl_core::Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RefreshObserver for SnapshotStore {
    async fn refreshed(&self, snapshot: &CacheSnapshot, _elapsed: Duration) {
        if let Err(e) = self.save(snapshot).await {
            error!("Failed to persist EDL cache to {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use edl_core::{Indicator, OutputFormat};

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested/edl-cache.json"));
        assert!(store.load().is_none());

        let snapshot = CacheSnapshot::build(
            OutputFormat::Csv,
            &[Indicator::new("1.1.1.1").with_attribute("score", 2)],
            Utc::now(),
        )
        .unwrap();
        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load(), Some(snapshot));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edl-cache.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SnapshotStore::new(path).load().is_none());
    }

    #[tokio::test]
    async fn test_observer_saves_on_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("edl-cache.json"));
        let snapshot =
            CacheSnapshot::build(OutputFormat::Text, &[Indicator::new("a.com")], Utc::now()).unwrap();

        store.refreshed(&snapshot, Duration::from_millis(3)).await;
        assert_eq!(store.load().map(|s| s.render()), Some("a.com".to_string()));
    }
}
