use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::events::StoredSession;

/// Persists stored sessions between runs and writes text exports.
pub struct StorageManager {
    stored_path: PathBuf,
    export_dir: PathBuf,
}

impl StorageManager {
    pub fn new(stored_path: PathBuf, export_dir: PathBuf) -> Self {
        Self { stored_path, export_dir }
    }

    pub fn load_stored(&self) -> Result<Vec<StoredSession>> {
        if !self.stored_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.stored_path)
            .context("Failed to read stored sessions")?;
        let stored: Vec<StoredSession> = serde_json::from_str(&content)
            .context("Failed to parse stored sessions")?;

        debug!(count = stored.len(), path = %self.stored_path.display(), "loaded stored sessions");
        Ok(stored)
    }

    pub fn save_stored(&self, stored: &[StoredSession]) -> Result<()> {
        if stored.is_empty() {
            return self.clear_stored();
        }

        if let Some(parent) = self.stored_path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let content = serde_json::to_string_pretty(stored)
            .context("Failed to serialize stored sessions")?;
        fs::write(&self.stored_path, content)
            .context("Failed to write stored sessions")?;
        Ok(())
    }

    pub fn clear_stored(&self) -> Result<()> {
        if self.stored_path.exists() {
            fs::remove_file(&self.stored_path)
                .context("Failed to remove stored sessions file")?;
        }
        Ok(())
    }

    /// Write `text` to `target`, or to `<stem>_<timestamp>.txt` in the
    /// export directory. Returns the path written.
    pub fn export_text(
        &self,
        text: &str,
        stem: &str,
        target: Option<&Path>,
        now: DateTime<Local>,
    ) -> Result<PathBuf> {
        let path = match target {
            Some(path) => path.to_path_buf(),
            None => self
                .export_dir
                .join(format!("{}_{}.txt", stem, now.format("%Y%m%d_%H%M%S"))),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create export directory")?;
        }
        fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(path = %path.display(), bytes = text.len(), "exported text");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manager(dir: &Path) -> StorageManager {
        StorageManager::new(dir.join("data").join("stored.json"), dir.join("exports"))
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(manager(dir.path()).load_stored().unwrap().is_empty());
    }

    #[test]
    fn stored_sessions_persist() {
        let dir = tempfile::tempdir().unwrap();
        let storage = manager(dir.path());
        let stored = vec![StoredSession::new("a".into(), 1), StoredSession::new("b".into(), 2)];
        storage.save_stored(&stored).unwrap();
        assert_eq!(storage.load_stored().unwrap(), stored);

        storage.save_stored(&[]).unwrap();
        assert!(!dir.path().join("data").join("stored.json").exists());
        assert!(storage.load_stored().unwrap().is_empty());
    }

    #[test]
    fn export_uses_timestamped_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = manager(dir.path());
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let path = storage.export_text("hello", "chat_history", None, now).unwrap();
        assert_eq!(path, dir.path().join("exports").join("chat_history_20240305_140709.txt"));
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn export_honours_explicit_target() {
        let dir = tempfile::tempdir().unwrap();
        let storage = manager(dir.path());
        let target = dir.path().join("nested").join("out.txt");
        let path = storage
            .export_text("x", "ignored", Some(&target), Local::now())
            .unwrap();
        assert_eq!(path, target);
        assert_eq!(fs::read_to_string(target).unwrap(), "x");
    }
}
