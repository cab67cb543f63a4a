//! Timestamped artifact backups with bounded retention.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

pub struct BackupStore {
    dir: PathBuf,
    max_backups: usize,
}

impl BackupStore {
    pub fn new(dir: PathBuf, max_backups: usize) -> Self {
        Self { dir, max_backups }
    }

    /// Copy the current artifact to a timestamped location and prune old
    /// copies down to `max_backups`. Returns `None` when there is no
    /// artifact to back up yet.
    pub fn backup(&self, model_path: &Path) -> Result<Option<PathBuf>> {
        if !model_path.exists() {
            info!("No existing model to backup");
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut target = self.dir.join(format!("model_{stamp}.json"));
        let mut counter = 1;
        while target.exists() {
            target = self.dir.join(format!("model_{stamp}_{counter}.json"));
            counter += 1;
        }

        fs::copy(model_path, &target)?;
        info!(backup = %target.display(), "Backed up current model");

        self.prune()?;
        Ok(Some(target))
    }

    /// Backups, newest first by modification time.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let meta = entry.metadata()?;
            entries.push(BackupEntry {
                modified: meta.modified()?.into(),
                size_bytes: meta.len(),
                path,
            });
        }

        entries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok(entries)
    }

    fn prune(&self) -> Result<()> {
        let entries = self.list()?;
        for old in entries.iter().skip(self.max_backups) {
            fs::remove_file(&old.path)?;
            info!(backup = %old.path.display(), "Removed old backup");
        }
        Ok(())
    }

    /// Restore the `nth` most recent backup (0 = newest) as the current
    /// artifact.
    pub fn restore(&self, nth: usize, model_path: &Path) -> Result<PathBuf> {
        let entries = self.list()?;
        let entry = entries.get(nth).ok_or_else(|| {
            EngineError::RollbackFailure(format!(
                "backup #{} not available ({} retained)",
                nth,
                entries.len()
            ))
        })?;

        if let Some(parent) = model_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&entry.path, model_path)
            .map_err(|e| EngineError::RollbackFailure(e.to_string()))?;

        info!(backup = %entry.path.display(), "Restored model from backup");
        Ok(entry.path.clone())
    }
}
