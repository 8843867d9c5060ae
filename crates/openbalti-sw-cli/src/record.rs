//! Persisted state of the installed worker.
//!
//! The command line driver runs one event per process, so the lifecycle
//! state reached by `install` is written to `worker.json` in the cache
//! directory and read back by later commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use openbalti_sw_core::{WorkerConfig, WorkerState};
use serde::{Deserialize, Serialize};

/// Record file name in cache directory
const RECORD_FILE: &str = "worker.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub version: String,
    pub origin: String,
    pub state: WorkerState,
    pub updated_at: DateTime<Utc>,
}

impl WorkerRecord {
    pub fn new(config: &WorkerConfig, state: WorkerState) -> Self {
        Self {
            version: config.version.clone(),
            origin: config.origin.to_string(),
            state,
            updated_at: Utc::now(),
        }
    }

    /// Whether this record describes an activated worker for `config`.
    pub fn is_active_for(&self, config: &WorkerConfig) -> bool {
        self.state == WorkerState::Activated
            && self.version == config.version
            && self.origin == config.origin.as_str()
    }
}

pub struct RecordStore {
    cache_dir: PathBuf,
    pub data: Option<WorkerRecord>,
}

impl RecordStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load the record from disk
    pub fn load(&mut self) -> Result<bool> {
        let path = self.record_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read worker record")?;
            let data: WorkerRecord =
                serde_json::from_str(&contents).context("Failed to parse worker record")?;
            self.data = Some(data);
            return Ok(true);
        }
        Ok(false)
    }

    /// Save the record to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.record_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: WorkerRecord) {
        self.data = Some(data);
    }

    pub fn is_active_for(&self, config: &WorkerConfig) -> bool {
        self.data
            .as_ref()
            .map(|d| d.is_active_for(config))
            .unwrap_or(false)
    }

    fn record_path(&self) -> PathBuf {
        self.cache_dir.join(RECORD_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn config() -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://openbalti.com").unwrap())
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::new(dir.path().to_path_buf());
        assert!(!store.load().unwrap());

        store.update(WorkerRecord::new(&config(), WorkerState::Activated));
        store.save().unwrap();

        let mut reloaded = RecordStore::new(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        assert!(reloaded.is_active_for(&config()));
    }

    #[test]
    fn test_record_is_version_and_origin_specific() {
        let record = WorkerRecord::new(&config(), WorkerState::Activated);
        assert!(record.is_active_for(&config()));
        assert!(!record.is_active_for(&config().with_version("v4.1.0")));

        let local = WorkerConfig::new(Url::parse("http://localhost:3000").unwrap());
        assert!(!record.is_active_for(&local));

        let installed = WorkerRecord::new(&config(), WorkerState::Installed);
        assert!(!installed.is_active_for(&config()));
    }
}
