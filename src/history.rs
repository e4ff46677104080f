use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::error::{Result, ClientError};

/// Recently viewed project ids, most recent first
#[cfg_attr(test, mockall::automock)]
pub trait JobHistory: Send + Sync {
    fn get(&self) -> Result<Vec<String>>;

    /// Move `id` to the front, dropping the oldest entries past the limit
    fn add(&self, id: &str) -> Result<()>;
}

fn push_front(entries: &mut Vec<String>, id: &str, max_entries: usize) {
    entries.retain(|entry| entry != id);
    entries.insert(0, id.to_string());
    entries.truncate(max_entries);
}

/// History kept in memory
#[derive(Debug)]
pub struct MemoryJobHistory {
    entries: Mutex<Vec<String>>,
    max_entries: usize,
}

impl MemoryJobHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries,
        }
    }
}

impl JobHistory for MemoryJobHistory {
    fn get(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::History("history lock poisoned".to_string()))?;
        Ok(entries.clone())
    }

    fn add(&self, id: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::History("history lock poisoned".to_string()))?;
        push_front(&mut entries, id, self.max_entries);
        Ok(())
    }
}

/// History stored as a JSON array on disk
#[derive(Debug)]
pub struct FileJobHistory {
    path: PathBuf,
    max_entries: usize,
    lock: Mutex<()>,
}

impl FileJobHistory {
    pub fn new<P: AsRef<Path>>(path: P, max_entries: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_entries,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(&config.path, config.max_entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A corrupt file only loses history
                warn!("Ignoring unreadable job history {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, entries: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, serde_json::to_string_pretty(entries)?)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl JobHistory for FileJobHistory {
    fn get(&self) -> Result<Vec<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ClientError::History("history lock poisoned".to_string()))?;
        self.read()
    }

    fn add(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(ClientError::History("cannot record an empty project id".to_string()));
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|_| ClientError::History("history lock poisoned".to_string()))?;
        let mut entries = self.read()?;
        push_front(&mut entries, id.trim(), self.max_entries);
        self.write(&entries)?;
        debug!("Recorded {} in job history", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_memory_history_orders_and_dedupes() {
        let history = MemoryJobHistory::new(3);
        history.add("a").unwrap();
        history.add("b").unwrap();
        history.add("a").unwrap();
        assert_eq!(history.get().unwrap(), vec!["a", "b"]);

        history.add("c").unwrap();
        history.add("d").unwrap();
        assert_eq!(history.get().unwrap(), vec!["d", "c", "a"]);
    }

    #[test]
    fn test_file_history_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let history = FileJobHistory::new(&path, 2);
        assert!(history.get().unwrap().is_empty());
        history.add("p-1").unwrap();
        history.add("p-2").unwrap();
        history.add("p-3").unwrap();

        let reopened = FileJobHistory::new(&path, 2);
        assert_eq!(reopened.get().unwrap(), vec!["p-3", "p-2"]);
    }

    #[test]
    fn test_file_history_recovers_from_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let history = FileJobHistory::new(&path, 5);
        assert!(assert_ok!(history.get()).is_empty());
        assert_ok!(history.add("p-9"));
        assert_eq!(assert_ok!(history.get()), vec!["p-9"]);
    }

    #[test]
    fn test_file_history_rejects_empty_id() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileJobHistory::new(dir.path().join("history.json"), 5);
        let err = assert_err!(history.add("  "));
        assert!(matches!(err, ClientError::History(_)));
    }
}
