use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(String),
    #[error("corrupt store document: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Key/value persistence for everything a run must survive: resume
/// cursors, campaign data, queued commands. Values are JSON documents.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: DashMap<String, Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

/// All keys in one pretty-printed JSON document on disk, rewritten on
/// every mutation. State is small (cursors, one campaign record, a
/// short command queue), so a full rewrite stays cheap and the file
/// remains hand-editable.
pub struct FileStateStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileStateStore {
    /// Load the document at `path`, starting empty when the file does
    /// not exist yet. A present-but-unreadable document is an error,
    /// never silently reset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.is_file() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "state store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, entries)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut guard = self.entries.lock();
        guard.insert(key.to_string(), value);
        self.persist(&guard)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.lock();
        if guard.remove(key).is_some() {
            self.persist(&guard)?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStateStore::new();
        store.put("a", json!({"x": 1})).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!({"x": 1})));
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::open(&path).unwrap();
        store.put("resumeIndex_example.com", json!(4)).await.unwrap();
        store.put("campaignData", json!({"businessName": "Acme"})).await.unwrap();
        drop(store);

        let reopened = FileStateStore::open(&path).unwrap();
        assert_eq!(reopened.get("resumeIndex_example.com").await.unwrap(), Some(json!(4)));
        let mut keys = reopened.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["campaignData", "resumeIndex_example.com"]);
    }

    #[tokio::test]
    async fn file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        let store = FileStateStore::open(&path).unwrap();
        store.put("k", json!("v")).await.unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn corrupt_documents_are_reported_not_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FileStateStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }
}
