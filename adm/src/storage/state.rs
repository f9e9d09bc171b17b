//! Persisted cluster state
//!
//! Container records are written by the deploy workflows and may be changed
//! by other invocations at any time, so every lookup goes back to the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AdmError;
use crate::filesys::file::File;

/// Key-value view of the persisted cluster state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Value stored under `key`.
    ///
    /// `Ok(None)` means the key is known to be absent, `Err(StateUnavailable)`
    /// means the store could not be consulted.
    async fn get(&self, key: &str) -> Result<Option<String>, AdmError>;
}

/// State store backed by a JSON object file (`{ "<key>": "<value>" }`)
pub struct JsonStateStore {
    file: File,
}

impl JsonStateStore {
    pub fn new(file: File) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &File {
        &self.file
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AdmError> {
        let records: Option<HashMap<String, String>> =
            self.file.read_json_opt().await.map_err(|e| {
                AdmError::StateUnavailable(format!(
                    "failed to read {}: {}",
                    self.file.path().display(),
                    e
                ))
            })?;

        let Some(records) = records else {
            debug!("State file {} does not exist", self.file.path().display());
            return Ok(None);
        };

        Ok(records.get(key).cloned())
    }
}

/// In-memory state store
#[derive(Default)]
pub struct MemoryStateStore {
    records: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(key)
    }

    /// Make every subsequent `get` fail with `StateUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AdmError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AdmError::StateUnavailable("store is offline".to_string()));
        }
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(key).cloned())
    }
}
