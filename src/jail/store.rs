//! Edit-jail persistence
//!
//! The edit record and jail entries are the only state that must survive a
//! restart. They are written as one JSON document. Writes are atomic
//! (write to `.tmp`, then rename) so an interrupted save leaves the previous
//! snapshot intact. A missing file is an empty snapshot; a corrupt one is
//! reported as an error which [`StateStore::restore`] downgrades to empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::error::ScoutError;

/// Durable edit-abuse state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailSnapshot {
    /// `author/permlink` -> number of stale observations
    #[serde(rename = "editRecord", default)]
    pub edit_record: HashMap<String, u32>,

    /// author -> jail start (unix milliseconds)
    #[serde(rename = "jailEntries", default)]
    pub jail_entries: HashMap<String, i64>,
}

impl JailSnapshot {
    pub fn is_empty(&self) -> bool {
        self.edit_record.is_empty() && self.jail_entries.is_empty()
    }
}

pub trait StateStore: Send + Sync {
    /// Replace the stored snapshot
    fn save(&self, snapshot: &JailSnapshot) -> Result<(), ScoutError>;

    /// Read the stored snapshot; empty when nothing was saved yet
    fn load(&self) -> Result<JailSnapshot, ScoutError>;

    /// Load, degrading any failure to an empty snapshot
    fn restore(&self) -> JailSnapshot {
        match self.load() {
            Ok(snapshot) => {
                if !snapshot.is_empty() {
                    info!(
                        edit_records = snapshot.edit_record.len(),
                        jail_entries = snapshot.jail_entries.len(),
                        "Edit-jail memory restored"
                    );
                }
                snapshot
            }
            Err(e) => {
                warn!(error_kind = e.kind(), "Starting with empty edit-jail memory: {}", e);
                JailSnapshot::default()
            }
        }
    }
}

/// JSON-file store.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn save(&self, snapshot: &JailSnapshot) -> Result<(), ScoutError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| ScoutError::Persistence(format!("serialization failed: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    fn load(&self) -> Result<JailSnapshot, ScoutError> {
        if !self.path.exists() {
            return Ok(JailSnapshot::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ScoutError::Persistence(format!("deserialization failed: {}", e)))
    }
}

/// In-memory store (for testing).
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<Option<JailSnapshot>>,
    saves: Mutex<usize>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: JailSnapshot) -> Self {
        Self {
            data: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::Relaxed);
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn stored(&self) -> Option<JailSnapshot> {
        self.data.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl StateStore for InMemoryStore {
    fn save(&self, snapshot: &JailSnapshot) -> Result<(), ScoutError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(ScoutError::Persistence("store is read-only".to_string()));
        }
        *self.data.lock().map_err(|_| ScoutError::Persistence("lock poisoned".to_string()))? =
            Some(snapshot.clone());
        *self.saves.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        Ok(())
    }

    fn load(&self) -> Result<JailSnapshot, ScoutError> {
        let data = self
            .data
            .lock()
            .map_err(|_| ScoutError::Persistence("lock poisoned".to_string()))?;
        Ok(data.clone().unwrap_or_default())
    }
}
