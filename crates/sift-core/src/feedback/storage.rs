//! Key-value persistence
//!
//! Mirrors the extension storage contract: `get(keys) -> mapping` and
//! `set(mapping) -> ack`. No schema versioning; readers must accept absent
//! keys.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};

/// Error type for persistence.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage rejected write: {0}")]
    Rejected(String),
    #[error("Storage read failed: {0}")]
    Unavailable(String),
    #[error("Malformed `{key}` payload: {source}")]
    Malformed {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable key-value store provided by the host.
pub trait KeyValueStore {
    /// Values for whichever of `keys` exist.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError>;

    /// Write every entry of `entries`.
    fn set(&mut self, entries: Map<String, Value>) -> Result<(), StorageError>;
}

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<Map<String, Value>>>,
    read_only: Rc<RefCell<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let storage = Self::new();
        storage
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.to_string(), v)));
        storage
    }

    /// Make every subsequent `set` fail.
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.borrow_mut() = read_only;
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.borrow().clone()
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError> {
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|&k| entries.get(k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&mut self, entries: Map<String, Value>) -> Result<(), StorageError> {
        if *self.read_only.borrow() {
            return Err(StorageError::Rejected("storage is read-only".to_string()));
        }
        self.entries.borrow_mut().extend(entries);
        Ok(())
    }
}

// =============================================================================
// Bounded logs
// =============================================================================

/// Append-only log keeping the last `limit` entries.
#[derive(Debug, Clone)]
pub struct BackupLog<T> {
    limit: usize,
    entries: VecDeque<T>,
}

impl<T> BackupLog<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: VecDeque::with_capacity(limit.min(128)),
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Payload that could not be persisted, kept in memory instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackEntry {
    pub timestamp: u64,
    pub key: &'static str,
    pub error: String,
    pub payload: Value,
}

/// Write one key, diverting the payload to `fallback` if the store rejects it.
/// Returns whether the durable write succeeded.
pub(crate) fn write_or_fallback(
    storage: &mut dyn KeyValueStore,
    key: &'static str,
    payload: Value,
    fallback: &mut BackupLog<FallbackEntry>,
    now: u64,
) -> bool {
    let mut entries = Map::new();
    entries.insert(key.to_string(), payload.clone());
    match storage.set(entries) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to persist `{}`, kept in memory: {}", key, e);
            fallback.push(FallbackEntry {
                timestamp: now,
                key,
                error: e.to_string(),
                payload,
            });
            false
        }
    }
}
