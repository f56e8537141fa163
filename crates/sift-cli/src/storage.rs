use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::{Map, Value};
use sift_core::feedback::{KeyValueStore, StorageError};

/// State file holding the extension's storage keys as one JSON object.
/// Clones share the same entries and file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStorage {
    /// Open `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, String> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| format!("Invalid state file '{}': {}", path.display(), e))?
            }
        } else {
            log::debug!("State file {} not found, starting empty", path.display());
            Map::new()
        };

        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                path: path.to_path_buf(),
                entries,
            })),
        })
    }
}

impl KeyValueStore for JsonFileStorage {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError> {
        let inner = self.inner.borrow();
        Ok(keys
            .iter()
            .filter_map(|&k| inner.entries.get(k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&mut self, entries: Map<String, Value>) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        let mut merged = inner.entries.clone();
        merged.extend(entries);

        let json = serde_json::to_string_pretty(&merged).map_err(|e| StorageError::Rejected(e.to_string()))?;
        if let Some(parent) = inner.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::Rejected(e.to_string()))?;
        }
        fs::write(&inner.path, json)
            .map_err(|e| StorageError::Rejected(format!("{}: {}", inner.path.display(), e)))?;

        inner.entries = merged;
        Ok(())
    }
}
