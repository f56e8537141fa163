//! Blocked-element tally (diagnostics only, never read by the scorer)

use std::collections::BTreeMap;

use crate::clock::SharedClock;
use crate::config::{FeedbackConfig, BLOCKED_KEY};
use crate::signature::Signature;

use super::storage::{write_or_fallback, BackupLog, FallbackEntry, KeyValueStore, StorageError};

/// Signature -> number of times it was suppressed and not undone.
pub struct BlockedTally {
    counts: BTreeMap<Signature, u32>,
    storage: Box<dyn KeyValueStore>,
    fallback: BackupLog<FallbackEntry>,
    clock: SharedClock,
}

impl BlockedTally {
    pub fn new(config: FeedbackConfig, storage: Box<dyn KeyValueStore>, clock: SharedClock) -> Self {
        Self {
            counts: BTreeMap::new(),
            storage,
            fallback: BackupLog::new(config.backup_limit),
            clock,
        }
    }

    pub fn load(&mut self) -> Result<(), StorageError> {
        let mut entries = self.storage.get(&[BLOCKED_KEY])?;
        self.counts = match entries.remove(BLOCKED_KEY) {
            Some(value) => serde_json::from_value(value)
                .map_err(|source| StorageError::Malformed { key: BLOCKED_KEY, source })?,
            None => BTreeMap::new(),
        };
        self.counts.retain(|_, count| *count > 0);
        Ok(())
    }

    pub fn increment(&mut self, signature: &Signature) -> u32 {
        let count = self.counts.entry(signature.clone()).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;
        self.persist_or_fallback();
        count
    }

    /// Decrement, dropping the entry when it reaches zero.
    pub fn decrement(&mut self, signature: &Signature) -> u32 {
        let Some(count) = self.counts.get_mut(signature) else {
            return 0;
        };
        let remaining = count.saturating_sub(1);
        if remaining == 0 {
            self.counts.remove(signature);
        } else {
            *count = remaining;
        }
        self.persist_or_fallback();
        remaining
    }

    pub fn count(&self, signature: &Signature) -> u32 {
        self.counts.get(signature).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Signature, u32)> {
        self.counts.iter().map(|(sig, &count)| (sig, count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn fallback(&self) -> &BackupLog<FallbackEntry> {
        &self.fallback
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.persist_or_fallback();
    }

    fn persist_or_fallback(&mut self) {
        let payload = serde_json::to_value(&self.counts).unwrap_or_default();
        let now = self.clock.now_millis();
        write_or_fallback(self.storage.as_mut(), BLOCKED_KEY, payload, &mut self.fallback, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::feedback::MemoryStorage;
    use serde_json::json;
    use std::rc::Rc;

    fn tally(storage: &MemoryStorage) -> BlockedTally {
        BlockedTally::new(FeedbackConfig::default(), Box::new(storage.clone()), Rc::new(FixedClock(0)))
    }

    #[test]
    fn test_increment_decrement() {
        let storage = MemoryStorage::new();
        let mut t = tally(&storage);
        let s = Signature::from("div#.ad");

        assert_eq!(t.increment(&s), 1);
        assert_eq!(t.increment(&s), 2);
        assert_eq!(storage.value(BLOCKED_KEY), Some(json!({ "div#.ad": 2 })));

        assert_eq!(t.decrement(&s), 1);
        assert_eq!(t.decrement(&s), 0);
        assert!(t.is_empty());
        assert_eq!(storage.value(BLOCKED_KEY), Some(json!({})));
        assert_eq!(t.decrement(&s), 0);
    }

    #[test]
    fn test_load_drops_zero_counts() {
        let storage = MemoryStorage::with_entries([(BLOCKED_KEY, json!({ "a#": 3, "b#": 0 }))]);
        let mut t = tally(&storage);
        t.load().unwrap();
        assert_eq!(t.count(&Signature::from("a#")), 3);
        assert_eq!(t.len(), 1);
        assert_eq!(t.total(), 3);
    }

    #[test]
    fn test_rejected_write_is_kept_in_memory() {
        let storage = MemoryStorage::new();
        storage.set_read_only(true);
        let mut t = tally(&storage);
        t.increment(&Signature::from("a#"));
        assert_eq!(t.count(&Signature::from("a#")), 1);
        assert_eq!(t.fallback().len(), 1);
    }
}
