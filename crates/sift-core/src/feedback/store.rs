//! Verdict store: ConfirmedAd and FalsePositive sets
//!
//! A signature is in at most one set. Every mutation is written through to
//! storage immediately; a rejected write is kept in an in-memory fallback
//! log and otherwise swallowed.

use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::config::{FeedbackConfig, FEEDBACK_KEY};
use crate::signature::Signature;
use crate::types::Verdict;

use super::bounded::BoundedSet;
use super::storage::{write_or_fallback, BackupLog, FallbackEntry, KeyValueStore, StorageError};

/// Persisted shape of the verdict sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PersistedFeedback {
    false_positives: Vec<Signature>,
    confirmed_ads: Vec<Signature>,
    timestamp: Option<u64>,
}

/// Bounded feedback memory consulted by the scorer.
pub struct FeedbackStore {
    confirmed_ads: BoundedSet,
    false_positives: BoundedSet,
    storage: Box<dyn KeyValueStore>,
    fallback: BackupLog<FallbackEntry>,
    clock: SharedClock,
}

impl FeedbackStore {
    pub fn new(config: FeedbackConfig, storage: Box<dyn KeyValueStore>, clock: SharedClock) -> Self {
        Self {
            confirmed_ads: BoundedSet::new(config.capacity),
            false_positives: BoundedSet::new(config.capacity),
            storage,
            fallback: BackupLog::new(config.backup_limit),
            clock,
        }
    }

    /// Replace in-memory state with the persisted sets. Absent state leaves
    /// the store empty. Entries beyond capacity keep the most recent ones.
    pub fn load(&mut self) -> Result<(), StorageError> {
        let mut entries = self.storage.get(&[FEEDBACK_KEY])?;
        let persisted = match entries.remove(FEEDBACK_KEY) {
            Some(value) => serde_json::from_value::<PersistedFeedback>(value)
                .map_err(|source| StorageError::Malformed { key: FEEDBACK_KEY, source })?,
            None => PersistedFeedback::default(),
        };

        self.confirmed_ads.clear();
        self.false_positives.clear();
        for signature in persisted.confirmed_ads {
            self.confirmed_ads.insert(signature);
        }
        for signature in persisted.false_positives {
            // FalsePositive wins if stored state violates exclusivity.
            self.confirmed_ads.remove(signature.as_str());
            self.false_positives.insert(signature);
        }

        log::debug!(
            "Loaded feedback: {} confirmed ads, {} false positives",
            self.confirmed_ads.len(),
            self.false_positives.len()
        );
        Ok(())
    }

    /// Write both sets to storage.
    pub fn persist(&mut self) -> Result<(), StorageError> {
        let payload = self.payload();
        let mut entries = serde_json::Map::new();
        entries.insert(FEEDBACK_KEY.to_string(), payload);
        self.storage.set(entries)
    }

    pub fn record_confirmed_ad(&mut self, signature: Signature) {
        self.false_positives.remove(signature.as_str());
        if let Some(evicted) = self.confirmed_ads.insert(signature) {
            log::debug!("Evicted confirmed ad {}", evicted);
        }
        self.persist_or_fallback();
    }

    pub fn record_false_positive(&mut self, signature: Signature) {
        self.confirmed_ads.remove(signature.as_str());
        if let Some(evicted) = self.false_positives.insert(signature) {
            log::debug!("Evicted false positive {}", evicted);
        }
        self.persist_or_fallback();
    }

    pub fn is_confirmed_ad(&self, signature: &Signature) -> bool {
        self.confirmed_ads.contains(signature.as_str())
    }

    pub fn is_false_positive(&self, signature: &Signature) -> bool {
        self.false_positives.contains(signature.as_str())
    }

    pub fn verdict(&self, signature: &Signature) -> Option<Verdict> {
        if self.is_false_positive(signature) {
            Some(Verdict::FalsePositive)
        } else if self.is_confirmed_ad(signature) {
            Some(Verdict::ConfirmedAd)
        } else {
            None
        }
    }

    pub fn confirmed_ads(&self) -> &BoundedSet {
        &self.confirmed_ads
    }

    pub fn false_positives(&self) -> &BoundedSet {
        &self.false_positives
    }

    /// Payloads that failed to persist.
    pub fn fallback(&self) -> &BackupLog<FallbackEntry> {
        &self.fallback
    }

    /// Forget every verdict and persist the empty state.
    pub fn reset(&mut self) {
        self.confirmed_ads.clear();
        self.false_positives.clear();
        self.persist_or_fallback();
    }

    fn payload(&self) -> serde_json::Value {
        let persisted = PersistedFeedback {
            false_positives: self.false_positives.iter().cloned().collect(),
            confirmed_ads: self.confirmed_ads.iter().cloned().collect(),
            timestamp: Some(self.clock.now_millis()),
        };
        serde_json::to_value(persisted).unwrap_or_default()
    }

    fn persist_or_fallback(&mut self) {
        let payload = self.payload();
        let now = self.clock.now_millis();
        write_or_fallback(self.storage.as_mut(), FEEDBACK_KEY, payload, &mut self.fallback, now);
    }
}
