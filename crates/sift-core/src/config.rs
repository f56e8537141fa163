//! Settings and tunables
//!
//! [`Settings`] comes from the host's settings source and tolerates missing
//! or partial state. [`ScorerConfig`] and [`FeedbackConfig`] carry the
//! documented defaults and can be overridden (the CLI does).

use serde::{Deserialize, Serialize};

use crate::feedback::KeyValueStore;
use crate::url::{extract_host, host_matches_domain};

/// Storage key of the persisted feedback verdicts.
pub const FEEDBACK_KEY: &str = "feedbackData";
/// Storage key of the blocked-element tally.
pub const BLOCKED_KEY: &str = "blockedElements";
/// Storage key of the user settings.
pub const SETTINGS_KEY: &str = "settings";

/// Error type for invalid tunables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Threshold must be in (0, 1], got {0}")]
    Threshold(f32),
    #[error("Weight `{0}` must be finite and non-negative")]
    Weight(&'static str),
    #[error("Oversize penalty {penalty} cannot pull a full score below threshold {threshold}")]
    WeakDampening { penalty: f32, threshold: f32 },
    #[error("Capacity must be at least 1")]
    Capacity,
}

// =============================================================================
// Settings
// =============================================================================

/// User settings read before a scan starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    /// Domains (and their subdomains) that are never scanned
    pub whitelist: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            whitelist: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings, falling back to defaults on missing or malformed state.
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        let stored = match storage.get(&[SETTINGS_KEY]) {
            Ok(mut entries) => entries.remove(SETTINGS_KEY),
            Err(e) => {
                log::warn!("Failed to read settings, using defaults: {}", e);
                None
            }
        };

        match stored.map(serde_json::from_value::<Settings>) {
            Some(Ok(settings)) => settings,
            Some(Err(e)) => {
                log::warn!("Malformed settings, using defaults: {}", e);
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Whether the page's host is covered by the whitelist.
    pub fn is_whitelisted(&self, page_url: &str) -> bool {
        let Some(host) = extract_host(page_url) else {
            return false;
        };
        self.whitelist.iter().any(|domain| host_matches_domain(host, domain))
    }
}

// =============================================================================
// Scorer tunables
// =============================================================================

/// Weights and limits of the heuristic scorer, on the unified 0..=1 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScorerConfig {
    /// Scores at or above this are ads
    pub threshold: f32,
    /// Per distinct ad keyword in text + markup
    pub keyword_weight: f32,
    /// Ceiling for the summed keyword contribution
    pub keyword_cap: f32,
    pub ad_size_weight: f32,
    /// Allowed deviation from a canonical ad size, per axis, in px
    pub size_tolerance: f64,
    pub link_image_weight: f32,
    /// Per distinct ad-marker attribute
    pub ad_attribute_weight: f32,
    pub suspicious_class_weight: f32,
    pub suspicious_id_weight: f32,
    pub tracking_href_weight: f32,
    pub frame_weight: f32,
    /// Fraction of the viewport above which an element is dampened
    pub oversize_ratio: f64,
    /// Subtracted after positive signals are capped at 1.0
    pub oversize_penalty: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            keyword_weight: 0.1,
            keyword_cap: 0.3,
            ad_size_weight: 0.3,
            size_tolerance: 10.0,
            link_image_weight: 0.2,
            ad_attribute_weight: 0.3,
            suspicious_class_weight: 0.2,
            suspicious_id_weight: 0.2,
            tracking_href_weight: 0.2,
            frame_weight: 0.2,
            oversize_ratio: 0.8,
            oversize_penalty: 0.6,
        }
    }
}

impl ScorerConfig {
    /// Check the invariants the scorer relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::Threshold(self.threshold));
        }

        let weights = [
            ("keywordWeight", self.keyword_weight),
            ("keywordCap", self.keyword_cap),
            ("adSizeWeight", self.ad_size_weight),
            ("linkImageWeight", self.link_image_weight),
            ("adAttributeWeight", self.ad_attribute_weight),
            ("suspiciousClassWeight", self.suspicious_class_weight),
            ("suspiciousIdWeight", self.suspicious_id_weight),
            ("trackingHrefWeight", self.tracking_href_weight),
            ("frameWeight", self.frame_weight),
            ("oversizePenalty", self.oversize_penalty),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Weight(name));
            }
        }

        // A fully saturated element must still land below the threshold once dampened.
        if 1.0 - self.oversize_penalty >= self.threshold {
            return Err(ConfigError::WeakDampening {
                penalty: self.oversize_penalty,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Feedback tunables
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackConfig {
    /// Maximum members of each verdict set
    pub capacity: usize,
    /// Entries kept in each local backup / fallback log
    pub backup_limit: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            backup_limit: 100,
        }
    }
}

impl FeedbackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Capacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_settings_default_when_absent() {
        let storage = MemoryStorage::new();
        assert_eq!(Settings::load(&storage), Settings::default());
    }

    #[test]
    fn test_settings_tolerate_partial_and_extra_fields() {
        let storage = MemoryStorage::with_entries([(
            SETTINGS_KEY,
            json!({ "enabled": false, "stats": { "totalBlocked": 3 } }),
        )]);
        let settings = Settings::load(&storage);
        assert!(!settings.enabled);
        assert!(settings.whitelist.is_empty());
    }

    #[test]
    fn test_settings_malformed_falls_back() {
        let storage = MemoryStorage::with_entries([(SETTINGS_KEY, json!({ "enabled": "yes" }))]);
        assert_eq!(Settings::load(&storage), Settings::default());
    }

    #[test]
    fn test_whitelist_matches_subdomains() {
        let settings = Settings {
            enabled: true,
            whitelist: vec!["example.com".to_string()],
        };
        assert!(settings.is_whitelisted("https://news.example.com/a"));
        assert!(settings.is_whitelisted("http://example.com"));
        assert!(!settings.is_whitelisted("https://example.org/"));
        assert!(!settings.is_whitelisted("about:blank"));
    }

    #[test]
    fn test_default_scorer_config_is_valid() {
        assert_eq!(ScorerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_weak_dampening_rejected() {
        let config = ScorerConfig {
            oversize_penalty: 0.3,
            ..ScorerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::WeakDampening { .. })));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let config = ScorerConfig {
            threshold: 1.5,
            ..ScorerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Threshold(1.5)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = FeedbackConfig {
            capacity: 0,
            ..FeedbackConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Capacity));
    }
}
