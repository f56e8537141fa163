//! Core type definitions for AdSift
//!
//! These types are shared by the scorer, the feedback store and the
//! suppression controller, and several of them appear on the wire in
//! persisted state and feedback records.

use serde::{Deserialize, Serialize};

// =============================================================================
// Verdicts
// =============================================================================

/// Human-confirmed (or detection-confirmed) classification of a signature.
///
/// A signature holds at most one verdict at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Element was suppressed and the user never objected
    ConfirmedAd,
    /// User restored the element through the undo affordance
    FalsePositive,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmedAd => "confirmed_ad",
            Self::FalsePositive => "false_positive",
        }
    }
}

// =============================================================================
// Feedback Events
// =============================================================================

/// Kind of event reported to the feedback sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Scorer crossed the threshold for an element
    Detected,
    /// Element was replaced by a placeholder
    Blocked,
    /// User undid a suppression
    FalsePositive,
}

impl EventKind {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Blocked => "blocked",
            Self::FalsePositive => "false_positive",
        }
    }

    /// Whether the event asserts that the element is an ad.
    pub fn is_confirmed_ad(&self) -> bool {
        !matches!(self, Self::FalsePositive)
    }
}

// =============================================================================
// Score Signals (bit flags recording which heuristics fired)
// =============================================================================

bitflags::bitflags! {
    /// Heuristic signals that contributed to a score.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u16 {
        /// Ad keyword found in text or markup
        const KEYWORD = 1 << 0;
        /// Size matches a canonical ad unit
        const AD_SIZE = 1 << 1;
        /// Subtree has both a hyperlink and an image
        const LINK_AND_IMAGE = 1 << 2;
        /// Ad-marker attribute present (data-ad*)
        const AD_ATTRIBUTE = 1 << 3;
        /// Suspicious class token
        const SUSPICIOUS_CLASS = 1 << 4;
        /// Suspicious id
        const SUSPICIOUS_ID = 1 << 5;
        /// href points at a tracking/ad path
        const TRACKING_HREF = 1 << 6;
        /// Element is an embedded frame
        const FRAME = 1 << 7;
        /// Element covers most of the viewport (dampened)
        const OVERSIZED = 1 << 8;
    }
}

impl Signals {
    /// Lowercase names of the set flags, for logs and CLI output.
    pub fn labels(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect()
    }
}

// =============================================================================
// Score Result
// =============================================================================

/// What decided the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Weighted heuristics
    Heuristic,
    /// Element is, or sits inside, a structural landmark
    Sanctuary,
    /// Signature carries a FalsePositive verdict
    KnownFalsePositive,
    /// Signature carries a ConfirmedAd verdict
    KnownAd,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Sanctuary => "sanctuary",
            Self::KnownFalsePositive => "known_false_positive",
            Self::KnownAd => "known_ad",
        }
    }
}

/// Result of scoring one element snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreResult {
    /// Confidence on the unified 0.0..=1.0 scale
    pub score: f32,
    /// Whether the score reached the decision threshold
    pub is_ad: bool,
    /// What decided the score
    pub source: ScoreSource,
    /// Heuristics that fired (empty for overrides)
    pub signals: Signals,
}

impl ScoreResult {
    /// Lowest score on the unified scale.
    pub const MIN: f32 = 0.0;
    /// Highest score on the unified scale.
    pub const MAX: f32 = 1.0;

    pub(crate) fn forced(source: ScoreSource) -> Self {
        let is_ad = source == ScoreSource::KnownAd;
        Self {
            score: if is_ad { Self::MAX } else { Self::MIN },
            is_ad,
            source,
            signals: Signals::empty(),
        }
    }
}
