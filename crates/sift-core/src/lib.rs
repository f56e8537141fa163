//! AdSift Core Library
//!
//! Heuristic ad-element classification for web pages. Elements are read off
//! the live document into plain snapshots, scored against a weighted rule set
//! on a single 0.0..=1.0 scale, and suppressed behind a reversible
//! placeholder when they cross the threshold. User corrections feed a bounded
//! verdict memory that overrides the heuristics for the same signature.
//!
//! # Architecture
//!
//! The host (browser content script, or the in-memory [`dom::Document`])
//! implements [`dom::Dom`]. A [`scan::Session`] drives everything else on the
//! host's event-loop thread; nothing here is `Send`.
//!
//! # Modules
//!
//! - `types`: Verdicts, event kinds, score signals and results
//! - `hash`: Murmur3 hash functions for element fingerprints
//! - `url`: Fast URL host extraction without allocations
//! - `dom`: Host document interface and the in-memory arena document
//! - `snapshot`: Element snapshots and the feature extractor
//! - `signature`: Feedback keys and diagnostic fingerprints
//! - `scorer`: The ad scorer
//! - `feedback`: Verdict store, blocked tally, persistence and feedback sink
//! - `suppress`: Hide/restore lifecycle
//! - `scan`: Scan loop and session
//! - `config`: Settings and tunables
//! - `clock`: Timestamp source

pub mod clock;
pub mod config;
pub mod dom;
pub mod feedback;
pub mod hash;
pub mod scan;
pub mod scorer;
pub mod signature;
pub mod snapshot;
pub mod suppress;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use clock::{Clock, SharedClock, SystemClock};
pub use config::{FeedbackConfig, ScorerConfig, Settings};
pub use dom::{Document, Dom, Mutation, NodeId};
pub use feedback::{FeedbackSink, FeedbackStore, KeyValueStore, MemoryStorage};
pub use scan::{ScanStats, Session};
pub use scorer::Scorer;
pub use signature::{Fingerprint, Signature};
pub use snapshot::{ElementSnapshot, FeatureExtractor};
pub use types::{EventKind, ScoreResult, ScoreSource, Signals, Verdict};
