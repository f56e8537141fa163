//! Element snapshots and the feature extractor
//!
//! A snapshot is the plain, immutable record of everything the scorer reads
//! about one element. Extraction is the only place that touches the live DOM
//! on the scoring path.

mod element;
mod extract;

pub use element::*;
pub use extract::*;
