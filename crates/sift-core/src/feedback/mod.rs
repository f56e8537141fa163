//! Feedback memory
//!
//! - `storage`: key-value persistence interface and the in-memory store
//! - `bounded`: capacity-limited FIFO set
//! - `store`: ConfirmedAd / FalsePositive verdict sets
//! - `tally`: blocked-element diagnostics counter
//! - `record`: feedback records, the sink interface and bounded backups

mod bounded;
mod record;
mod storage;
mod store;
mod tally;

pub use bounded::BoundedSet;
pub use record::*;
pub use storage::*;
pub use store::FeedbackStore;
pub use tally::BlockedTally;
