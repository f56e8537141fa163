//! Feedback records and delivery
//!
//! Records are fire-and-forget: a failed delivery is logged and kept in a
//! bounded error log, and never undoes a DOM change already applied.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::dom::{Dom, PageMetadata, ResourceRequest};
use crate::signature::{Fingerprint, Signature};
use crate::snapshot::{Attribute, ElementSnapshot, Position, Size};
use crate::types::EventKind;
use crate::url::extract_host;

use super::storage::BackupLog;

/// Initiator kinds whose requests are attached to records.
pub const REPORTED_INITIATORS: &[&str] = &["script", "img"];

/// Error type for sink delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Feedback sink rejected record: {0}")]
    Rejected(String),
    #[error("Feedback sink unavailable")]
    Unavailable,
}

/// Page context shared by every record emitted for one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContext {
    pub url: String,
    pub host: String,
    pub metadata: PageMetadata,
    pub requests: Vec<ResourceRequest>,
}

impl PageContext {
    pub fn capture<D: Dom + ?Sized>(dom: &D) -> Self {
        let url = dom.page_url();
        let host = extract_host(&url).unwrap_or_default().to_string();
        let requests = dom
            .resource_requests()
            .into_iter()
            .filter(|r| REPORTED_INITIATORS.contains(&r.initiator.as_str()))
            .collect();
        Self {
            url,
            host,
            metadata: dom.page_metadata(),
            requests,
        }
    }
}

/// The identifying subset of a snapshot carried by a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    pub tag_name: String,
    pub id: String,
    pub classes: Vec<String>,
    pub size: Size,
    pub position: Position,
    pub attributes: Vec<Attribute>,
}

impl From<&ElementSnapshot> for ElementSummary {
    fn from(snapshot: &ElementSnapshot) -> Self {
        Self {
            tag_name: snapshot.tag_name.clone(),
            id: snapshot.id.clone(),
            classes: snapshot.classes.clone(),
            size: snapshot.size,
            position: snapshot.position,
            attributes: snapshot.attributes.clone(),
        }
    }
}

/// One detection / suppression / undo event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Epoch milliseconds
    pub timestamp: u64,
    pub url: String,
    #[serde(rename = "domain")]
    pub host: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub is_confirmed_ad: bool,
    pub signature: Signature,
    pub fingerprint: Fingerprint,
    pub element: ElementSummary,
    pub page_metadata: PageMetadata,
    pub network_requests: Vec<ResourceRequest>,
}

impl FeedbackRecord {
    pub fn new(
        kind: EventKind,
        snapshot: &ElementSnapshot,
        signature: &Signature,
        page: &PageContext,
        timestamp: u64,
    ) -> Self {
        Self {
            timestamp,
            url: page.url.clone(),
            host: page.host.clone(),
            kind,
            is_confirmed_ad: kind.is_confirmed_ad(),
            signature: signature.clone(),
            fingerprint: Fingerprint::of(snapshot),
            element: ElementSummary::from(snapshot),
            page_metadata: page.metadata.clone(),
            network_requests: page.requests.clone(),
        }
    }
}

/// External consumer of feedback records.
pub trait FeedbackSink {
    fn submit(&mut self, record: &FeedbackRecord) -> Result<(), SinkError>;
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FeedbackSink for NullSink {
    fn submit(&mut self, _record: &FeedbackRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink collecting records in memory. Clones share the collection.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<FeedbackRecord>>>,
    failing: Rc<RefCell<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.borrow_mut() = failing;
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.records.borrow().iter().map(|r| r.kind).collect()
    }
}

impl FeedbackSink for MemorySink {
    fn submit(&mut self, record: &FeedbackRecord) -> Result<(), SinkError> {
        if *self.failing.borrow() {
            return Err(SinkError::Unavailable);
        }
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}

/// A delivery that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkFailure {
    pub timestamp: u64,
    pub error: String,
    pub data: FeedbackRecord,
}

/// Delivers records to a sink and keeps bounded local copies.
pub struct FeedbackReporter {
    sink: Box<dyn FeedbackSink>,
    backup: BackupLog<FeedbackRecord>,
    errors: BackupLog<SinkFailure>,
}

impl FeedbackReporter {
    pub fn new(sink: Box<dyn FeedbackSink>, backup_limit: usize) -> Self {
        Self {
            sink,
            backup: BackupLog::new(backup_limit),
            errors: BackupLog::new(backup_limit),
        }
    }

    /// Submit a record. Never fails; returns whether the sink accepted it.
    pub fn report(&mut self, record: FeedbackRecord) -> bool {
        match self.sink.submit(&record) {
            Ok(()) => {
                self.backup.push(record);
                true
            }
            Err(e) => {
                log::warn!("Failed to deliver {} feedback for {}: {}", record.kind.as_str(), record.signature, e);
                self.errors.push(SinkFailure {
                    timestamp: record.timestamp,
                    error: e.to_string(),
                    data: record,
                });
                false
            }
        }
    }

    /// Delivered records, oldest first.
    pub fn backup(&self) -> &BackupLog<FeedbackRecord> {
        &self.backup
    }

    /// Failed deliveries, oldest first.
    pub fn errors(&self) -> &BackupLog<SinkFailure> {
        &self.errors
    }
}
