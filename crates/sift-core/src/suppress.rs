//! Suppression controller
//!
//! Per element instance: `Unevaluated -> Suppressed -> Restored`, never back.
//! Suppressing hides the element (it stays in the document) and puts a
//! same-sized placeholder with an undo control in front of it. Undo is the
//! only way to restore.
//!
//! A suppressed element that leaves the document is remembered as detached.
//! If it comes back (a move is reported as removal plus insertion) it goes
//! behind a fresh placeholder with the box captured before hiding.

use std::collections::HashMap;

use crate::clock::SharedClock;
use crate::dom::{BoxMetrics, Dom, DomError, NodeId};
use crate::feedback::{BlockedTally, FeedbackRecord, FeedbackReporter, FeedbackStore, PageContext};
use crate::signature::Signature;
use crate::snapshot::ElementSnapshot;
use crate::types::EventKind;

/// Error type for suppression transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuppressError {
    #[error("DOM update failed: {0}")]
    Dom(#[from] DomError),
    #[error("Node {0:?} was already suppressed or restored")]
    AlreadyHandled(NodeId),
    #[error("No suppressed element behind placeholder {0:?}")]
    UnknownPlaceholder(NodeId),
}

/// Lifecycle state of one element instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionState {
    Unevaluated,
    Suppressed { placeholder: NodeId },
    Restored,
}

#[derive(Debug, Clone)]
struct Suppressed {
    node: NodeId,
    signature: Signature,
    snapshot: ElementSnapshot,
    metrics: BoxMetrics,
}

/// Owns the hide/restore lifecycle and the feedback each transition emits.
pub struct SuppressionController {
    states: HashMap<NodeId, SuppressionState>,
    by_placeholder: HashMap<NodeId, Suppressed>,
    /// Hidden by us, then removed from the document
    detached: HashMap<NodeId, Suppressed>,
    tally: BlockedTally,
    reporter: FeedbackReporter,
    clock: SharedClock,
}

impl SuppressionController {
    pub fn new(tally: BlockedTally, reporter: FeedbackReporter, clock: SharedClock) -> Self {
        Self {
            states: HashMap::new(),
            by_placeholder: HashMap::new(),
            detached: HashMap::new(),
            tally,
            reporter,
            clock,
        }
    }

    pub fn state(&self, node: NodeId) -> SuppressionState {
        self.states.get(&node).copied().unwrap_or(SuppressionState::Unevaluated)
    }

    /// Element hidden behind a placeholder, if still suppressed.
    pub fn suppressed_behind(&self, placeholder: NodeId) -> Option<NodeId> {
        self.by_placeholder.get(&placeholder).map(|s| s.node)
    }

    /// Placeholders currently standing in for suppressed elements.
    pub fn placeholders(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_placeholder.keys().copied()
    }

    /// Whether `node` left the document while suppressed.
    pub fn is_detached(&self, node: NodeId) -> bool {
        self.detached.contains_key(&node)
    }

    pub fn tally(&self) -> &BlockedTally {
        &self.tally
    }

    pub fn tally_mut(&mut self) -> &mut BlockedTally {
        &mut self.tally
    }

    pub fn reporter(&self) -> &FeedbackReporter {
        &self.reporter
    }

    /// Hide `node` behind a placeholder. Returns the placeholder.
    ///
    /// The DOM change is applied first; feedback reporting and persistence
    /// cannot fail the transition.
    pub fn suppress<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        node: NodeId,
        snapshot: &ElementSnapshot,
        signature: &Signature,
        feedback: &mut FeedbackStore,
    ) -> Result<NodeId, SuppressError> {
        if self.state(node) != SuppressionState::Unevaluated {
            return Err(SuppressError::AlreadyHandled(node));
        }

        let metrics = dom.box_metrics(node)?;
        let page = PageContext::capture(&*dom);
        self.emit(EventKind::Detected, snapshot, signature, &page);

        dom.set_hidden(node, true)?;
        let placeholder = match dom.insert_placeholder(node, &metrics) {
            Ok(placeholder) => placeholder,
            Err(e) => {
                // Leave the element visible rather than vanished without undo.
                if let Err(restore) = dom.set_hidden(node, false) {
                    log::warn!("Failed to unhide {:?} after placeholder error: {}", node, restore);
                }
                return Err(e.into());
            }
        };

        self.states.insert(node, SuppressionState::Suppressed { placeholder });
        self.by_placeholder.insert(
            placeholder,
            Suppressed {
                node,
                signature: signature.clone(),
                snapshot: snapshot.clone(),
                metrics,
            },
        );

        self.emit(EventKind::Blocked, snapshot, signature, &page);
        self.tally.increment(signature);
        if signature.is_bare() {
            log::debug!("Not remembering bare signature {}", signature);
        } else {
            feedback.record_confirmed_ad(signature.clone());
        }

        log::debug!("Suppressed {:?} ({}) behind {:?}", node, signature, placeholder);
        Ok(placeholder)
    }

    /// Undo a suppression through its placeholder. Returns the restored element.
    pub fn restore<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        placeholder: NodeId,
        feedback: &mut FeedbackStore,
    ) -> Result<NodeId, SuppressError> {
        let entry = self
            .by_placeholder
            .remove(&placeholder)
            .ok_or(SuppressError::UnknownPlaceholder(placeholder))?;

        if let Err(e) = dom.set_hidden(entry.node, false) {
            self.by_placeholder.insert(placeholder, entry);
            return Err(e.into());
        }
        if let Err(e) = dom.remove(placeholder) {
            log::warn!("Failed to drop placeholder {:?}: {}", placeholder, e);
        }
        self.states.insert(entry.node, SuppressionState::Restored);

        feedback.record_false_positive(entry.signature.clone());
        self.tally.decrement(&entry.signature);
        let page = PageContext::capture(&*dom);
        self.emit(EventKind::FalsePositive, &entry.snapshot, &entry.signature, &page);

        log::debug!("Restored {:?} ({})", entry.node, entry.signature);
        Ok(entry.node)
    }

    /// Drop lifecycle state for a node that left the document, so a later
    /// re-insertion starts as a new instance. A suppressed node's placeholder
    /// is removed with it and the node is kept as detached, since it is still
    /// hidden.
    pub fn forget<D: Dom + ?Sized>(&mut self, dom: &mut D, node: NodeId) {
        if let Some(SuppressionState::Suppressed { placeholder }) = self.states.remove(&node) {
            if let Some(entry) = self.by_placeholder.remove(&placeholder) {
                self.detached.insert(node, entry);
            }
            if dom.is_connected(placeholder) {
                if let Err(e) = dom.remove(placeholder) {
                    log::warn!("Failed to drop orphaned placeholder {:?}: {}", placeholder, e);
                }
            }
        }
    }

    /// A detached element is back in the document. It is put behind a new
    /// placeholder without reporting or counting it again. If its signature
    /// has since become a false positive, or the placeholder can't be
    /// inserted, it is unhidden instead and `Ok(None)` tells the caller to
    /// evaluate it like any new element.
    pub fn reattach<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        node: NodeId,
        feedback: &FeedbackStore,
    ) -> Result<Option<NodeId>, SuppressError> {
        let Some(entry) = self.detached.remove(&node) else {
            return Ok(None);
        };

        if !feedback.is_false_positive(&entry.signature) {
            match dom.insert_placeholder(node, &entry.metrics) {
                Ok(placeholder) => {
                    log::debug!("Re-attached {:?} ({}) behind {:?}", node, entry.signature, placeholder);
                    self.states.insert(node, SuppressionState::Suppressed { placeholder });
                    self.by_placeholder.insert(placeholder, entry);
                    return Ok(Some(placeholder));
                }
                Err(e) => log::warn!("Failed to re-attach placeholder for {:?}: {}", node, e),
            }
        }

        if let Err(e) = dom.set_hidden(node, false) {
            self.detached.insert(node, entry);
            return Err(e.into());
        }
        log::debug!("Unhid re-inserted {:?} ({})", node, entry.signature);
        Ok(None)
    }

    fn emit(&mut self, kind: EventKind, snapshot: &ElementSnapshot, signature: &Signature, page: &PageContext) {
        let record = FeedbackRecord::new(kind, snapshot, signature, page, self.clock.now_millis());
        self.reporter.report(record);
    }
}
