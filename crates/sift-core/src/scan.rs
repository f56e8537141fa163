//! Scan loop
//!
//! A [`Session`] owns everything one page needs: settings, scorer, feedback
//! store and suppression controller. It scans the document once on
//! [`Session::start`] and then every subtree reported by the host's mutation
//! observer through [`Session::on_mutations`].
//!
//! Each element is evaluated at most once per appearance. The identity set is
//! cleared for a subtree when it is removed, so re-insertion counts as a new
//! appearance. A suppressed element that is re-inserted goes back behind a
//! placeholder instead of being scored again. Content added inside a
//! suppressed element is not scanned.

use std::collections::HashSet;

use serde::Serialize;

use crate::clock::SharedClock;
use crate::config::{FeedbackConfig, Settings};
use crate::dom::{Dom, Mutation, NodeId};
use crate::feedback::{BlockedTally, FeedbackReporter, FeedbackSink, FeedbackStore, KeyValueStore};
use crate::scorer::Scorer;
use crate::signature::Signature;
use crate::snapshot::FeatureExtractor;
use crate::suppress::{SuppressError, SuppressionController, SuppressionState};
use crate::types::ScoreSource;

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Elements scored
    pub evaluated: u32,
    /// Elements hidden behind a placeholder
    pub suppressed: u32,
    /// Elements inside a landmark
    pub sanctuary: u32,
    /// Elements that could not be read
    pub skipped: u32,
    /// Suppressions undone by the user
    pub restored: u32,
}

/// What happened to one evaluated element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Kept,
    Suppressed,
    Skipped,
}

/// Classification session for one page.
pub struct Session {
    settings: Settings,
    extractor: FeatureExtractor,
    scorer: Scorer,
    feedback: FeedbackStore,
    controller: SuppressionController,
    evaluated: HashSet<NodeId>,
    stats: ScanStats,
    active: bool,
}

impl Session {
    pub fn new(settings: Settings, scorer: Scorer, feedback: FeedbackStore, controller: SuppressionController) -> Self {
        Self {
            settings,
            extractor: FeatureExtractor::default(),
            scorer,
            feedback,
            controller,
            evaluated: HashSet::new(),
            stats: ScanStats::default(),
            active: false,
        }
    }

    /// Build a session whose feedback store and tally share `storage`.
    pub fn open<S>(
        settings: Settings,
        scorer: Scorer,
        config: FeedbackConfig,
        storage: S,
        sink: Box<dyn FeedbackSink>,
        clock: SharedClock,
    ) -> Self
    where
        S: KeyValueStore + Clone + 'static,
    {
        let feedback = FeedbackStore::new(config, Box::new(storage.clone()), clock.clone());
        let tally = BlockedTally::new(config, Box::new(storage), clock.clone());
        let reporter = FeedbackReporter::new(sink, config.backup_limit);
        let controller = SuppressionController::new(tally, reporter, clock);
        Self::new(settings, scorer, feedback, controller)
    }

    pub fn with_extractor(mut self, extractor: FeatureExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Load persisted state and scan the whole document.
    ///
    /// Returns `false` (and stays inactive) when scanning is disabled or the
    /// page is whitelisted.
    pub fn start<D: Dom + ?Sized>(&mut self, dom: &mut D) -> bool {
        if !self.settings.enabled {
            log::info!("Scanning disabled");
            return false;
        }
        let url = dom.page_url();
        if self.settings.is_whitelisted(&url) {
            log::info!("Page {} is whitelisted", url);
            return false;
        }

        if let Err(e) = self.feedback.load() {
            log::warn!("Failed to load feedback, starting empty: {}", e);
        }
        if let Err(e) = self.controller.tally_mut().load() {
            log::warn!("Failed to load blocked tally, starting empty: {}", e);
        }

        self.active = true;
        let root = dom.root();
        for child in dom.children(root) {
            self.scan_subtree(dom, child);
        }

        log::info!(
            "Scanned {}: {} evaluated, {} suppressed, {} skipped",
            url,
            self.stats.evaluated,
            self.stats.suppressed,
            self.stats.skipped
        );
        true
    }

    /// Handle one batch of mutation records. Ignored until started.
    pub fn on_mutations<D: Dom + ?Sized>(&mut self, dom: &mut D, mutations: &[Mutation]) {
        if !self.active {
            return;
        }
        for mutation in mutations {
            match *mutation {
                Mutation::Removed(node) => self.forget_subtree(dom, node),
                Mutation::Added(node) => {
                    if dom.is_connected(node) && !self.inside_suppressed(&*dom, node) {
                        self.scan_subtree(dom, node);
                    }
                }
            }
        }
    }

    /// User activated the undo control of `placeholder`.
    pub fn undo<D: Dom + ?Sized>(&mut self, dom: &mut D, placeholder: NodeId) -> Result<NodeId, SuppressError> {
        let node = self.controller.restore(dom, placeholder, &mut self.feedback)?;
        self.stats.restored += 1;
        Ok(node)
    }

    /// Clear the verdict sets and the blocked tally.
    pub fn reset(&mut self) {
        self.feedback.reset();
        self.controller.tally_mut().reset();
        log::info!("Feedback and blocked tally reset");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }

    pub fn controller(&self) -> &SuppressionController {
        &self.controller
    }

    pub fn tally(&self) -> &BlockedTally {
        self.controller.tally()
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn state(&self, node: NodeId) -> SuppressionState {
        self.controller.state(node)
    }

    /// Evaluate `node` and its descendants, skipping anything already seen
    /// in this appearance. Suppressed and unreadable subtrees are not entered.
    fn scan_subtree<D: Dom + ?Sized>(&mut self, dom: &mut D, node: NodeId) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            if dom.is_placeholder(node) {
                continue;
            }
            if self.controller.is_detached(node) {
                match self.controller.reattach(dom, node, &self.feedback) {
                    Ok(Some(_)) => {
                        self.evaluated.insert(node);
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("Failed to unhide re-inserted {:?}: {}", node, e);
                        self.stats.skipped += 1;
                        continue;
                    }
                }
            }
            if self.evaluated.insert(node) {
                match self.evaluate(dom, node) {
                    Outcome::Kept => {}
                    Outcome::Suppressed | Outcome::Skipped => continue,
                }
            } else if matches!(self.controller.state(node), SuppressionState::Suppressed { .. }) {
                continue;
            }
            // Reverse so siblings pop in document order.
            stack.extend(dom.children(node).into_iter().rev());
        }
    }

    fn evaluate<D: Dom + ?Sized>(&mut self, dom: &mut D, node: NodeId) -> Outcome {
        let snapshot = match self.extractor.extract(&*dom, node) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("Skipping {:?}: {}", node, e);
                self.stats.skipped += 1;
                return Outcome::Skipped;
            }
        };
        self.stats.evaluated += 1;

        let signature = Signature::of(&snapshot);
        let result = self.scorer.score(&snapshot, &self.feedback);
        if result.source == ScoreSource::Sanctuary {
            self.stats.sanctuary += 1;
        }
        log::debug!(
            "{:?} {} scored {:.2} ({:?}, {:?})",
            node,
            signature,
            result.score,
            result.source,
            result.signals.labels()
        );
        if !result.is_ad {
            return Outcome::Kept;
        }

        match self
            .controller
            .suppress(dom, node, &snapshot, &signature, &mut self.feedback)
        {
            Ok(_) => {
                self.stats.suppressed += 1;
                Outcome::Suppressed
            }
            Err(e) => {
                log::warn!("Failed to suppress {:?} ({}): {}", node, signature, e);
                Outcome::Kept
            }
        }
    }

    fn inside_suppressed<D: Dom + ?Sized>(&self, dom: &D, node: NodeId) -> bool {
        let mut current = dom.parent(node);
        while let Some(ancestor) = current {
            if matches!(self.controller.state(ancestor), SuppressionState::Suppressed { .. }) {
                return true;
            }
            current = dom.parent(ancestor);
        }
        false
    }

    fn forget_subtree<D: Dom + ?Sized>(&mut self, dom: &mut D, node: NodeId) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            self.evaluated.remove(&node);
            self.controller.forget(dom, node);
            stack.extend(dom.children(node));
        }
    }
}
