//! Host DOM abstraction
//!
//! Every read the classifier makes against a live page, and the two writes
//! the suppression controller needs, go through [`Dom`]. The browser binding
//! implements it over the real document; [`Document`] is an in-memory arena
//! used by the CLI and the tests.

mod arena;

pub use arena::*;

use serde::{Deserialize, Serialize};

/// Handle to an element in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Error type for DOM access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("Node {0:?} is no longer attached to the document")]
    Detached(NodeId),
    #[error("Node {0:?} has no parent to insert into")]
    NoParent(NodeId),
    #[error("Host rejected DOM access: {0}")]
    Host(String),
}

/// Viewport-relative bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// Viewport dimensions at the time of a read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// The computed-style properties the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyle {
    pub display: String,
    pub position: String,
    pub z_index: String,
    pub visibility: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            position: "static".to_string(),
            z_index: "auto".to_string(),
            visibility: "visible".to_string(),
        }
    }
}

/// Rendered box of an element, captured before it is hidden so the
/// placeholder can occupy the same space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxMetrics {
    pub width: f64,
    pub height: f64,
    pub margin: String,
    pub padding: String,
}

/// Page-level metadata attached to feedback records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub keywords: String,
}

/// A sub-resource request observed during the page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub url: String,
    /// Initiator kind as reported by the host (`script`, `img`, ...)
    #[serde(rename = "type")]
    pub initiator: String,
    pub duration: f64,
}

/// Subtree change delivered by the host's mutation observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Added(NodeId),
    Removed(NodeId),
}

/// Read/write access to a live document.
///
/// Reads may trigger style or layout recalculation in a real browser.
pub trait Dom {
    /// Root of the scan (the document body).
    fn root(&self) -> NodeId;

    fn viewport(&self) -> Viewport;

    fn page_url(&self) -> String;

    fn page_metadata(&self) -> PageMetadata;

    fn resource_requests(&self) -> Vec<ResourceRequest>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Element children in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Whether the node is still reachable from the root.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Lowercase tag name.
    fn tag_name(&self, node: NodeId) -> Result<String, DomError>;

    /// Attributes in source order.
    fn attributes(&self, node: NodeId) -> Result<Vec<(String, String)>, DomError>;

    fn bounding_rect(&self, node: NodeId) -> Result<Rect, DomError>;

    fn computed_style(&self, node: NodeId) -> Result<ComputedStyle, DomError>;

    fn box_metrics(&self, node: NodeId) -> Result<BoxMetrics, DomError>;

    fn inner_text(&self, node: NodeId) -> Result<String, DomError>;

    fn inner_markup(&self, node: NodeId) -> Result<String, DomError>;

    /// Number of descendants (excluding `node`) with the given tag.
    fn count_descendants(&self, node: NodeId, tag: &str) -> Result<usize, DomError>;

    /// Whether the node is a placeholder this crate inserted.
    fn is_placeholder(&self, node: NodeId) -> bool;

    /// Toggle `display: none` without removing the node.
    fn set_hidden(&mut self, node: NodeId, hidden: bool) -> Result<(), DomError>;

    /// Insert a placeholder of the given box directly before `node`. The
    /// placeholder carries the undo affordance; activating it must call back
    /// into the session with the returned id.
    fn insert_placeholder(&mut self, node: NodeId, metrics: &BoxMetrics) -> Result<NodeId, DomError>;

    /// Detach a node (used to drop placeholders).
    fn remove(&mut self, node: NodeId) -> Result<(), DomError>;
}

/// Landmark tags that are never suppressed, nor is anything inside them.
pub const SANCTUARY_TAGS: &[&str] = &[
    "header", "footer", "nav", "main", "article", "section", "form", "search", "menu", "dialog",
];

/// Whether a tag/role pair marks a structural landmark.
pub fn is_sanctuary(tag: &str, role: Option<&str>) -> bool {
    SANCTUARY_TAGS.contains(&tag) || role.is_some_and(|r| r.eq_ignore_ascii_case("search"))
}
