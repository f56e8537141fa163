//! Feature extractor: live element -> [`ElementSnapshot`]

use crate::dom::{is_sanctuary, Dom, DomError, NodeId};

use super::element::{truncate, Attribute, ElementSnapshot, Position, Size};

/// Default cap for captured inner markup, in characters.
pub const DEFAULT_MARKUP_CAP: usize = 1000;
/// Default cap for captured inner text, in characters.
pub const DEFAULT_TEXT_CAP: usize = 500;

/// Error type for feature extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("DOM read failed: {0}")]
    Dom(#[from] DomError),
    #[error("Node {0:?} is a placeholder")]
    Placeholder(NodeId),
}

/// Reads a snapshot off a live element without mutating it.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    pub markup_cap: usize,
    pub text_cap: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            markup_cap: DEFAULT_MARKUP_CAP,
            text_cap: DEFAULT_TEXT_CAP,
        }
    }
}

impl FeatureExtractor {
    pub fn new(markup_cap: usize, text_cap: usize) -> Self {
        Self { markup_cap, text_cap }
    }

    /// Snapshot `node`. Fails if the node vanished or the host threw.
    pub fn extract<D: Dom + ?Sized>(&self, dom: &D, node: NodeId) -> Result<ElementSnapshot, ExtractError> {
        if dom.is_placeholder(node) {
            return Err(ExtractError::Placeholder(node));
        }

        let tag_name = dom.tag_name(node)?;
        let attributes: Vec<Attribute> = dom
            .attributes(node)?
            .into_iter()
            .map(|(name, value)| Attribute { name, value })
            .collect();

        let id = attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case("id"))
            .map(|a| a.value.clone())
            .unwrap_or_default();
        let classes = attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case("class"))
            .map(|a| a.value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let rect = dom.bounding_rect(node)?;
        let styles = dom.computed_style(node)?;
        let inner_html = truncate(&dom.inner_markup(node)?, self.markup_cap);
        let inner_text = truncate(&dom.inner_text(node)?, self.text_cap);
        let link_count = dom.count_descendants(node, "a")?;
        let image_count = dom.count_descendants(node, "img")?;
        let landmark = find_landmark(dom, node, &tag_name, &attributes)?;

        Ok(ElementSnapshot {
            tag_name,
            id,
            classes,
            size: Size {
                width: rect.width,
                height: rect.height,
            },
            position: Position {
                top: rect.top,
                left: rect.left,
            },
            styles,
            attributes,
            inner_html,
            inner_text,
            link_count,
            image_count,
            landmark,
            viewport: dom.viewport(),
        })
    }
}

/// Closest landmark among the node itself and its ancestors.
fn find_landmark<D: Dom + ?Sized>(
    dom: &D,
    node: NodeId,
    tag: &str,
    attributes: &[Attribute],
) -> Result<Option<String>, DomError> {
    let role = attributes
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case("role"))
        .map(|a| a.value.as_str());
    if is_sanctuary(tag, role) {
        return Ok(Some(tag.to_string()));
    }

    let mut current = dom.parent(node);
    while let Some(ancestor) = current {
        let tag = dom.tag_name(ancestor)?;
        let attrs = dom.attributes(ancestor)?;
        let role = attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("role"))
            .map(|(_, value)| value.as_str());
        if is_sanctuary(&tag, role) {
            return Ok(Some(tag));
        }
        current = dom.parent(ancestor);
    }
    Ok(None)
}
