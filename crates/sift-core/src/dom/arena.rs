//! In-memory arena document
//!
//! Nodes live in a flat `Vec` and are addressed by [`NodeId`]. Detached
//! subtrees stay in the arena so they can be re-inserted, and every
//! insertion or removal under the root is queued as a [`Mutation`] the way a
//! browser mutation observer would report it.

use serde::{Deserialize, Serialize};

use super::*;

const PLACEHOLDER_CLASS: &str = "adsift-placeholder";
const UNDO_LABEL: &str = "Not an ad";

// =============================================================================
// Declarative element description (also the CLI's page format)
// =============================================================================

/// Declarative description of an element subtree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Text content owned directly by this element
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub style: ComputedStyle,
    #[serde(default)]
    pub margin: String,
    #[serde(default)]
    pub padding: String,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.rect.width = width;
        self.rect.height = height;
        self
    }

    pub fn at(mut self, top: f64, left: f64) -> Self {
        self.rect.top = top;
        self.rect.left = left;
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Declarative description of a whole page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    pub url: String,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub metadata: PageMetadata,
    #[serde(default)]
    pub resources: Vec<ResourceRequest>,
    /// Children of the document body
    #[serde(default)]
    pub body: Vec<ElementSpec>,
}

// =============================================================================
// Arena
// =============================================================================

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    rect: Rect,
    style: ComputedStyle,
    margin: String,
    padding: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
    placeholder_for: Option<NodeId>,
}

impl Node {
    fn from_spec(spec: &ElementSpec) -> Self {
        Self {
            tag: spec.tag.to_ascii_lowercase(),
            attributes: spec.attributes.clone(),
            text: spec.text.clone(),
            rect: spec.rect,
            style: spec.style.clone(),
            margin: spec.margin.clone(),
            padding: spec.padding.clone(),
            parent: None,
            children: Vec::new(),
            hidden: false,
            placeholder_for: None,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// In-memory document implementing [`Dom`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    url: String,
    viewport: Viewport,
    metadata: PageMetadata,
    resources: Vec<ResourceRequest>,
    mutations: Vec<Mutation>,
}

impl Document {
    /// Create an empty document with a `body` root.
    pub fn new(url: &str, viewport: Viewport) -> Self {
        let mut body = Node::from_spec(&ElementSpec::new("body"));
        body.rect = Rect {
            top: 0.0,
            left: 0.0,
            width: viewport.width,
            height: viewport.height,
        };
        Self {
            nodes: vec![body],
            root: NodeId(0),
            url: url.to_string(),
            viewport,
            metadata: PageMetadata::default(),
            resources: Vec::new(),
            mutations: Vec::new(),
        }
    }

    /// Build a document from a page description. The initial content does
    /// not produce mutation records.
    pub fn from_spec(spec: &PageSpec) -> Self {
        let mut doc = Self::new(&spec.url, spec.viewport);
        doc.metadata = spec.metadata.clone();
        doc.resources = spec.resources.clone();
        let root = doc.root;
        for child in &spec.body {
            let id = doc.build(child);
            doc.link(root, id, None);
        }
        doc
    }

    pub fn set_metadata(&mut self, metadata: PageMetadata) {
        self.metadata = metadata;
    }

    pub fn add_resource(&mut self, request: ResourceRequest) {
        self.resources.push(request);
    }

    /// Append a new subtree under `parent`, queueing one `Added` record.
    pub fn append(&mut self, parent: NodeId, spec: &ElementSpec) -> Result<NodeId, DomError> {
        self.node(parent)?;
        let id = self.build(spec);
        self.link(parent, id, None);
        self.record(Mutation::Added(id));
        Ok(id)
    }

    /// Re-insert a previously detached node under `parent`.
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<(), DomError> {
        self.node(parent)?;
        if self.node(node)?.parent.is_some() {
            self.unlink(node);
        }
        self.link(parent, node, None);
        self.record(Mutation::Added(node));
        Ok(())
    }

    /// Drain the queued mutation records.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    /// First connected element whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .find(|&n| self.nodes[n.0 as usize].attribute("id") == Some(id) && self.is_connected(n))
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.node(node).map(|n| n.hidden).unwrap_or(false)
    }

    /// Element a placeholder stands in for.
    pub fn placeholder_for(&self, placeholder: NodeId) -> Option<NodeId> {
        self.node(placeholder).ok().and_then(|n| n.placeholder_for)
    }

    /// Connected placeholders currently in the document.
    pub fn placeholders(&self) -> Vec<NodeId> {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(|&n| self.is_placeholder(n) && self.is_connected(n))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0 as usize).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0 as usize).ok_or(DomError::UnknownNode(id))
    }

    /// Connected node, or the reason it can't be read.
    fn live(&self, id: NodeId) -> Result<&Node, DomError> {
        let node = self.node(id)?;
        if !self.is_connected(id) {
            return Err(DomError::Detached(id));
        }
        Ok(node)
    }

    fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::from_spec(spec));
        for child in &spec.children {
            let child_id = self.build(child);
            self.link(id, child_id, None);
        }
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let siblings = &mut self.nodes[parent.0 as usize].children;
        let pos = before
            .and_then(|b| siblings.iter().position(|&c| c == b))
            .unwrap_or(siblings.len());
        siblings.insert(pos, child);
        self.nodes[child.0 as usize].parent = Some(parent);
    }

    fn unlink(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0 as usize].parent.take() {
            self.nodes[parent.0 as usize].children.retain(|&c| c != child);
        }
    }

    fn record(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    fn collect_text(&self, id: NodeId, out: &mut Vec<String>) {
        let node = &self.nodes[id.0 as usize];
        let text = node.text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0 as usize];
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;")));
        }
        out.push('>');
        out.push_str(&node.text);
        for &child in &node.children {
            self.write_markup(child, out);
        }
        out.push_str(&format!("</{}>", node.tag));
    }

    fn count_tag(&self, id: NodeId, tag: &str) -> usize {
        self.nodes[id.0 as usize]
            .children
            .iter()
            .map(|&c| usize::from(self.nodes[c.0 as usize].tag == tag) + self.count_tag(c, tag))
            .sum()
    }
}

impl Dom for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn page_url(&self) -> String {
        self.url.clone()
    }

    fn page_metadata(&self) -> PageMetadata {
        self.metadata.clone()
    }

    fn resource_requests(&self) -> Vec<ResourceRequest> {
        self.resources.clone()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok().and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn tag_name(&self, node: NodeId) -> Result<String, DomError> {
        Ok(self.live(node)?.tag.clone())
    }

    fn attributes(&self, node: NodeId) -> Result<Vec<(String, String)>, DomError> {
        Ok(self.live(node)?.attributes.clone())
    }

    fn bounding_rect(&self, node: NodeId) -> Result<Rect, DomError> {
        let n = self.live(node)?;
        // Hidden elements have no layout box.
        Ok(if n.hidden { Rect::default() } else { n.rect })
    }

    fn computed_style(&self, node: NodeId) -> Result<ComputedStyle, DomError> {
        let n = self.live(node)?;
        let mut style = n.style.clone();
        if n.hidden {
            style.display = "none".to_string();
        }
        Ok(style)
    }

    fn box_metrics(&self, node: NodeId) -> Result<BoxMetrics, DomError> {
        let rect = self.bounding_rect(node)?;
        let n = self.live(node)?;
        Ok(BoxMetrics {
            width: rect.width,
            height: rect.height,
            margin: n.margin.clone(),
            padding: n.padding.clone(),
        })
    }

    fn inner_text(&self, node: NodeId) -> Result<String, DomError> {
        self.live(node)?;
        let mut parts = Vec::new();
        self.collect_text(node, &mut parts);
        Ok(parts.join(" "))
    }

    fn inner_markup(&self, node: NodeId) -> Result<String, DomError> {
        let n = self.live(node)?;
        let mut out = n.text.clone();
        for &child in &n.children {
            self.write_markup(child, &mut out);
        }
        Ok(out)
    }

    fn count_descendants(&self, node: NodeId, tag: &str) -> Result<usize, DomError> {
        self.live(node)?;
        Ok(self.count_tag(node, tag))
    }

    fn is_placeholder(&self, node: NodeId) -> bool {
        self.node(node).map(|n| n.placeholder_for.is_some()).unwrap_or(false)
    }

    fn set_hidden(&mut self, node: NodeId, hidden: bool) -> Result<(), DomError> {
        self.live(node)?;
        self.node_mut(node)?.hidden = hidden;
        Ok(())
    }

    fn insert_placeholder(&mut self, node: NodeId, metrics: &BoxMetrics) -> Result<NodeId, DomError> {
        let target = self.live(node)?;
        let parent = target.parent.ok_or(DomError::NoParent(node))?;
        let origin = target.rect;

        let spec = ElementSpec::new("div")
            .class(PLACEHOLDER_CLASS)
            .at(origin.top, origin.left)
            .size(metrics.width, metrics.height)
            .child(ElementSpec::new("button").attr("type", "button").text(UNDO_LABEL));
        let placeholder = self.build(&spec);
        {
            let p = self.node_mut(placeholder)?;
            p.margin = metrics.margin.clone();
            p.padding = metrics.padding.clone();
            p.placeholder_for = Some(node);
        }
        self.link(parent, placeholder, Some(node));
        self.record(Mutation::Added(placeholder));
        Ok(placeholder)
    }

    fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.live(node)?;
        if node == self.root {
            return Err(DomError::NoParent(node));
        }
        self.unlink(node);
        self.record(Mutation::Removed(node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Document {
        let spec = PageSpec {
            url: "https://news.example.com/story".to_string(),
            body: vec![ElementSpec::new("div")
                .id("wrap")
                .text("Hello")
                .child(ElementSpec::new("a").attr("href", "/x").text("link"))
                .child(ElementSpec::new("img").attr("src", "a.png"))],
            ..PageSpec::default()
        };
        Document::from_spec(&spec)
    }

    #[test]
    fn test_from_spec_has_no_mutations() {
        let mut doc = page();
        assert!(doc.take_mutations().is_empty());
        assert_eq!(doc.children(doc.root()).len(), 1);
    }

    #[test]
    fn test_text_and_markup() {
        let doc = page();
        let wrap = doc.find_by_id("wrap").unwrap();
        assert_eq!(doc.inner_text(wrap).unwrap(), "Hello link");
        assert_eq!(
            doc.inner_markup(wrap).unwrap(),
            "Hello<a href=\"/x\">link</a><img src=\"a.png\"></img>"
        );
        assert_eq!(doc.count_descendants(wrap, "a").unwrap(), 1);
        assert_eq!(doc.count_descendants(wrap, "img").unwrap(), 1);
    }

    #[test]
    fn test_removed_nodes_are_unreadable() {
        let mut doc = page();
        let wrap = doc.find_by_id("wrap").unwrap();
        doc.remove(wrap).unwrap();
        assert_eq!(doc.take_mutations(), vec![Mutation::Removed(wrap)]);
        assert_eq!(doc.tag_name(wrap), Err(DomError::Detached(wrap)));

        let root = doc.root();
        doc.append_child(root, wrap).unwrap();
        assert_eq!(doc.tag_name(wrap).unwrap(), "div");
        assert_eq!(doc.take_mutations(), vec![Mutation::Added(wrap)]);
    }

    #[test]
    fn test_placeholder_goes_before_target() {
        let mut doc = page();
        let wrap = doc.find_by_id("wrap").unwrap();
        let metrics = BoxMetrics {
            width: 300.0,
            height: 250.0,
            margin: "4px".to_string(),
            padding: "0px".to_string(),
        };
        let placeholder = doc.insert_placeholder(wrap, &metrics).unwrap();
        assert_eq!(doc.children(doc.root()), vec![placeholder, wrap]);
        assert!(doc.is_placeholder(placeholder));
        assert_eq!(doc.placeholder_for(placeholder), Some(wrap));
        assert_eq!(doc.box_metrics(placeholder).unwrap(), metrics);
        assert_eq!(doc.count_descendants(placeholder, "button").unwrap(), 1);
    }

    #[test]
    fn test_hidden_elements_lose_their_box() {
        let mut doc = page();
        let wrap = doc.find_by_id("wrap").unwrap();
        doc.set_hidden(wrap, true).unwrap();
        assert_eq!(doc.computed_style(wrap).unwrap().display, "none");
        assert_eq!(doc.bounding_rect(wrap).unwrap(), Rect::default());
        doc.set_hidden(wrap, false).unwrap();
        assert_eq!(doc.computed_style(wrap).unwrap().display, "block");
    }
}
