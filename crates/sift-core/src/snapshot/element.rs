//! Element snapshot data

use serde::{Deserialize, Serialize};

use crate::dom::{ComputedStyle, Viewport};

/// Marker appended to truncated text and markup.
pub const TRUNCATION_MARKER: &str = "...";

/// Width and height of the element's box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Viewport-relative position of the element's box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Immutable feature record for one element at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// Lowercase tag name
    pub tag_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub styles: ComputedStyle,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Inner markup, capped
    #[serde(default, rename = "innerHTML")]
    pub inner_html: String,
    /// Rendered text, capped
    #[serde(default)]
    pub inner_text: String,
    /// Descendant `<a>` elements
    #[serde(default)]
    pub link_count: usize,
    /// Descendant `<img>` elements
    #[serde(default)]
    pub image_count: usize,
    /// Landmark tag this element is, or sits inside of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl ElementSnapshot {
    /// Minimal snapshot for a tag; everything else empty.
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            id: String::new(),
            classes: Vec::new(),
            size: Size::default(),
            position: Position::default(),
            styles: ComputedStyle::default(),
            attributes: Vec::new(),
            inner_html: String::new(),
            inner_text: String::new(),
            link_count: 0,
            image_count: 0,
            landmark: None,
            viewport: Viewport::default(),
        }
    }

    /// Value of the first attribute with this name (ASCII case-insensitive).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn href(&self) -> Option<&str> {
        self.attribute("href").filter(|h| !h.is_empty())
    }

    pub fn in_sanctuary(&self) -> bool {
        self.landmark.is_some()
    }
}

/// Cap `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_under_cap_is_untouched() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn test_truncate_appends_marker() {
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("إعلان ممول", 5), "إعلان...");
    }

    #[test]
    fn test_snapshot_json_uses_camel_case() {
        let mut snapshot = ElementSnapshot::new("DIV");
        snapshot.inner_html = "<b>x</b>".to_string();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["tagName"], "div");
        assert_eq!(json["innerHTML"], "<b>x</b>");
        assert!(json.get("landmark").is_none());

        let back: ElementSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let snapshot: ElementSnapshot = serde_json::from_str(r#"{"tagName":"iframe"}"#).unwrap();
        assert_eq!(snapshot.tag_name, "iframe");
        assert_eq!(snapshot.viewport, Viewport::default());
        assert!(snapshot.href().is_none());
    }
}
