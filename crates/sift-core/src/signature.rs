//! Element identity
//!
//! The canonical [`Signature`] is the coarse `tag#id.class1.class2` form. It
//! ignores geometry, so responsive re-renders and scrolling keep the same
//! identity. Distinct elements sharing tag, id and classes collide; that is
//! accepted.
//!
//! [`Fingerprint`] is the full-fidelity scheme (tag + every attribute +
//! quantized size). It only travels in feedback records as a diagnostic.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::hash::{hash64, Hash64};
use crate::snapshot::ElementSnapshot;

/// Box sizes are rounded to this many pixels before fingerprinting.
pub const SIZE_QUANTUM: f64 = 10.0;

/// Feedback and tally key for an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Build the coarse signature of a snapshot.
    pub fn of(snapshot: &ElementSnapshot) -> Self {
        let mut sig = String::with_capacity(
            snapshot.tag_name.len() + snapshot.id.len() + 1 + snapshot.classes.iter().map(|c| c.len() + 1).sum::<usize>(),
        );
        sig.push_str(&snapshot.tag_name.to_ascii_lowercase());
        sig.push('#');
        sig.push_str(&snapshot.id);
        for class in &snapshot.classes {
            sig.push('.');
            sig.push_str(class);
        }
        Self(sig)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Neither id nor classes: the key names only a tag and matches every
    /// plain element of it.
    pub fn is_bare(&self) -> bool {
        self.0.split_once('#').map_or(true, |(_, rest)| rest.is_empty())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Signature {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Signature {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl Borrow<str> for Signature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Full-fidelity element hash: tag, serialized attributes, quantized size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub Hash64);

impl Fingerprint {
    pub fn of(snapshot: &ElementSnapshot) -> Self {
        let mut material = snapshot.tag_name.to_ascii_lowercase();
        material.push('-');
        for attr in &snapshot.attributes {
            material.push_str(&format!("{}=\"{}\"", attr.name, attr.value));
        }
        material.push_str(&format!(
            "-{}x{}",
            quantize(snapshot.size.width),
            quantize(snapshot.size.height)
        ));
        Self(hash64(material.as_bytes()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn quantize(px: f64) -> i64 {
    (px / SIZE_QUANTUM).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Attribute, Position, Size};

    fn snapshot() -> ElementSnapshot {
        let mut s = ElementSnapshot::new("DIV");
        s.id = "top".to_string();
        s.classes = vec!["ad-banner".to_string(), "wide".to_string()];
        s.attributes = vec![Attribute {
            name: "data-ad-slot".to_string(),
            value: "123".to_string(),
        }];
        s.size = Size { width: 300.0, height: 250.0 };
        s
    }

    #[test]
    fn test_coarse_format() {
        assert_eq!(Signature::of(&snapshot()).as_str(), "div#top.ad-banner.wide");

        let bare = ElementSnapshot::new("iframe");
        assert_eq!(Signature::of(&bare).as_str(), "iframe#");
    }

    #[test]
    fn test_bare_signature() {
        assert!(Signature::from("iframe#").is_bare());
        assert!(!Signature::from("div#top").is_bare());
        assert!(!Signature::from("div#.ad-banner").is_bare());
        assert!(!Signature::of(&snapshot()).is_bare());
    }

    #[test]
    fn test_signature_ignores_geometry() {
        let a = snapshot();
        let mut b = snapshot();
        b.position = Position { top: -900.0, left: 40.0 };
        b.size = Size { width: 320.0, height: 50.0 };
        assert_eq!(Signature::of(&a), Signature::of(&b));
    }

    #[test]
    fn test_signature_is_stable() {
        let s = snapshot();
        assert_eq!(Signature::of(&s), Signature::of(&s));
    }

    #[test]
    fn test_fingerprint_tracks_attributes_and_quantized_size() {
        let a = snapshot();
        let mut jitter = snapshot();
        jitter.size.width = 302.0;
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&jitter));

        let mut resized = snapshot();
        resized.size.width = 728.0;
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&resized));

        let mut retagged = snapshot();
        retagged.attributes[0].value = "456".to_string();
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&retagged));
    }

    #[test]
    fn test_fingerprint_serializes_as_hex() {
        let json = serde_json::to_value(Fingerprint::of(&snapshot())).unwrap();
        assert_eq!(json.as_str().map(str::len), Some(16));
    }
}
