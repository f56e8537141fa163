//! Heuristic ad scorer
//!
//! Pure function of an [`ElementSnapshot`] and the feedback verdicts. Every
//! signal is weighted onto one 0.0..=1.0 scale and compared against a single
//! threshold.
//!
//! Evaluation order:
//!
//! 1. Landmark elements (and their descendants) score 0.
//! 2. A FalsePositive verdict forces 0; a ConfirmedAd verdict forces 1.
//! 3. Positive signals are summed and capped at 1.0.
//! 4. Elements covering most of the viewport lose `oversize_penalty`.

use std::collections::HashSet;

use crate::config::{ConfigError, ScorerConfig};
use crate::feedback::FeedbackStore;
use crate::signature::Signature;
use crate::snapshot::ElementSnapshot;
use crate::types::{ScoreResult, ScoreSource, Signals, Verdict};

/// Keywords looked for, as whole words, in text and markup.
pub const AD_KEYWORDS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "advertising",
    "banner",
    "sponsor",
    "sponsored",
    "promotion",
    "promoted",
    "recommended",
];

/// Substrings that make a class or id suspicious.
pub const SUSPICIOUS_TOKENS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "banner",
    "sponsored",
    "promotion",
    "recommended",
    "partner",
    "commercial",
];

/// Attribute-name substrings used by ad tags.
pub const AD_ATTRIBUTE_MARKERS: &[&str] = &["data-ad", "data-ad-client", "data-ad-slot"];

/// Substrings of tracking / ad-click hrefs.
pub const TRACKING_HREF_MARKERS: &[&str] = &["ad", "sponsor", "promotion", "click", "track"];

/// Canonical IAB ad-unit sizes (width, height).
pub const AD_UNIT_SIZES: &[(f64, f64)] = &[
    (728.0, 90.0),  // Leaderboard
    (300.0, 250.0), // Medium Rectangle
    (160.0, 600.0), // Wide Skyscraper
    (320.0, 50.0),  // Mobile Banner
];

const FRAME_TAGS: &[&str] = &["iframe", "frame"];

/// The ad scorer.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScorerConfig,
}

impl Scorer {
    /// Create a scorer, rejecting tunables that break its invariants.
    pub fn new(config: ScorerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Score a snapshot against the current feedback verdicts.
    pub fn score(&self, snapshot: &ElementSnapshot, feedback: &FeedbackStore) -> ScoreResult {
        if snapshot.in_sanctuary() {
            return ScoreResult::forced(ScoreSource::Sanctuary);
        }

        match feedback.verdict(&Signature::of(snapshot)) {
            Some(Verdict::FalsePositive) => return ScoreResult::forced(ScoreSource::KnownFalsePositive),
            Some(Verdict::ConfirmedAd) => return ScoreResult::forced(ScoreSource::KnownAd),
            None => {}
        }

        self.score_features(snapshot)
    }

    /// Heuristic score only, ignoring landmarks and verdicts.
    pub fn score_features(&self, snapshot: &ElementSnapshot) -> ScoreResult {
        let c = &self.config;
        let mut signals = Signals::empty();
        let mut score = 0.0f32;

        let keywords = count_keywords(&snapshot.inner_text, &snapshot.inner_html);
        if keywords > 0 {
            signals |= Signals::KEYWORD;
            score += (keywords as f32 * c.keyword_weight).min(c.keyword_cap);
        }

        if matches_ad_unit(snapshot.size.width, snapshot.size.height, c.size_tolerance) {
            signals |= Signals::AD_SIZE;
            score += c.ad_size_weight;
        }

        if snapshot.link_count > 0 && snapshot.image_count > 0 {
            signals |= Signals::LINK_AND_IMAGE;
            score += c.link_image_weight;
        }

        let ad_attributes = count_ad_attributes(snapshot);
        if ad_attributes > 0 {
            signals |= Signals::AD_ATTRIBUTE;
            score += ad_attributes as f32 * c.ad_attribute_weight;
        }

        if snapshot.classes.iter().any(|class| is_suspicious(class)) {
            signals |= Signals::SUSPICIOUS_CLASS;
            score += c.suspicious_class_weight;
        }

        if !snapshot.id.is_empty() && is_suspicious(&snapshot.id) {
            signals |= Signals::SUSPICIOUS_ID;
            score += c.suspicious_id_weight;
        }

        if snapshot.href().is_some_and(is_tracking_href) {
            signals |= Signals::TRACKING_HREF;
            score += c.tracking_href_weight;
        }

        if FRAME_TAGS.contains(&snapshot.tag_name.as_str()) {
            signals |= Signals::FRAME;
            score += c.frame_weight;
        }

        score = score.min(ScoreResult::MAX);

        let viewport = snapshot.viewport;
        if snapshot.size.width > viewport.width * c.oversize_ratio
            || snapshot.size.height > viewport.height * c.oversize_ratio
        {
            signals |= Signals::OVERSIZED;
            score -= c.oversize_penalty;
        }

        let score = score.clamp(ScoreResult::MIN, ScoreResult::MAX);
        ScoreResult {
            score,
            is_ad: score >= c.threshold,
            source: ScoreSource::Heuristic,
            signals,
        }
    }
}

/// Distinct ad keywords appearing as whole words in text or markup.
fn count_keywords(text: &str, markup: &str) -> usize {
    let mut found: HashSet<&'static str> = HashSet::new();
    for source in [text, markup] {
        for word in source.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() || word.len() > 13 {
                continue;
            }
            let word = word.to_lowercase();
            if let Some(&keyword) = AD_KEYWORDS.iter().find(|&&k| k == word) {
                found.insert(keyword);
            }
        }
    }
    found.len()
}

fn matches_ad_unit(width: f64, height: f64, tolerance: f64) -> bool {
    AD_UNIT_SIZES
        .iter()
        .any(|&(w, h)| (width - w).abs() <= tolerance && (height - h).abs() <= tolerance)
}

/// Distinct attributes whose name contains an ad marker.
fn count_ad_attributes(snapshot: &ElementSnapshot) -> usize {
    let mut names: HashSet<String> = HashSet::new();
    for attr in &snapshot.attributes {
        let name = attr.name.to_ascii_lowercase();
        if AD_ATTRIBUTE_MARKERS.iter().any(|m| name.contains(m)) {
            names.insert(name);
        }
    }
    names.len()
}

fn is_suspicious(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    SUSPICIOUS_TOKENS.iter().any(|t| token.contains(t))
}

fn is_tracking_href(href: &str) -> bool {
    let href = href.to_ascii_lowercase();
    TRACKING_HREF_MARKERS.iter().any(|m| href.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::FeedbackConfig;
    use crate::dom::Viewport;
    use crate::feedback::MemoryStorage;
    use crate::snapshot::{Attribute, Size};
    use std::rc::Rc;

    fn store() -> FeedbackStore {
        FeedbackStore::new(
            FeedbackConfig::default(),
            Box::new(MemoryStorage::new()),
            Rc::new(FixedClock(1)),
        )
    }

    fn attr(name: &str, value: &str) -> Attribute {
        Attribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// 300x250 unit with a link, an image, `ad-banner` class and `data-ad-slot`.
    fn ad_unit() -> ElementSnapshot {
        let mut s = ElementSnapshot::new("div");
        s.classes = vec!["ad-banner".to_string()];
        s.attributes = vec![attr("class", "ad-banner"), attr("data-ad-slot", "123")];
        s.size = Size { width: 300.0, height: 250.0 };
        s.link_count = 1;
        s.image_count = 1;
        s.inner_html = "<a href=\"https://shop.example/p\"><img src=\"p.png\"></a>".to_string();
        s.viewport = Viewport { width: 1280.0, height: 800.0 };
        s
    }

    /// Every positive signal at once.
    fn saturated() -> ElementSnapshot {
        let mut s = ad_unit();
        s.tag_name = "iframe".to_string();
        s.id = "sponsored-slot".to_string();
        s.attributes.push(attr("data-ad-client", "ca-pub-1"));
        s.attributes.push(attr("href", "https://track.example/click"));
        s.inner_text = "Sponsored advertisement, promoted and recommended".to_string();
        s
    }

    #[test]
    fn test_ad_unit_crosses_threshold() {
        let scorer = Scorer::default();
        let result = scorer.score(&ad_unit(), &store());
        assert!(result.is_ad, "score {} below threshold", result.score);
        assert_eq!(result.source, ScoreSource::Heuristic);
        assert!(result
            .signals
            .contains(Signals::AD_SIZE | Signals::LINK_AND_IMAGE | Signals::AD_ATTRIBUTE | Signals::SUSPICIOUS_CLASS));
    }

    #[test]
    fn test_plain_paragraph_is_not_an_ad() {
        let mut s = ElementSnapshot::new("p");
        s.inner_text = "Padding and shadows are loading gradually.".to_string();
        s.size = Size { width: 600.0, height: 40.0 };
        let result = Scorer::default().score(&s, &store());
        assert_eq!(result.score, 0.0);
        assert!(!result.is_ad);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let scorer = Scorer::default();
        let feedback = store();
        let s = saturated();
        assert_eq!(scorer.score(&s, &feedback), scorer.score(&s, &feedback));
    }

    #[test]
    fn test_score_stays_in_range() {
        let result = Scorer::default().score(&saturated(), &store());
        assert_eq!(result.score, ScoreResult::MAX);
    }

    #[test]
    fn test_keywords_are_whole_words_and_capped() {
        assert_eq!(count_keywords("Download the header", "<div class=\"shadow\">"), 0);
        assert_eq!(count_keywords("Sponsored AD", ""), 2);
        assert_eq!(count_keywords("ad ad ad", "ad"), 1);

        let mut s = ElementSnapshot::new("span");
        s.inner_text = "ad ads advert advertisement banner sponsor".to_string();
        let result = Scorer::default().score_features(&s);
        assert!((result.score - 0.3).abs() < 1e-6);
        assert!(!result.is_ad);
    }

    #[test]
    fn test_ad_unit_size_tolerance() {
        assert!(matches_ad_unit(728.0, 90.0, 10.0));
        assert!(matches_ad_unit(310.0, 241.0, 10.0));
        assert!(!matches_ad_unit(312.0, 250.0, 10.0));
        assert!(!matches_ad_unit(300.0, 600.0, 10.0));
    }

    #[test]
    fn test_ad_attributes_counted_per_distinct_name() {
        let mut s = ElementSnapshot::new("ins");
        s.attributes = vec![
            attr("data-ad-client", "x"),
            attr("data-ad-slot", "y"),
            attr("DATA-AD-SLOT", "z"),
            attr("data-layout", "w"),
        ];
        assert_eq!(count_ad_attributes(&s), 2);
    }

    #[test]
    fn test_tracking_href_and_frame() {
        let mut frame = ElementSnapshot::new("iframe");
        frame.size = Size { width: 300.0, height: 250.0 };
        let result = Scorer::default().score_features(&frame);
        assert!(result.signals.contains(Signals::FRAME | Signals::AD_SIZE));
        assert!(result.is_ad);

        let mut link = ElementSnapshot::new("a");
        link.attributes = vec![attr("href", "https://example.com/Click?id=1")];
        let result = Scorer::default().score_features(&link);
        assert!(result.signals.contains(Signals::TRACKING_HREF));
        assert!(!result.is_ad);
    }

    #[test]
    fn test_oversized_never_reaches_threshold() {
        let mut wide = saturated();
        wide.size = Size { width: 1100.0, height: 250.0 };
        let result = Scorer::default().score(&wide, &store());
        assert!(result.signals.contains(Signals::OVERSIZED));
        assert!(!result.is_ad, "dampened score {} reached threshold", result.score);

        let mut tall = saturated();
        tall.size = Size { width: 300.0, height: 700.0 };
        assert!(!Scorer::default().score(&tall, &store()).is_ad);
    }

    #[test]
    fn test_sanctuary_scores_zero() {
        for tag in crate::dom::SANCTUARY_TAGS {
            let mut s = saturated();
            s.landmark = Some(tag.to_string());
            let result = Scorer::default().score(&s, &store());
            assert_eq!(result.score, 0.0);
            assert_eq!(result.source, ScoreSource::Sanctuary);
        }
    }

    #[test]
    fn test_confirmed_ad_overrides_features() {
        let mut feedback = store();
        let plain = ElementSnapshot::new("p");
        feedback.record_confirmed_ad(Signature::of(&plain));

        let result = Scorer::default().score(&plain, &feedback);
        assert_eq!(result.score, ScoreResult::MAX);
        assert_eq!(result.source, ScoreSource::KnownAd);
        assert!(result.is_ad);
    }

    #[test]
    fn test_false_positive_overrides_features() {
        let mut feedback = store();
        let s = saturated();
        feedback.record_false_positive(Signature::of(&s));

        let result = Scorer::default().score(&s, &feedback);
        assert_eq!(result.score, ScoreResult::MIN);
        assert_eq!(result.source, ScoreSource::KnownFalsePositive);
        assert!(!result.is_ad);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScorerConfig {
            threshold: 0.0,
            ..ScorerConfig::default()
        };
        assert!(Scorer::new(config).is_err());
    }
}
