//! WebAssembly bindings for AdSift
//!
//! Session-less surface for the content script: the script owns the DOM walk
//! and hands snapshots over as JSON, the verdict store lives here.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};
use sift_core::{
    clock::{Clock, SharedClock},
    config::{FeedbackConfig, ScorerConfig, FEEDBACK_KEY},
    feedback::{FeedbackStore, MemoryStorage},
    url::extract_host,
    ElementSnapshot, Fingerprint, Scorer, Signature,
};
use wasm_bindgen::prelude::*;

struct JsClock;

impl Clock for JsClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

struct EngineState {
    storage: MemoryStorage,
    feedback: FeedbackStore,
    scorer: Scorer,
}

thread_local! {
    static ENGINE: RefCell<Option<EngineState>> = const { RefCell::new(None) };
}

fn with_engine<T>(f: impl FnOnce(&mut EngineState) -> T) -> Result<T, JsValue> {
    ENGINE.with(|engine| match engine.borrow_mut().as_mut() {
        Some(state) => Ok(f(state)),
        None => Err(JsValue::from_str("Not initialized. Call init() first.")),
    })
}

fn parse_snapshot(snapshot_json: &str) -> Result<ElementSnapshot, JsValue> {
    serde_json::from_str(snapshot_json).map_err(|e| JsValue::from_str(&format!("Invalid snapshot: {}", e)))
}

/// Initialise from the extension's stored state (`{feedbackData, ...}`) and an
/// optional scorer config. Calling it again replaces the state.
#[wasm_bindgen]
pub fn init(state_json: Option<String>, config_json: Option<String>) -> Result<(), JsValue> {
    let entries: Map<String, Value> = match state_json.as_deref() {
        Some(json) if !json.trim().is_empty() => {
            serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid state: {}", e)))?
        }
        _ => Map::new(),
    };
    let config: ScorerConfig = match config_json.as_deref() {
        Some(json) => serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?,
        None => ScorerConfig::default(),
    };
    let scorer = Scorer::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let storage = MemoryStorage::with_entries(entries.iter().map(|(k, v)| (k.as_str(), v.clone())));
    let clock: SharedClock = Rc::new(JsClock);
    let mut feedback = FeedbackStore::new(FeedbackConfig::default(), Box::new(storage.clone()), clock);
    if let Err(e) = feedback.load() {
        web_sys::console::warn_1(&JsValue::from_str(&format!("AdSift: ignoring stored feedback: {}", e)));
    }

    ENGINE.with(|engine| {
        *engine.borrow_mut() = Some(EngineState {
            storage,
            feedback,
            scorer,
        });
    });
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE.with(|engine| engine.borrow().is_some())
}

/// Score a JSON snapshot. Returns `{score, isAd, source, signals, signature, fingerprint}`.
#[wasm_bindgen]
pub fn score_snapshot(snapshot_json: &str) -> Result<JsValue, JsValue> {
    let snapshot = parse_snapshot(snapshot_json)?;
    let result = with_engine(|state| state.scorer.score(&snapshot, &state.feedback))?;

    let signals = js_sys::Array::new();
    for label in result.signals.labels() {
        signals.push(&JsValue::from_str(&label));
    }

    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"score".into(), &JsValue::from(result.score));
    let _ = js_sys::Reflect::set(&js_result, &"isAd".into(), &JsValue::from(result.is_ad));
    let _ = js_sys::Reflect::set(&js_result, &"source".into(), &JsValue::from_str(result.source.as_str()));
    let _ = js_sys::Reflect::set(&js_result, &"signals".into(), &signals);
    let _ = js_sys::Reflect::set(
        &js_result,
        &"signature".into(),
        &JsValue::from_str(Signature::of(&snapshot).as_str()),
    );
    let _ = js_sys::Reflect::set(
        &js_result,
        &"fingerprint".into(),
        &JsValue::from_str(&Fingerprint::of(&snapshot).to_string()),
    );
    Ok(js_result.into())
}

#[wasm_bindgen]
pub fn signature_of(snapshot_json: &str) -> Result<String, JsValue> {
    Ok(Signature::of(&parse_snapshot(snapshot_json)?).to_string())
}

#[wasm_bindgen]
pub fn record_confirmed_ad(signature: &str) -> Result<(), JsValue> {
    with_engine(|state| state.feedback.record_confirmed_ad(Signature::from(signature)))
}

#[wasm_bindgen]
pub fn record_false_positive(signature: &str) -> Result<(), JsValue> {
    with_engine(|state| state.feedback.record_false_positive(Signature::from(signature)))
}

/// `"confirmed_ad"`, `"false_positive"` or `undefined`.
#[wasm_bindgen]
pub fn verdict(signature: &str) -> Option<String> {
    with_engine(|state| state.feedback.verdict(&Signature::from(signature)))
        .ok()
        .flatten()
        .map(|v| v.as_str().to_string())
}

/// Stored state as JSON, for the extension to persist.
#[wasm_bindgen]
pub fn export_state() -> Result<String, JsValue> {
    let entries = with_engine(|state| state.storage.snapshot())?;
    serde_json::to_string(&entries).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn reset_feedback() -> Result<(), JsValue> {
    with_engine(|state| state.feedback.reset())
}

#[wasm_bindgen]
pub fn get_state_info() -> JsValue {
    let result = js_sys::Object::new();
    let info = ENGINE.with(|engine| {
        engine.borrow().as_ref().map(|state| {
            (
                state.feedback.confirmed_ads().len(),
                state.feedback.false_positives().len(),
                state.storage.value(FEEDBACK_KEY).is_some(),
            )
        })
    });
    match info {
        Some((confirmed, false_positives, persisted)) => {
            let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(true));
            let _ = js_sys::Reflect::set(&result, &"confirmedAds".into(), &JsValue::from(confirmed as u32));
            let _ = js_sys::Reflect::set(&result, &"falsePositives".into(), &JsValue::from(false_positives as u32));
            let _ = js_sys::Reflect::set(&result, &"persisted".into(), &JsValue::from(persisted));
        }
        None => {
            let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(false));
        }
    }
    result.into()
}

#[wasm_bindgen]
pub fn extract_host_js(url: &str) -> Option<String> {
    extract_host(url).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    const BANNER: &str = r#"{
        "tagName": "div",
        "classes": ["ad-banner"],
        "size": {"width": 300, "height": 250},
        "attributes": [{"name": "data-ad-slot", "value": "123"}],
        "linkCount": 1,
        "imageCount": 1
    }"#;

    #[wasm_bindgen_test]
    fn test_signature_of() {
        assert_eq!(signature_of(BANNER).unwrap(), "div#.ad-banner");
    }

    #[wasm_bindgen_test]
    fn test_false_positive_round_trips_through_state() {
        init(None, None).unwrap();
        assert!(is_initialized());
        record_false_positive("div#.ad-banner").unwrap();
        assert_eq!(verdict("div#.ad-banner").as_deref(), Some("false_positive"));

        let state = export_state().unwrap();
        init(Some(state), None).unwrap();
        assert_eq!(verdict("div#.ad-banner").as_deref(), Some("false_positive"));
        assert_eq!(verdict("div#.other"), None);
    }

    #[wasm_bindgen_test]
    fn test_score_snapshot_shape() {
        init(None, None).unwrap();
        let result = score_snapshot(BANNER).unwrap();
        let is_ad = js_sys::Reflect::get(&result, &"isAd".into()).unwrap();
        assert_eq!(is_ad.as_bool(), Some(true));
        let source = js_sys::Reflect::get(&result, &"source".into()).unwrap();
        assert_eq!(source.as_string().as_deref(), Some("heuristic"));
    }
}
