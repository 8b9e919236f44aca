//! WASM bindings for ham-timeline — plays timelines in the browser.

use std::sync::Arc;
use wasm_bindgen::prelude::*;

use ham_timeline::core::document::TimelineDocument;
use ham_timeline::core::instance::TimelineInstance;
use ham_timeline::core::timeline::Timeline;

// ---------------------------------------------------------------------------
// Embedded demo timeline — compiled into the WASM binary
// ---------------------------------------------------------------------------
const CROSSROADS: &str = include_str!("../../timelines/crossroads.ron");

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct VariableInfo {
    id: i32,
    name: String,
    value: String,
}

#[derive(serde::Serialize)]
struct TimelineInfo {
    name: String,
    nodes: usize,
    scenes: Vec<String>,
    characters: Vec<String>,
}

fn timeline_from_ron(source: &str) -> Result<Timeline, JsError> {
    TimelineDocument::parse_ron(source)
        .and_then(TimelineDocument::into_timeline)
        .map_err(|e| JsError::new(&format!("Timeline parse error: {e}")))
}

// ---------------------------------------------------------------------------
// TimelinePlayer — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct TimelinePlayer {
    instance: TimelineInstance,
}

#[wasm_bindgen]
impl TimelinePlayer {
    /// Start a playthrough of the embedded demo timeline.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<TimelinePlayer, JsError> {
        let timeline = timeline_from_ron(CROSSROADS)?;
        Ok(TimelinePlayer {
            instance: TimelineInstance::new(Arc::new(timeline)),
        })
    }

    /// Start a playthrough of a timeline written in RON.
    pub fn from_ron(source: &str) -> Result<TimelinePlayer, JsError> {
        let timeline = timeline_from_ron(source)?;
        Ok(TimelinePlayer {
            instance: TimelineInstance::new(Arc::new(timeline)),
        })
    }

    /// Start a playthrough of a binary timeline.
    pub fn from_timeline_bytes(bytes: &[u8]) -> Result<TimelinePlayer, JsError> {
        let timeline = Timeline::from_bytes(bytes)
            .map_err(|e| JsError::new(&format!("Timeline load error: {e}")))?;
        Ok(TimelinePlayer {
            instance: TimelineInstance::new(Arc::new(timeline)),
        })
    }

    /// Resume a playthrough saved with [`TimelinePlayer::save`].
    pub fn restore(bytes: &[u8]) -> Result<TimelinePlayer, JsError> {
        let instance = TimelineInstance::from_bytes(bytes)
            .map_err(|e| JsError::new(&format!("Restore error: {e}")))?;
        Ok(TimelinePlayer { instance })
    }

    /// Advance the playthrough and return the events as a JSON array.
    ///
    /// Example output:
    /// ```json
    /// [
    ///   { "SceneChanges": { "scene": { "id": 3, "name": "Road" } } },
    ///   { "Dialog": { "speaker": { "id": 0, "name": "Narrator" }, "text": "..." } }
    /// ]
    /// ```
    pub fn advance(&mut self, choice: Option<u32>) -> Result<String, JsError> {
        let events = self
            .instance
            .advance_collect(choice.map(|c| c as usize))
            .map_err(|e| JsError::new(&format!("Playback error: {e}")))?;
        serde_json::to_string(&events)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Current variable values as JSON.
    pub fn variables(&self) -> Result<String, JsError> {
        let timeline = self.instance.timeline();
        let info: Vec<VariableInfo> = self
            .instance
            .variables()
            .sorted()
            .into_iter()
            .map(|(id, value)| VariableInfo {
                id: id.0,
                name: timeline.variable(id).map(|v| v.name.clone()).unwrap_or_default(),
                value: value.to_string(),
            })
            .collect();
        serde_json::to_string(&info).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Name and cast of the timeline being played, as JSON.
    pub fn info(&self) -> Result<String, JsError> {
        let timeline = self.instance.timeline();
        let info = TimelineInfo {
            name: timeline.name().to_string(),
            nodes: timeline.node_count(),
            scenes: timeline.scenes().iter().map(|s| s.name.clone()).collect(),
            characters: timeline.characters().iter().map(|c| c.name.clone()).collect(),
        };
        serde_json::to_string(&info).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.instance.is_finished()
    }

    /// Save the playthrough, timeline included.
    pub fn save(&self) -> Vec<u8> {
        self.instance.to_bytes()
    }
}
