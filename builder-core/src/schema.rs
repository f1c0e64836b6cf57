//! Exported state document used for save/load of a page design.
//!
//! ```json
//! { "canvases": { "<id>": { "items": [...], "zIndexCounter": 3 } },
//!   "selectedItemId": null, "selectedCanvasId": null,
//!   "activeCanvasId": "main", "currentViewport": "desktop" }
//! ```
//!
//! Every top-level field is optional on import. Omitted fields take their
//! reset value; `canvases`, when present, replaces the whole map.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{BuilderResult, Canvas, GridState, ItemId, Viewport};

/// Serializable snapshot of [`GridState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    /// Canvases keyed by ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvases: Option<BTreeMap<String, Canvas>>,
    /// Selected item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_item_id: Option<ItemId>,
    /// Canvas of the selected item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_canvas_id: Option<String>,
    /// Active canvas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_canvas_id: Option<String>,
    /// Viewport being edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_viewport: Option<Viewport>,
    /// Grid overlay flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_grid: Option<bool>,
}

impl From<&GridState> for StateDocument {
    fn from(state: &GridState) -> Self {
        Self {
            canvases: Some(state.canvases.clone()),
            selected_item_id: state.selected_item_id.clone(),
            selected_canvas_id: state.selected_canvas_id.clone(),
            active_canvas_id: state.active_canvas_id.clone(),
            current_viewport: Some(state.current_viewport),
            show_grid: Some(state.show_grid),
        }
    }
}

impl StateDocument {
    /// Build a state from this document, filling gaps with reset values.
    ///
    /// The result is normalized: see [`normalize`].
    #[must_use]
    pub fn into_state(self) -> GridState {
        let defaults = GridState::default();
        let mut state = GridState {
            canvases: self.canvases.unwrap_or(defaults.canvases),
            selected_item_id: self.selected_item_id,
            selected_canvas_id: self.selected_canvas_id,
            active_canvas_id: self.active_canvas_id,
            current_viewport: self.current_viewport.unwrap_or(defaults.current_viewport),
            show_grid: self.show_grid.unwrap_or(defaults.show_grid),
        };
        normalize(&mut state);
        state
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> BuilderResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a state document.
    pub fn from_json(json: &str) -> BuilderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Repair invariants in externally supplied state. Returns the number of
/// repairs made.
///
/// - An item id seen earlier (in canvas key order, then array order) is a
///   duplicate and the later copy is dropped.
/// - `item.canvas_id` is set to the key of the canvas holding it.
/// - `z_index_counter` is raised to at least the highest item z-index.
/// - A selection pointing at a missing item is cleared.
/// - An active canvas that does not exist is cleared.
pub fn normalize(state: &mut GridState) -> usize {
    let mut repairs = 0;
    let mut seen = HashSet::new();

    for (canvas_id, canvas) in &mut state.canvases {
        let count = canvas.items.len();
        canvas.items.retain(|item| {
            let first = seen.insert(item.id.clone());
            if !first {
                tracing::warn!("Dropping duplicate item {} from canvas {canvas_id}", item.id);
            }
            first
        });
        repairs += count - canvas.items.len();

        for item in &mut canvas.items {
            if &item.canvas_id != canvas_id {
                tracing::warn!(
                    "Item {} claims canvas {} but is stored in {canvas_id}",
                    item.id,
                    item.canvas_id
                );
                item.canvas_id.clone_from(canvas_id);
                repairs += 1;
            }
        }
        let max = canvas.max_z_index();
        if canvas.z_index_counter < max {
            tracing::warn!(
                "Canvas {canvas_id} counter {} below max z-index {max}",
                canvas.z_index_counter
            );
            canvas.z_index_counter = max;
            repairs += 1;
        }
    }

    if !state.selection_is_consistent() {
        // Recover the canvas when only the item id was given.
        let located = state
            .selected_item_id
            .as_ref()
            .and_then(|id| state.locate(id));
        match located {
            Some((canvas_id, _)) => state.selected_canvas_id = Some(canvas_id),
            None => state.clear_selection(),
        }
        tracing::warn!("Repaired inconsistent selection");
        repairs += 1;
    }

    if let Some(active) = &state.active_canvas_id {
        if !state.canvases.contains_key(active) {
            tracing::warn!("Active canvas {active} does not exist");
            state.active_canvas_id = None;
            repairs += 1;
        }
    }

    repairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GridLayout, Item};

    fn sample_state() -> GridState {
        let mut state = GridState::new();
        let mut canvas = Canvas::new();
        let z = canvas.next_z_index();
        canvas
            .items
            .push(Item::new("header", "main", "Header", GridLayout::new(0, 0, 50, 6)).with_z_index(z));
        state.canvases.insert("main".into(), canvas);
        state.active_canvas_id = Some("main".into());
        state
    }

    #[test]
    fn test_document_round_trip() {
        let state = sample_state();
        let json = StateDocument::from(&state).to_json().expect("serialize");
        let restored = StateDocument::from_json(&json).expect("parse").into_state();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_json_layout_uses_camel_case() {
        let json = StateDocument::from(&sample_state()).to_json().expect("serialize");
        assert!(json.contains("\"zIndexCounter\": 1"));
        assert!(json.contains("\"activeCanvasId\": \"main\""));
        assert!(json.contains("\"currentViewport\": \"desktop\""));
    }

    #[test]
    fn test_omitted_fields_take_reset_values() {
        let doc = StateDocument::from_json(r#"{"activeCanvasId":"nowhere"}"#).expect("parse");
        let state = doc.into_state();
        assert!(state.canvases.is_empty());
        assert!(state.active_canvas_id.is_none(), "unknown active canvas is dropped");
        assert_eq!(state.current_viewport, Viewport::Desktop);
        assert!(state.show_grid);
    }

    #[test]
    fn test_normalize_repairs_counter_and_owner() {
        let json = r#"{
            "canvases": {
                "c1": {
                    "items": [{
                        "id": "item-a", "type": "text", "canvasId": "other",
                        "name": "Text", "zIndex": 9,
                        "layouts": {
                            "desktop": {"x": 0, "y": 0, "width": 10, "height": 2},
                            "mobile": {"x": 0, "y": 0, "width": 50, "height": 2}
                        }
                    }],
                    "zIndexCounter": 1
                }
            },
            "selectedItemId": "item-a"
        }"#;
        let state = StateDocument::from_json(json).expect("parse").into_state();
        let canvas = &state.canvases["c1"];
        assert_eq!(canvas.z_index_counter, 9);
        assert_eq!(canvas.items[0].canvas_id, "c1");
        assert!(!canvas.items[0].layouts.mobile.customized);
        assert_eq!(state.selected_canvas_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_normalize_drops_duplicate_ids() {
        let text = |x: i32| Item::new("text", "", "Text", GridLayout::new(x, 0, 10, 2));
        let shared = text(0);
        let mut state = GridState::new();
        for (canvas_id, x) in [("a", 0), ("b", 20)] {
            let mut canvas = Canvas::new();
            let mut dup = shared.clone();
            dup.layouts.desktop.x = x;
            canvas.items.push(dup);
            canvas.items.push(text(30));
            state.canvases.insert(canvas_id.into(), canvas);
        }
        state.selected_item_id = Some(shared.id.clone());
        state.selected_canvas_id = Some("b".into());

        assert!(normalize(&mut state) >= 2);
        assert_eq!(state.canvases["a"].len(), 2);
        assert_eq!(state.canvases["b"].len(), 1);
        assert!(!state.canvases["b"].contains(&shared.id));
        assert_eq!(state.locate(&shared.id).map(|(c, _)| c).as_deref(), Some("a"));
        assert_eq!(state.selected_canvas_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(StateDocument::from_json("{ not json").is_err());
        assert!(StateDocument::from_json(r#"{"canvases": 5}"#).is_err());
    }
}
