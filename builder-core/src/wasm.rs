//! WebAssembly bindings for builder-core.
//!
//! This module provides JavaScript-callable functions when compiled to WASM.
//! Structured arguments and results cross the boundary as JSON strings.

use std::collections::HashMap;

use wasm_bindgen::prelude::*;

use crate::{
    BuilderEvent, ComponentDefinition, ComponentRegistry, EventKind, GridLayout, ItemConfig, ItemId,
    PageBuilder, SubscriptionId, Viewport, WidthProvider,
};

/// Initialize the builder WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();
}

/// Measures canvas containers marked with `data-canvas-id="<id>"`.
struct DomWidths;

impl WidthProvider for DomWidths {
    fn container_width(&self, canvas_id: &str) -> Option<f64> {
        let document = web_sys::window()?.document()?;
        let selector = format!("[data-canvas-id=\"{canvas_id}\"]");
        let element = document.query_selector(&selector).ok()??;
        Some(f64::from(element.client_width()))
    }
}

/// Pass `event` to a JS handler as JSON. A throwing handler is logged and
/// does not affect the operation that emitted the event.
fn notify(callback: &js_sys::Function, event: &BuilderEvent) {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Could not serialize {} event: {e}", event.kind().name());
            return;
        }
    };
    if let Err(thrown) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
        tracing::warn!("{} handler threw: {thrown:?}", event.kind().name());
    }
}

fn parse_config(json: Option<String>) -> Result<Option<ItemConfig>, String> {
    json.map(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
        .transpose()
}

/// Page builder instance for WASM.
#[wasm_bindgen]
pub struct WasmBuilder {
    builder: PageBuilder,
    next_handle: u32,
    subscriptions: HashMap<u32, SubscriptionId>,
}

#[wasm_bindgen]
impl WasmBuilder {
    /// Create a builder from a JSON array of component definitions.
    ///
    /// # Errors
    ///
    /// Returns an error string if the definitions don't parse.
    #[wasm_bindgen(constructor)]
    pub fn new(components_json: &str) -> Result<WasmBuilder, String> {
        let definitions: Vec<ComponentDefinition> =
            serde_json::from_str(components_json).map_err(|e| e.to_string())?;
        let components = definitions
            .into_iter()
            .fold(ComponentRegistry::new(), ComponentRegistry::with);
        Ok(Self {
            builder: PageBuilder::new(components, DomWidths),
            next_handle: 0,
            subscriptions: HashMap::new(),
        })
    }

    /// Get the current state as JSON.
    #[wasm_bindgen(js_name = getState)]
    #[must_use]
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.builder.state()).unwrap_or_default()
    }

    /// Export the state document as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if serialization fails.
    #[wasm_bindgen(js_name = exportState)]
    pub fn export_state(&self) -> Result<String, String> {
        self.builder.export_json().map_err(|e| e.to_string())
    }

    /// Replace the state from an exported JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error string if parsing fails.
    #[wasm_bindgen(js_name = importState)]
    pub fn import_state(&mut self, json: &str) -> Result<(), String> {
        self.builder.import_json(json).map_err(|e| e.to_string())
    }

    /// Add an empty canvas.
    #[wasm_bindgen(js_name = addCanvas)]
    pub fn add_canvas(&mut self, canvas_id: &str) -> bool {
        self.builder.add_canvas(canvas_id)
    }

    /// Remove a canvas.
    #[wasm_bindgen(js_name = removeCanvas)]
    pub fn remove_canvas(&mut self, canvas_id: &str) -> bool {
        self.builder.remove_canvas(canvas_id)
    }

    /// Place a component. `position_json` is `{x, y, width, height}`.
    /// Returns the new item id.
    ///
    /// # Errors
    ///
    /// Returns an error string if the position or config doesn't parse.
    #[wasm_bindgen(js_name = addComponent)]
    pub fn add_component(
        &mut self,
        canvas_id: &str,
        component_type: &str,
        position_json: &str,
        config_json: Option<String>,
    ) -> Result<Option<String>, String> {
        let position: GridLayout =
            serde_json::from_str(position_json).map_err(|e| e.to_string())?;
        let config = parse_config(config_json)?;
        Ok(self
            .builder
            .add_component(canvas_id, component_type, position, config)
            .map(|id| id.to_string()))
    }

    /// Delete an item. The host runs its own confirmation before calling.
    #[wasm_bindgen(js_name = deleteComponent)]
    pub fn delete_component(&mut self, item_id: &str) -> bool {
        self.builder.commit_delete(&ItemId::from(item_id)).is_ok()
    }

    /// Shallow-merge a JSON object into an item's config.
    ///
    /// # Errors
    ///
    /// Returns an error string if the patch is not a JSON object.
    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&mut self, item_id: &str, patch_json: &str) -> Result<bool, String> {
        let patch = parse_config(Some(patch_json.to_string()))?.unwrap_or_default();
        Ok(self.builder.update_config(&ItemId::from(item_id), patch))
    }

    /// Move an item to another canvas at a drop point in pixels.
    #[wasm_bindgen(js_name = moveAcrossCanvas)]
    pub fn move_across_canvas(
        &mut self,
        item_id: &str,
        source_canvas_id: &str,
        target_canvas_id: &str,
        drop_x: f64,
        drop_y: f64,
    ) -> bool {
        self.builder.move_across_canvas(
            &ItemId::from(item_id),
            source_canvas_id,
            target_canvas_id,
            drop_x,
            drop_y,
        )
    }

    /// Make a canvas active.
    #[wasm_bindgen(js_name = setActiveCanvas)]
    pub fn set_active_canvas(&mut self, canvas_id: &str) -> bool {
        self.builder.set_active_canvas(canvas_id)
    }

    /// Get the active canvas.
    #[wasm_bindgen(js_name = getActiveCanvas)]
    #[must_use]
    pub fn get_active_canvas(&self) -> Option<String> {
        self.builder.active_canvas()
    }

    /// Switch between `"desktop"` and `"mobile"`.
    ///
    /// # Errors
    ///
    /// Returns an error string for an unknown viewport name.
    #[wasm_bindgen(js_name = setViewport)]
    pub fn set_viewport(&mut self, viewport: &str) -> Result<(), String> {
        let viewport: Viewport =
            serde_json::from_value(serde_json::Value::String(viewport.to_string()))
                .map_err(|e| e.to_string())?;
        self.builder.set_viewport(viewport);
        Ok(())
    }

    /// Drop the cached width of a canvas after its container resized.
    #[wasm_bindgen(js_name = invalidateCanvasSize)]
    pub fn invalidate_canvas_size(&mut self, canvas_id: &str) {
        self.builder.invalidate_canvas_size(canvas_id);
    }

    /// Undo the last command.
    pub fn undo(&mut self) -> bool {
        self.builder.undo()
    }

    /// Redo the next command.
    pub fn redo(&mut self) -> bool {
        self.builder.redo()
    }

    /// Whether undo is possible.
    #[wasm_bindgen(js_name = canUndo)]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.builder.can_undo()
    }

    /// Whether redo is possible.
    #[wasm_bindgen(js_name = canRedo)]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.builder.can_redo()
    }

    /// Subscribe `callback` to an event by name. The callback receives the
    /// event as a JSON string. Returns a handle for [`off`](Self::off).
    ///
    /// # Errors
    ///
    /// Returns an error string for an unknown event name.
    pub fn on(&mut self, event_name: &str, callback: js_sys::Function) -> Result<u32, String> {
        let kind = EventKind::from_name(event_name)
            .ok_or_else(|| format!("Unknown event: {event_name}"))?;
        let id = self.builder.on(kind, move |event| notify(&callback, event));
        self.next_handle += 1;
        self.subscriptions.insert(self.next_handle, id);
        Ok(self.next_handle)
    }

    /// Remove a subscription made with [`on`](Self::on).
    pub fn off(&mut self, handle: u32) -> bool {
        self.subscriptions
            .remove(&handle)
            .is_some_and(|id| self.builder.off(id))
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn throwing_handler_does_not_break_add() {
        let mut builder =
            WasmBuilder::new(r#"[{"type":"text","name":"Text"}]"#).expect("builder");
        builder.add_canvas("main");
        let throws = js_sys::Function::new_with_args("json", "throw new Error('handler failed')");
        let handle = builder.on("componentAdded", throws).expect("known event");

        let id = builder
            .add_component("main", "text", r#"{"x":0,"y":0,"width":10,"height":2}"#, None)
            .expect("valid input");
        assert!(id.is_some());
        assert!(builder.can_undo());
        assert!(builder.off(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENTS: &str = r#"[{"type":"header","name":"Header"},{"type":"text","name":"Text"}]"#;

    #[test]
    fn wasm_builder_rejects_invalid_components() {
        assert!(WasmBuilder::new("{ not valid json }").is_err());
        assert!(WasmBuilder::new(r#"{"foo": "bar"}"#).is_err());
    }

    #[test]
    fn add_component_returns_id() {
        let mut builder = WasmBuilder::new(COMPONENTS).expect("builder");
        assert!(builder.add_canvas("main"));
        let id = builder
            .add_component("main", "header", r#"{"x":0,"y":0,"width":50,"height":6}"#, None)
            .expect("valid input");
        assert!(id.is_some_and(|id| id.starts_with("item-")));
        assert!(builder.can_undo());
        assert_eq!(builder.get_active_canvas().as_deref(), Some("main"));
    }

    #[test]
    fn add_component_rejects_bad_position() {
        let mut builder = WasmBuilder::new(COMPONENTS).expect("builder");
        builder.add_canvas("main");
        assert!(builder
            .add_component("main", "header", "not json", None)
            .is_err());
    }

    #[test]
    fn state_json_roundtrip() {
        let mut builder = WasmBuilder::new(COMPONENTS).expect("builder");
        builder.add_canvas("main");
        builder
            .add_component("main", "text", r#"{"x":2,"y":1,"width":10,"height":2}"#, None)
            .expect("valid input");
        let exported = builder.export_state().expect("export");

        let mut other = WasmBuilder::new(COMPONENTS).expect("builder");
        other.import_state(&exported).expect("import");
        assert_eq!(other.get_state(), builder.get_state());
    }

    #[test]
    fn set_viewport_parses_names() {
        let mut builder = WasmBuilder::new(COMPONENTS).expect("builder");
        assert!(builder.set_viewport("mobile").is_ok());
        assert!(builder.get_state().contains("\"currentViewport\":\"mobile\""));
        assert!(builder.set_viewport("tablet").is_err());
    }
}
