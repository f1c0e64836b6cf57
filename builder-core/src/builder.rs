//! Lifecycle operations: the undoable, event-emitting API over the state.
//!
//! Every operation is atomic. It validates first, then mutates the store in
//! one write, records a command and emits events. On failure nothing changes
//! and no event is emitted. The `try_*` forms return the error; the plain
//! forms log it and return a sentinel (`None` / `false`).

use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;

use crate::command::{
    AddItemCommand, Command, CommandStack, DeleteItemCommand, MoveItemCommand, Placement,
};
use crate::event::{BuilderEvent, EventBus, EventKind, SubscriptionId};
use crate::placement::{clamp_layout, find_free_position};
use crate::store::{SharedStateLease, StateStore};
use crate::{
    BuilderConfig, BuilderError, BuilderResult, Canvas, ComponentRegistry, GridCalculator,
    GridLayout, GridState, Item, ItemConfig, ItemId, StateDocument, Viewport, WidthProvider,
};

/// Outcome of a deletion hook. An error counts as a denial.
pub type HookResult = Result<bool, Box<dyn std::error::Error + Send + Sync>>;

/// Confirmation hook consulted before an item is deleted.
#[async_trait(?Send)]
pub trait DeleteGuard {
    /// Return `Ok(true)` to allow deleting `item`.
    async fn before_delete(&self, item: &Item) -> HookResult;
}

/// Adapts an async closure into a [`DeleteGuard`]. The closure receives a
/// copy of the item.
pub struct FnGuard<F>(pub F);

#[async_trait(?Send)]
impl<F, Fut> DeleteGuard for FnGuard<F>
where
    F: Fn(Item) -> Fut + 'static,
    Fut: Future<Output = HookResult> + 'static,
{
    async fn before_delete(&self, item: &Item) -> HookResult {
        (self.0)(item.clone()).await
    }
}

fn item_not_found(id: &ItemId) -> BuilderError {
    BuilderError::ItemNotFound(id.to_string())
}

fn canvas_not_found(canvas_id: &str) -> BuilderError {
    BuilderError::CanvasNotFound(canvas_id.to_string())
}

fn logged<T>(operation: &str, result: BuilderResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("{operation} failed: {e}");
            None
        }
    }
}

/// A page builder instance: state, history, grid math and event bus.
///
/// # Example
///
/// ```
/// use builder_core::{ComponentDefinition, ComponentRegistry, GridLayout, PageBuilder, StaticWidths};
///
/// let components = ComponentRegistry::new().with(ComponentDefinition::new("header", "Header"));
/// let mut builder = PageBuilder::new(components, StaticWidths::with("c1", 1000.0));
/// builder.add_canvas("c1");
///
/// let id = builder
///     .add_component("c1", "header", GridLayout::new(0, 0, 50, 6), None)
///     .expect("added");
/// assert_eq!(builder.item(&id).map(|item| item.z_index), Some(1));
/// assert!(builder.can_undo());
/// ```
pub struct PageBuilder {
    store: StateStore,
    /// Keeps a shared store alive while this builder exists.
    lease: Option<SharedStateLease>,
    grid: GridCalculator,
    history: CommandStack,
    events: EventBus,
    components: ComponentRegistry,
    config: BuilderConfig,
    delete_guard: Option<Rc<dyn DeleteGuard>>,
}

impl std::fmt::Debug for PageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuilder")
            .field("store", &self.store)
            .field("shared", &self.lease.as_ref().map(SharedStateLease::key))
            .field("history", &self.history)
            .field("events", &self.events)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PageBuilder {
    /// Create a builder with its own empty state.
    #[must_use]
    pub fn new(components: ComponentRegistry, widths: impl WidthProvider + 'static) -> Self {
        let config = BuilderConfig::default();
        Self {
            store: StateStore::new(),
            lease: None,
            grid: GridCalculator::new(widths),
            history: CommandStack::new(config.max_history),
            events: EventBus::new(),
            components,
            config,
            delete_guard: None,
        }
    }

    /// Apply a configuration. Resets the undo history.
    #[must_use]
    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.history = CommandStack::new(config.max_history);
        self.config = config;
        self
    }

    /// Use an existing store, shared with whoever else holds it.
    #[must_use]
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = store;
        self.lease = None;
        self
    }

    /// Use a store from a [`crate::SharedStateRegistry`]. The lease is
    /// released when the builder is dropped.
    #[must_use]
    pub fn with_shared_state(mut self, lease: SharedStateLease) -> Self {
        self.store = lease.store().clone();
        self.lease = Some(lease);
        self
    }

    /// Install a deletion confirmation hook.
    #[must_use]
    pub fn with_delete_guard(mut self, guard: impl DeleteGuard + 'static) -> Self {
        self.delete_guard = Some(Rc::new(guard));
        self
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> GridState {
        self.store.snapshot()
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Copy of one canvas.
    #[must_use]
    pub fn canvas(&self, canvas_id: &str) -> Option<Canvas> {
        self.store.read(|state| state.canvas(canvas_id).cloned())
    }

    /// Copy of one item.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<Item> {
        self.store.read(|state| state.find_item(id).cloned())
    }

    /// The active canvas.
    #[must_use]
    pub fn active_canvas(&self) -> Option<String> {
        self.store.read(|state| state.active_canvas_id.clone())
    }

    /// Registered component types.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Grid conversions scoped to this builder's containers.
    pub fn grid(&mut self) -> &mut GridCalculator {
        &mut self.grid
    }

    /// Undo history.
    #[must_use]
    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Subscribe to one kind of event.
    pub fn on(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&BuilderEvent) + 'static,
    ) -> SubscriptionId {
        self.events.on(kind, handler)
    }

    /// Subscribe to every event.
    pub fn on_any(&mut self, handler: impl FnMut(&BuilderEvent) + 'static) -> SubscriptionId {
        self.events.on_any(handler)
    }

    /// Unsubscribe.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    // -----------------------------------------------------------------------
    // Whole-state operations
    // -----------------------------------------------------------------------

    /// Restore the empty initial state and forget history.
    pub fn reset(&mut self) {
        self.store.reset();
        self.history.clear();
        self.grid.invalidate_all();
    }

    /// Export the state.
    #[must_use]
    pub fn export_state(&self) -> StateDocument {
        self.store.export()
    }

    /// Export the state as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> BuilderResult<String> {
        self.export_state().to_json()
    }

    /// Replace the state with an imported document. Omitted fields take
    /// their reset values. History and cached sizes are cleared.
    pub fn import_state(&mut self, document: StateDocument) {
        self.store.import(document);
        self.history.clear();
        self.grid.invalidate_all();
        tracing::debug!("Imported state with {} items", self.store.read(GridState::item_count));
    }

    /// Parse and import a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a state document; the current
    /// state is left untouched.
    pub fn import_json(&mut self, json: &str) -> BuilderResult<()> {
        let document = StateDocument::from_json(json)?;
        self.import_state(document);
        Ok(())
    }

    /// Switch the edited viewport. Cached container sizes are dropped since
    /// widths change with the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.store.update(|state| state.current_viewport = viewport);
        self.grid.invalidate_all();
    }

    /// Toggle the grid overlay.
    pub fn set_show_grid(&mut self, show: bool) {
        self.store.update(|state| state.show_grid = show);
    }

    /// Drop the cached size of a canvas after its container resized.
    pub fn invalidate_canvas_size(&mut self, canvas_id: &str) {
        self.grid.invalidate(canvas_id);
    }

    // -----------------------------------------------------------------------
    // Canvases
    // -----------------------------------------------------------------------

    /// Add an empty canvas.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::CanvasExists`] if the id is taken.
    pub fn try_add_canvas(&mut self, canvas_id: &str) -> BuilderResult<()> {
        self.store.try_update(|state| {
            if state.canvases.contains_key(canvas_id) {
                return Err(BuilderError::CanvasExists(canvas_id.to_string()));
            }
            state.canvases.insert(canvas_id.to_string(), Canvas::new());
            Ok(())
        })?;
        tracing::debug!("Added canvas {canvas_id}");
        Ok(())
    }

    /// Add an empty canvas. Returns `false` if it already exists.
    pub fn add_canvas(&mut self, canvas_id: &str) -> bool {
        logged("addCanvas", self.try_add_canvas(canvas_id)).is_some()
    }

    /// Remove a canvas with its items. History entries that need the canvas
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::CanvasNotFound`] if there is no such canvas.
    pub fn try_remove_canvas(&mut self, canvas_id: &str) -> BuilderResult<()> {
        self.store.try_update(|state| {
            state
                .canvases
                .remove(canvas_id)
                .ok_or_else(|| canvas_not_found(canvas_id))?;
            if state.selected_canvas_id.as_deref() == Some(canvas_id) {
                state.clear_selection();
            }
            if state.active_canvas_id.as_deref() == Some(canvas_id) {
                state.active_canvas_id = None;
            }
            Ok(())
        })?;
        self.grid.invalidate(canvas_id);
        let forgotten = self.history.forget_canvas(canvas_id);
        tracing::debug!("Removed canvas {canvas_id}, dropped {forgotten} history entries");
        Ok(())
    }

    /// Remove a canvas with its items. Returns `false` if it did not exist.
    pub fn remove_canvas(&mut self, canvas_id: &str) -> bool {
        logged("removeCanvas", self.try_remove_canvas(canvas_id)).is_some()
    }

    /// Make a canvas active. Emits `canvasActivated` on every call, even if
    /// it already was active.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::CanvasNotFound`] for an unknown canvas.
    pub fn try_set_active_canvas(&mut self, canvas_id: &str) -> BuilderResult<()> {
        self.store.try_update(|state| {
            if !state.canvases.contains_key(canvas_id) {
                return Err(canvas_not_found(canvas_id));
            }
            state.active_canvas_id = Some(canvas_id.to_string());
            Ok(())
        })?;
        self.emit_activated(canvas_id);
        Ok(())
    }

    /// Make a canvas active. Returns `false` for an unknown canvas.
    pub fn set_active_canvas(&mut self, canvas_id: &str) -> bool {
        logged("setActiveCanvas", self.try_set_active_canvas(canvas_id)).is_some()
    }

    fn emit_activated(&mut self, canvas_id: &str) {
        self.events.emit(&BuilderEvent::CanvasActivated {
            canvas_id: canvas_id.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select an item.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ItemNotFound`] if no canvas holds it.
    pub fn try_select_item(&mut self, id: &ItemId) -> BuilderResult<()> {
        self.store.try_update(|state| {
            let (canvas_id, _) = state.locate(id).ok_or_else(|| item_not_found(id))?;
            state.selected_item_id = Some(id.clone());
            state.selected_canvas_id = Some(canvas_id);
            Ok(())
        })
    }

    /// Select an item. Returns `false` if it does not exist.
    pub fn select_item(&mut self, id: &ItemId) -> bool {
        logged("selectItem", self.try_select_item(id)).is_some()
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.store.update(GridState::clear_selection);
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Place a new component on a canvas.
    ///
    /// The item gets a fresh id, the canvas's next z-index, the registered
    /// display name and the registered default config overlaid with
    /// `config`. If `position` overlaps an existing item a free slot is
    /// chosen instead.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::UnknownComponentType`] or
    /// [`BuilderError::CanvasNotFound`]; the state is untouched.
    pub fn try_add_component(
        &mut self,
        canvas_id: &str,
        component_type: &str,
        position: GridLayout,
        config: Option<ItemConfig>,
    ) -> BuilderResult<ItemId> {
        let definition = self
            .components
            .get(component_type)
            .ok_or_else(|| BuilderError::UnknownComponentType(component_type.to_string()))?;
        let avoid_collisions = self.config.avoid_collisions;
        let auto_activate = self.config.auto_activate;

        let item = self.store.try_update(|state| {
            let canvas = state
                .canvas_mut(canvas_id)
                .ok_or_else(|| canvas_not_found(canvas_id))?;

            let requested = GridLayout {
                width: position.width.max(1),
                height: position.height.max(1),
                ..position
            };
            let desktop = if avoid_collisions {
                find_free_position(requested, &canvas.items)
            } else {
                clamp_layout(requested)
            };

            let mut merged = definition.default_config.clone();
            merged.extend(config.unwrap_or_default());

            let z_index = canvas.next_z_index();
            let item = Item::new(component_type, canvas_id, definition.name.as_str(), desktop)
                .with_z_index(z_index)
                .with_config(merged);
            canvas.items.push(item.clone());
            if auto_activate {
                state.active_canvas_id = Some(canvas_id.to_string());
            }
            Ok(item)
        })?;

        tracing::debug!("Added {} {} to {canvas_id}", item.component_type, item.id);
        self.history.record(Command::AddItem(AddItemCommand {
            item: item.clone(),
            canvas_id: canvas_id.to_string(),
        }));
        let id = item.id.clone();
        self.events.emit(&BuilderEvent::ComponentAdded {
            item,
            canvas_id: canvas_id.to_string(),
        });
        if auto_activate {
            self.emit_activated(canvas_id);
        }
        Ok(id)
    }

    /// Place a new component. Returns `None` if the canvas or type is unknown.
    pub fn add_component(
        &mut self,
        canvas_id: &str,
        component_type: &str,
        position: GridLayout,
        config: Option<ItemConfig>,
    ) -> Option<ItemId> {
        logged(
            "addComponent",
            self.try_add_component(canvas_id, component_type, position, config),
        )
    }

    /// Click-to-add: place a component on the active canvas at the top-left
    /// free slot, using the type's default size.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::CanvasNotFound`] if no canvas is active, or
    /// [`BuilderError::UnknownComponentType`].
    pub fn try_add_to_active_canvas(&mut self, component_type: &str) -> BuilderResult<ItemId> {
        let canvas_id = self
            .active_canvas()
            .ok_or_else(|| canvas_not_found("<no active canvas>"))?;
        let size = self
            .components
            .get(component_type)
            .ok_or_else(|| BuilderError::UnknownComponentType(component_type.to_string()))?
            .default_size;
        let position = GridLayout::new(0, 0, size.width, size.height);
        self.try_add_component(&canvas_id, component_type, position, None)
    }

    /// Click-to-add. Returns `None` if nothing is active or the type is
    /// unknown.
    pub fn add_to_active_canvas(&mut self, component_type: &str) -> Option<ItemId> {
        logged("addToActiveCanvas", self.try_add_to_active_canvas(component_type))
    }

    /// Delete an item after consulting the deletion hook.
    ///
    /// The hook may suspend. The item is looked up again after it resolves,
    /// so an item removed in the meantime is not deleted twice.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ItemNotFound`] or
    /// [`BuilderError::DeleteDenied`]; the state is untouched.
    pub async fn try_delete_component(&mut self, id: &ItemId) -> BuilderResult<()> {
        let item = self.item(id).ok_or_else(|| item_not_found(id))?;

        if let Some(guard) = self.delete_guard.clone() {
            match guard.before_delete(&item).await {
                Ok(true) => {}
                Ok(false) => return Err(BuilderError::DeleteDenied(id.to_string())),
                Err(e) => {
                    tracing::warn!("Delete hook failed for {id}: {e}");
                    return Err(BuilderError::DeleteDenied(id.to_string()));
                }
            }
        }

        self.commit_delete(id)
    }

    /// Delete an item. Returns `false` if it does not exist or the hook
    /// denied it.
    pub async fn delete_component(&mut self, id: &ItemId) -> bool {
        let result = self.try_delete_component(id).await;
        logged("deleteComponent", result).is_some()
    }

    /// Delete an item without consulting the hook. For hosts that confirm
    /// on their side before calling in.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ItemNotFound`] if no canvas holds the item.
    pub fn commit_delete(&mut self, id: &ItemId) -> BuilderResult<()> {
        let (canvas_id, index, item, was_selected) = self.store.try_update(|state| {
            let (canvas_id, _) = state.locate(id).ok_or_else(|| item_not_found(id))?;
            let (index, item) = state
                .canvas_mut(&canvas_id)
                .and_then(|canvas| canvas.remove(id))
                .ok_or_else(|| item_not_found(id))?;
            let was_selected = state.is_selected(id);
            state.deselect(id);
            Ok((canvas_id, index, item, was_selected))
        })?;

        tracing::debug!("Deleted {id} from {canvas_id}");
        self.history.record(Command::DeleteItem(DeleteItemCommand {
            item,
            canvas_id: canvas_id.clone(),
            index,
            was_selected,
        }));
        self.events.emit(&BuilderEvent::ComponentDeleted {
            item_id: id.clone(),
            canvas_id,
        });
        Ok(())
    }

    /// Shallow-merge `patch` into an item's config. Live edit: not undoable,
    /// no event.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ItemNotFound`] if no canvas holds the item.
    pub fn try_update_config(&mut self, id: &ItemId, patch: ItemConfig) -> BuilderResult<()> {
        self.store.try_update(|state| {
            let item = state.find_item_mut(id).ok_or_else(|| item_not_found(id))?;
            item.config.extend(patch);
            Ok(())
        })
    }

    /// Shallow-merge config. Returns `false` if the item does not exist.
    pub fn update_config(&mut self, id: &ItemId, patch: ItemConfig) -> bool {
        logged("updateConfig", self.try_update_config(id, patch)).is_some()
    }

    /// Change an item's display name. Live edit: not undoable.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ItemNotFound`] if no canvas holds the item.
    pub fn try_rename_component(&mut self, id: &ItemId, name: &str) -> BuilderResult<()> {
        self.store.try_update(|state| {
            let item = state.find_item_mut(id).ok_or_else(|| item_not_found(id))?;
            item.name = name.to_string();
            Ok(())
        })
    }

    /// Rename an item. Returns `false` if it does not exist.
    pub fn rename_component(&mut self, id: &ItemId, name: &str) -> bool {
        logged("renameComponent", self.try_rename_component(id, name)).is_some()
    }

    /// Move or resize an item within its canvas for one viewport.
    ///
    /// Desktop layouts are clamped to the canvas and re-derive an
    /// uncustomized mobile layout. Setting a mobile layout marks it
    /// customized. The change is undoable and emits `componentMoved`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ItemNotFound`] if no canvas holds the item.
    pub fn try_update_layout(
        &mut self,
        id: &ItemId,
        viewport: Viewport,
        layout: GridLayout,
    ) -> BuilderResult<()> {
        let layout = clamp_layout(GridLayout {
            width: layout.width.max(1),
            height: layout.height.max(1),
            ..layout
        });

        let (canvas_id, index, before, item) = self.store.try_update(|state| {
            let (canvas_id, index) = state.locate(id).ok_or_else(|| item_not_found(id))?;
            let item = state
                .canvas_mut(&canvas_id)
                .and_then(|canvas| canvas.items.get_mut(index))
                .ok_or_else(|| item_not_found(id))?;
            let before = Placement::from(&*item);
            match viewport {
                Viewport::Desktop => item.layouts.set_desktop(layout),
                Viewport::Mobile => item.layouts.set_mobile(layout),
            }
            Ok((canvas_id, index, before, item.clone()))
        })?;

        let after = Placement::from(&item);
        if before == after {
            return Ok(());
        }
        self.history.record(Command::MoveItem(MoveItemCommand {
            item_id: id.clone(),
            source_canvas_id: canvas_id.clone(),
            target_canvas_id: canvas_id.clone(),
            source_index: index,
            before,
            after,
        }));
        let position = item.layouts.desktop;
        self.events.emit(&BuilderEvent::ComponentMoved {
            item,
            source_canvas_id: canvas_id.clone(),
            target_canvas_id: canvas_id,
            position,
        });
        Ok(())
    }

    /// Move or resize within a canvas. Returns `false` if the item does not
    /// exist.
    pub fn update_layout(&mut self, id: &ItemId, viewport: Viewport, layout: GridLayout) -> bool {
        logged("updateLayout", self.try_update_layout(id, viewport, layout)).is_some()
    }

    /// Move an item to `target_canvas_id`, dropped at pixel `(drop_x,
    /// drop_y)` relative to the target container.
    ///
    /// The drop point is snapped to the target's grid and clamped to its
    /// bounds. If the target cannot be measured yet the item keeps its
    /// column. The item takes the target's next z-index, stays selected if
    /// it was, and the target becomes active. Emits `componentMoved` then
    /// `canvasActivated`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::CanvasNotFound`] or
    /// [`BuilderError::ItemNotFound`]; the state is untouched.
    pub fn try_move_across_canvas(
        &mut self,
        id: &ItemId,
        source_canvas_id: &str,
        target_canvas_id: &str,
        drop_x: f64,
        drop_y: f64,
    ) -> BuilderResult<()> {
        let current = self.store.read(|state| {
            let Some(source) = state.canvas(source_canvas_id) else {
                tracing::error!("Source canvas not found: {source_canvas_id}");
                return Err(canvas_not_found(source_canvas_id));
            };
            let Some(item) = source.get(id) else {
                tracing::error!("Item not found in source canvas: {id} in {source_canvas_id}");
                return Err(item_not_found(id));
            };
            if !state.canvases.contains_key(target_canvas_id) {
                tracing::error!("Target canvas not found: {target_canvas_id}");
                return Err(canvas_not_found(target_canvas_id));
            }
            Ok(item.layouts.desktop)
        })?;

        let x = if self.grid.is_ready(target_canvas_id) {
            self.grid.to_grid_x(drop_x, target_canvas_id)
        } else {
            tracing::debug!("Canvas {target_canvas_id} not measurable, keeping column");
            current.x
        };
        let y = GridCalculator::to_grid_y(drop_y);
        let desktop = clamp_layout(current.at(x, y));
        let (x, y) = (desktop.x, desktop.y);

        let (source_index, before, item) = self.store.try_update(|state| {
            if !state.canvases.contains_key(target_canvas_id) {
                return Err(canvas_not_found(target_canvas_id));
            }
            let source = state
                .canvas_mut(source_canvas_id)
                .ok_or_else(|| canvas_not_found(source_canvas_id))?;
            let source_index = source.position(id).ok_or_else(|| item_not_found(id))?;

            let (before, item) = if source_canvas_id == target_canvas_id {
                // Same canvas: keep array order, bring to front.
                let z_index = source.next_z_index();
                let item = &mut source.items[source_index];
                let before = Placement::from(&*item);
                item.z_index = z_index;
                item.layouts.set_desktop(desktop);
                (before, item.clone())
            } else {
                let (_, mut item) = source.remove(id).ok_or_else(|| item_not_found(id))?;
                let before = Placement::from(&item);
                let target = state
                    .canvas_mut(target_canvas_id)
                    .ok_or_else(|| canvas_not_found(target_canvas_id))?;
                item.z_index = target.next_z_index();
                item.canvas_id = target_canvas_id.to_string();
                item.layouts.set_desktop(desktop);
                target.items.push(item.clone());
                (before, item)
            };

            state.follow_selection(id, target_canvas_id);
            state.active_canvas_id = Some(target_canvas_id.to_string());
            Ok((source_index, before, item))
        })?;

        tracing::debug!("Moved {id} from {source_canvas_id} to {target_canvas_id} at ({x}, {y})");
        self.history.record(Command::MoveItem(MoveItemCommand {
            item_id: id.clone(),
            source_canvas_id: source_canvas_id.to_string(),
            target_canvas_id: target_canvas_id.to_string(),
            source_index,
            before,
            after: Placement::from(&item),
        }));
        self.events.emit(&BuilderEvent::ComponentMoved {
            item,
            source_canvas_id: source_canvas_id.to_string(),
            target_canvas_id: target_canvas_id.to_string(),
            position: desktop,
        });
        self.emit_activated(target_canvas_id);
        Ok(())
    }

    /// Move an item across canvases. Returns `false` (after logging) if the
    /// source canvas, item or target canvas is missing.
    pub fn move_across_canvas(
        &mut self,
        id: &ItemId,
        source_canvas_id: &str,
        target_canvas_id: &str,
        drop_x: f64,
        drop_y: f64,
    ) -> bool {
        self.try_move_across_canvas(id, source_canvas_id, target_canvas_id, drop_x, drop_y)
            .is_ok()
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Undo the last command. No-op (and no event) when there is none, or
    /// when the command's canvas was removed through another builder.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        let history = &mut self.history;
        let done = self.store.update(|state| history.undo(state));
        if done {
            self.events.emit(&BuilderEvent::UndoExecuted);
        }
        done
    }

    /// Redo the next undone command. No-op (and no event) when there is
    /// none, or when the command's canvas is gone.
    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        let history = &mut self.history;
        let done = self.store.update(|state| history.redo(state));
        if done {
            self.events.emit(&BuilderEvent::RedoExecuted);
        }
        done
    }

    /// Whether there is something to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether there is something to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentDefinition, StaticWidths};
    use std::cell::RefCell;

    fn builder() -> PageBuilder {
        let components = ComponentRegistry::new()
            .with(ComponentDefinition::new("header", "Header").with_size(50, 6))
            .with(ComponentDefinition::new("text", "Text Block").with_size(20, 4));
        let widths = StaticWidths::new();
        widths.set("c1", 1000.0);
        widths.set("c2", 1000.0);
        let mut builder = PageBuilder::new(components, widths);
        builder.add_canvas("c1");
        builder.add_canvas("c2");
        builder
    }

    fn record(builder: &mut PageBuilder) -> Rc<RefCell<Vec<EventKind>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        builder.on_any(move |event| sink.borrow_mut().push(event.kind()));
        log
    }

    #[test]
    fn test_add_component_assigns_z_and_name() {
        let mut b = builder();
        let id = b
            .add_component("c1", "header", GridLayout::new(0, 0, 50, 6), None)
            .expect("added");
        let canvas = b.canvas("c1").expect("canvas");
        assert_eq!(canvas.items.len(), 1);
        assert_eq!(canvas.items[0].z_index, 1);
        assert_eq!(canvas.z_index_counter, 1);
        assert_eq!(canvas.items[0].name, "Header");
        assert_eq!(canvas.items[0].id, id);
    }

    #[test]
    fn test_add_component_failures_leave_state() {
        let mut b = builder();
        let before = b.state();
        let revision = b.store().revision();
        assert!(b.add_component("nope", "header", GridLayout::new(0, 0, 5, 5), None).is_none());
        assert!(b.add_component("c1", "footer", GridLayout::new(0, 0, 5, 5), None).is_none());
        assert_eq!(b.state(), before);
        assert_eq!(b.store().revision(), revision);
        assert!(!b.can_undo());
    }

    #[test]
    fn test_add_merges_default_config() {
        let components = ComponentRegistry::new().with(
            ComponentDefinition::new("image", "Image").with_config(
                serde_json::json!({"src": "", "alt": "none"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            ),
        );
        let mut b = PageBuilder::new(components, StaticWidths::new());
        b.add_canvas("c1");
        let patch = serde_json::json!({"src": "a.png"}).as_object().cloned();
        let id = b
            .add_component("c1", "image", GridLayout::new(0, 0, 10, 10), patch)
            .expect("added");
        let item = b.item(&id).expect("item");
        assert_eq!(item.config["src"], "a.png");
        assert_eq!(item.config["alt"], "none");
    }

    #[test]
    fn test_add_emits_added_then_activated() {
        let mut b = builder();
        let log = record(&mut b);
        b.add_component("c2", "text", GridLayout::new(0, 0, 10, 2), None);
        assert_eq!(
            log.borrow().as_slice(),
            &[EventKind::ComponentAdded, EventKind::CanvasActivated]
        );
        assert_eq!(b.active_canvas().as_deref(), Some("c2"));
    }

    #[test]
    fn test_set_active_canvas_always_emits() {
        let mut b = builder();
        let log = record(&mut b);
        assert!(b.set_active_canvas("c1"));
        assert!(b.set_active_canvas("c1"));
        assert!(!b.set_active_canvas("missing"));
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(b.active_canvas().as_deref(), Some("c1"));
    }

    #[test]
    fn test_click_to_add_uses_active_canvas() {
        let mut b = builder();
        assert!(b.add_to_active_canvas("text").is_none(), "nothing active yet");
        b.set_active_canvas("c2");
        let id = b.add_to_active_canvas("text").expect("added");
        let item = b.item(&id).expect("item");
        assert_eq!(item.canvas_id, "c2");
        assert_eq!(item.layouts.desktop, GridLayout::new(0, 0, 20, 4));
    }

    #[test]
    fn test_update_config_is_live_edit() {
        let mut b = builder();
        let id = b
            .add_component("c1", "text", GridLayout::new(0, 0, 10, 2), None)
            .expect("added");
        let patch = serde_json::json!({"text": "hi"}).as_object().cloned().unwrap_or_default();
        assert!(b.update_config(&id, patch));
        assert_eq!(b.item(&id).expect("item").config["text"], "hi");
        assert_eq!(b.history().len(), 1, "config edits are not recorded");
        assert!(!b.update_config(&ItemId::from("ghost"), ItemConfig::new()));
    }

    #[test]
    fn test_update_layout_undo() {
        let mut b = builder();
        let id = b
            .add_component("c1", "text", GridLayout::new(0, 0, 10, 2), None)
            .expect("added");
        assert!(b.update_layout(&id, Viewport::Desktop, GridLayout::new(45, 3, 10, 8)));
        let item = b.item(&id).expect("item");
        assert_eq!(item.layouts.desktop, GridLayout::new(40, 3, 10, 8), "clamped");
        assert_eq!(item.layouts.mobile.height, 8);

        assert!(b.update_layout(&id, Viewport::Mobile, GridLayout::new(0, 0, 50, 3)));
        assert!(b.item(&id).expect("item").layouts.mobile.customized);

        b.undo();
        b.undo();
        let item = b.item(&id).expect("item");
        assert_eq!(item.layouts.desktop, GridLayout::new(0, 0, 10, 2));
        assert!(!item.layouts.mobile.customized);
    }

    #[test]
    fn test_remove_canvas_clears_references() {
        let mut b = builder();
        let id = b
            .add_component("c1", "text", GridLayout::new(0, 0, 10, 2), None)
            .expect("added");
        b.select_item(&id);
        b.grid().grid_size_horizontal("c1");
        assert!(b.grid().is_cached("c1"));

        assert!(b.remove_canvas("c1"));
        let state = b.state();
        assert!(state.selected_item_id.is_none());
        assert!(state.active_canvas_id.is_none());
        assert!(!b.grid().is_cached("c1"));
        assert!(!b.remove_canvas("c1"));
    }

    #[test]
    fn test_undo_at_boundary_emits_nothing() {
        let mut b = builder();
        let log = record(&mut b);
        assert!(!b.undo());
        assert!(!b.redo());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_commit_delete_skips_hook() {
        let mut b = builder().with_delete_guard(FnGuard(|_item: Item| async { HookResult::Ok(false) }));
        let id = b
            .add_component("c1", "text", GridLayout::new(0, 0, 10, 2), None)
            .expect("added");
        assert!(b.commit_delete(&id).is_ok());
        assert!(b.item(&id).is_none());
        assert!(matches!(b.commit_delete(&id), Err(BuilderError::ItemNotFound(_))));
    }
}
