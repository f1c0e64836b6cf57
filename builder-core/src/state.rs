//! Builder state: canvases, items, selection, viewport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Item, ItemId, Viewport};

/// One drop-target surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    /// Items in paint order. Stacking is governed by `z_index`, not position.
    pub items: Vec<Item>,
    /// Last z-index handed out on this canvas. Never decreases.
    pub z_index_counter: i64,
}

impl Canvas {
    /// Create an empty canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter and return the new top z-index.
    pub fn next_z_index(&mut self) -> i64 {
        self.z_index_counter += 1;
        self.z_index_counter
    }

    /// Array index of an item.
    #[must_use]
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    /// Whether the canvas holds the item.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.position(id).is_some()
    }

    /// Get an item by ID.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Get a mutable reference to an item by ID.
    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Remove an item, returning its former index and the item.
    pub fn remove(&mut self, id: &ItemId) -> Option<(usize, Item)> {
        let index = self.position(id)?;
        Some((index, self.items.remove(index)))
    }

    /// Insert an item at `index`, clamped to the current length.
    pub fn insert_at(&mut self, index: usize, item: Item) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    /// Highest z-index currently on the canvas.
    #[must_use]
    pub fn max_z_index(&self) -> i64 {
        self.items.iter().map(|item| item.z_index).max().unwrap_or(0)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the canvas has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The complete builder state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    /// Canvases keyed by ID, iterated in key order.
    pub canvases: BTreeMap<String, Canvas>,
    /// Selected item, if any.
    pub selected_item_id: Option<ItemId>,
    /// Canvas of the selected item.
    pub selected_canvas_id: Option<String>,
    /// Canvas targeted by click-to-add. Independent of selection.
    pub active_canvas_id: Option<String>,
    /// Layout variant being edited.
    pub current_viewport: Viewport,
    /// Whether the grid overlay is drawn.
    pub show_grid: bool,
}

impl Default for GridState {
    fn default() -> Self {
        Self {
            canvases: BTreeMap::new(),
            selected_item_id: None,
            selected_canvas_id: None,
            active_canvas_id: None,
            current_viewport: Viewport::Desktop,
            show_grid: true,
        }
    }
}

impl GridState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a canvas by ID.
    #[must_use]
    pub fn canvas(&self, canvas_id: &str) -> Option<&Canvas> {
        self.canvases.get(canvas_id)
    }

    /// Get a mutable canvas by ID.
    pub fn canvas_mut(&mut self, canvas_id: &str) -> Option<&mut Canvas> {
        self.canvases.get_mut(canvas_id)
    }

    /// Find which canvas holds an item, and where.
    #[must_use]
    pub fn locate(&self, id: &ItemId) -> Option<(String, usize)> {
        self.canvases.iter().find_map(|(canvas_id, canvas)| {
            canvas.position(id).map(|index| (canvas_id.clone(), index))
        })
    }

    /// Find an item on any canvas.
    #[must_use]
    pub fn find_item(&self, id: &ItemId) -> Option<&Item> {
        self.canvases.values().find_map(|canvas| canvas.get(id))
    }

    /// Find an item on any canvas, mutably.
    pub fn find_item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.canvases
            .values_mut()
            .find_map(|canvas| canvas.get_mut(id))
    }

    /// Whether the item is the current selection.
    #[must_use]
    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.selected_item_id.as_ref() == Some(id)
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selected_item_id = None;
        self.selected_canvas_id = None;
    }

    /// Clear the selection if it points at `id`. Returns whether it did.
    pub fn deselect(&mut self, id: &ItemId) -> bool {
        if self.is_selected(id) {
            self.clear_selection();
            true
        } else {
            false
        }
    }

    /// Point `selected_canvas_id` at `canvas_id` if `id` is selected.
    pub fn follow_selection(&mut self, id: &ItemId, canvas_id: &str) {
        if self.is_selected(id) {
            self.selected_canvas_id = Some(canvas_id.to_string());
        }
    }

    /// Total number of items across canvases.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.canvases.values().map(Canvas::len).sum()
    }

    /// Whether the selection refers to an item that exists where it claims.
    #[must_use]
    pub fn selection_is_consistent(&self) -> bool {
        match (&self.selected_item_id, &self.selected_canvas_id) {
            (None, None) => true,
            (Some(item_id), Some(canvas_id)) => self
                .canvases
                .get(canvas_id)
                .is_some_and(|canvas| canvas.contains(item_id)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridLayout;

    fn item(canvas_id: &str) -> Item {
        Item::new("text", canvas_id, "Text", GridLayout::new(0, 0, 10, 2))
    }

    #[test]
    fn test_z_index_counter_advances() {
        let mut canvas = Canvas::new();
        assert_eq!(canvas.next_z_index(), 1);
        assert_eq!(canvas.next_z_index(), 2);
        assert_eq!(canvas.z_index_counter, 2);
    }

    #[test]
    fn test_remove_reports_index_and_insert_clamps() {
        let mut canvas = Canvas::new();
        let a = item("c1");
        let b = item("c1");
        let b_id = b.id.clone();
        canvas.items.push(a);
        canvas.items.push(b);

        let (index, removed) = canvas.remove(&b_id).expect("should remove");
        assert_eq!(index, 1);
        assert_eq!(canvas.len(), 1);

        canvas.insert_at(99, removed);
        assert_eq!(canvas.position(&b_id), Some(1));
    }

    #[test]
    fn test_locate_and_selection() {
        let mut state = GridState::new();
        let it = item("c2");
        let id = it.id.clone();
        state.canvases.insert("c1".into(), Canvas::new());
        state.canvases.entry("c2".into()).or_default().items.push(it);

        assert_eq!(state.locate(&id), Some(("c2".to_string(), 0)));
        assert_eq!(state.item_count(), 1);

        state.selected_item_id = Some(id.clone());
        state.selected_canvas_id = Some("c2".into());
        assert!(state.selection_is_consistent());

        state.selected_canvas_id = Some("c1".into());
        assert!(!state.selection_is_consistent());

        assert!(state.deselect(&id));
        assert!(state.selected_item_id.is_none());
        assert!(state.selected_canvas_id.is_none());
    }

    #[test]
    fn test_default_state() {
        let state = GridState::default();
        assert!(state.canvases.is_empty());
        assert!(state.active_canvas_id.is_none());
        assert_eq!(state.current_viewport, Viewport::Desktop);
    }
}
