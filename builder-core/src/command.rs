//! Undo/redo command stack.
//!
//! Every undoable mutation is a [`Command`] holding owned snapshots of what
//! it needs to replay in either direction. Replays are idempotent: running
//! `redo` (or `undo`) twice leaves the same state as running it once.
//!
//! The stack is one history list with a cursor `p` in `0..=len`. Undo
//! replays `history[p - 1]` backwards, redo replays `history[p]` forwards.
//! Recording a new command while `p < len` discards the redo branch.

use crate::{GridState, Item, ItemId, ItemLayouts};

/// An item was added to a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct AddItemCommand {
    /// Snapshot of the item as added.
    pub item: Item,
    /// Canvas that received it.
    pub canvas_id: String,
}

impl AddItemCommand {
    fn redo(&self, state: &mut GridState) -> bool {
        let Some(canvas) = state.canvas_mut(&self.canvas_id) else {
            tracing::warn!("Cannot re-add {}: canvas {} is gone", self.item.id, self.canvas_id);
            return false;
        };
        if !canvas.contains(&self.item.id) {
            canvas.items.push(self.item.clone());
        }
        canvas.z_index_counter = canvas.z_index_counter.max(self.item.z_index);
        true
    }

    fn undo(&self, state: &mut GridState) -> bool {
        let Some(canvas) = state.canvas_mut(&self.canvas_id) else {
            tracing::warn!("Cannot remove {}: canvas {} is gone", self.item.id, self.canvas_id);
            return false;
        };
        canvas.remove(&self.item.id);
        state.deselect(&self.item.id);
        true
    }
}

/// An item was removed from a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemCommand {
    /// Snapshot of the item before removal.
    pub item: Item,
    /// Canvas it was removed from.
    pub canvas_id: String,
    /// Array index it occupied, restored on undo.
    pub index: usize,
    /// Whether the item was selected when removed; undo reselects it.
    pub was_selected: bool,
}

impl DeleteItemCommand {
    fn redo(&self, state: &mut GridState) -> bool {
        let Some(canvas) = state.canvas_mut(&self.canvas_id) else {
            tracing::warn!("Cannot delete {}: canvas {} is gone", self.item.id, self.canvas_id);
            return false;
        };
        canvas.remove(&self.item.id);
        state.deselect(&self.item.id);
        true
    }

    fn undo(&self, state: &mut GridState) -> bool {
        let Some(canvas) = state.canvas_mut(&self.canvas_id) else {
            tracing::warn!("Cannot restore {}: canvas {} is gone", self.item.id, self.canvas_id);
            return false;
        };
        if !canvas.contains(&self.item.id) {
            canvas.insert_at(self.index, self.item.clone());
        }
        canvas.z_index_counter = canvas.z_index_counter.max(self.item.z_index);
        if self.was_selected {
            state.selected_item_id = Some(self.item.id.clone());
            state.selected_canvas_id = Some(self.canvas_id.clone());
        }
        true
    }
}

/// Where an item sits: its layouts and stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Desktop and mobile layouts.
    pub layouts: ItemLayouts,
    /// Z-index on the owning canvas.
    pub z_index: i64,
}

impl From<&Item> for Placement {
    fn from(item: &Item) -> Self {
        Self {
            layouts: item.layouts,
            z_index: item.z_index,
        }
    }
}

/// An item moved, within one canvas or across canvases.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveItemCommand {
    /// The moved item.
    pub item_id: ItemId,
    /// Canvas before the move.
    pub source_canvas_id: String,
    /// Canvas after the move. Equal to the source for in-canvas moves.
    pub target_canvas_id: String,
    /// Array index in the source canvas, restored on undo.
    pub source_index: usize,
    /// Placement before the move.
    pub before: Placement,
    /// Placement after the move.
    pub after: Placement,
}

impl MoveItemCommand {
    fn redo(&self, state: &mut GridState) -> bool {
        relocate(
            state,
            &self.item_id,
            &self.source_canvas_id,
            &self.target_canvas_id,
            self.after,
            None,
        )
    }

    fn undo(&self, state: &mut GridState) -> bool {
        relocate(
            state,
            &self.item_id,
            &self.target_canvas_id,
            &self.source_canvas_id,
            self.before,
            Some(self.source_index),
        )
    }
}

/// Put `id` on canvas `to` with `placement`, taking it from `from` if it is
/// still there. `index` of `None` appends.
fn relocate(
    state: &mut GridState,
    id: &ItemId,
    from: &str,
    to: &str,
    placement: Placement,
    index: Option<usize>,
) -> bool {
    if !state.canvases.contains_key(to) {
        tracing::warn!("Cannot move {id}: canvas {to} is gone");
        return false;
    }

    let taken = if from == to {
        None
    } else {
        state.canvas_mut(from).and_then(|canvas| canvas.remove(id))
    };

    let Some(canvas) = state.canvas_mut(to) else {
        return false;
    };
    match taken {
        Some((_, mut item)) => {
            item.canvas_id = to.to_string();
            item.layouts = placement.layouts;
            item.z_index = placement.z_index;
            match index {
                Some(index) => canvas.insert_at(index, item),
                None => canvas.items.push(item),
            }
        }
        None => {
            // In-canvas move, or a replay that already happened.
            let Some(item) = canvas.get_mut(id) else {
                tracing::warn!("Cannot move {id}: not on {from} or {to}");
                return false;
            };
            item.layouts = placement.layouts;
            item.z_index = placement.z_index;
        }
    }
    canvas.z_index_counter = canvas.z_index_counter.max(placement.z_index);
    state.follow_selection(id, to);
    true
}

/// An invertible record of one undoable mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// See [`AddItemCommand`].
    AddItem(AddItemCommand),
    /// See [`DeleteItemCommand`].
    DeleteItem(DeleteItemCommand),
    /// See [`MoveItemCommand`].
    MoveItem(MoveItemCommand),
}

impl Command {
    /// Apply the command forwards.
    pub fn redo(&self, state: &mut GridState) -> bool {
        match self {
            Self::AddItem(cmd) => cmd.redo(state),
            Self::DeleteItem(cmd) => cmd.redo(state),
            Self::MoveItem(cmd) => cmd.redo(state),
        }
    }

    /// Apply the command backwards.
    pub fn undo(&self, state: &mut GridState) -> bool {
        match self {
            Self::AddItem(cmd) => cmd.undo(state),
            Self::DeleteItem(cmd) => cmd.undo(state),
            Self::MoveItem(cmd) => cmd.undo(state),
        }
    }

    /// Whether replaying the command needs `canvas_id`.
    #[must_use]
    pub fn touches(&self, canvas_id: &str) -> bool {
        match self {
            Self::AddItem(cmd) => cmd.canvas_id == canvas_id,
            Self::DeleteItem(cmd) => cmd.canvas_id == canvas_id,
            Self::MoveItem(cmd) => {
                cmd.source_canvas_id == canvas_id || cmd.target_canvas_id == canvas_id
            }
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::AddItem(cmd) => format!("Add {}", cmd.item.name),
            Self::DeleteItem(cmd) => format!("Delete {}", cmd.item.name),
            Self::MoveItem(cmd) if cmd.source_canvas_id == cmd.target_canvas_id => {
                format!("Move {}", cmd.item_id)
            }
            Self::MoveItem(cmd) => format!(
                "Move {} from {} to {}",
                cmd.item_id, cmd.source_canvas_id, cmd.target_canvas_id
            ),
        }
    }
}

/// Bounded linear undo history.
#[derive(Debug, Clone)]
pub struct CommandStack {
    history: Vec<Command>,
    /// Number of commands currently applied.
    position: usize,
    max_history: usize,
}

impl CommandStack {
    /// Create an empty stack keeping at most `max_history` commands.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            history: Vec::new(),
            position: 0,
            max_history,
        }
    }

    /// Apply `command` to `state` and record it.
    pub fn execute(&mut self, command: Command, state: &mut GridState) -> bool {
        let applied = command.redo(state);
        if applied {
            self.record(command);
        }
        applied
    }

    /// Record an already-applied command, discarding any redo branch.
    pub fn record(&mut self, command: Command) {
        if self.max_history == 0 {
            return;
        }
        self.history.truncate(self.position);
        self.history.push(command);
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }
        self.position = self.history.len();
    }

    /// Undo the last applied command. No-op at the start of history.
    ///
    /// A command that can no longer be replayed (its canvas was removed
    /// elsewhere) is stepped over and `false` is returned.
    pub fn undo(&mut self, state: &mut GridState) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.position -= 1;
        let command = &self.history[self.position];
        tracing::debug!("Undo: {}", command.description());
        let applied = command.undo(state);
        if !applied {
            tracing::warn!("Skipped undo of stale command: {}", command.description());
        }
        applied
    }

    /// Redo the next undone command. No-op at the end of history.
    ///
    /// Stale commands are stepped over as in [`undo`](Self::undo).
    pub fn redo(&mut self, state: &mut GridState) -> bool {
        if !self.can_redo() {
            return false;
        }
        let command = &self.history[self.position];
        self.position += 1;
        tracing::debug!("Redo: {}", command.description());
        let applied = command.redo(state);
        if !applied {
            tracing::warn!("Skipped redo of stale command: {}", command.description());
        }
        applied
    }

    /// Drop every command that needs `canvas_id`, keeping the cursor on the
    /// same applied/undone split. Returns how many were dropped.
    pub fn forget_canvas(&mut self, canvas_id: &str) -> usize {
        let before = self.history.len();
        let applied_dropped = self.history[..self.position]
            .iter()
            .filter(|command| command.touches(canvas_id))
            .count();
        self.history.retain(|command| !command.touches(canvas_id));
        self.position -= applied_dropped;
        before - self.history.len()
    }

    /// Whether [`undo`](Self::undo) would do anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    /// Whether [`redo`](Self::redo) would do anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.position < self.history.len()
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.history.clear();
        self.position = 0;
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Current cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Canvas, GridLayout};

    fn state_with(canvases: &[&str]) -> GridState {
        let mut state = GridState::new();
        for id in canvases {
            state.canvases.insert((*id).to_string(), Canvas::new());
        }
        state
    }

    fn add(state: &mut GridState, canvas_id: &str, layout: GridLayout) -> AddItemCommand {
        let canvas = state.canvas_mut(canvas_id).expect("canvas");
        let z = canvas.next_z_index();
        AddItemCommand {
            item: Item::new("text", canvas_id, "Text", layout).with_z_index(z),
            canvas_id: canvas_id.to_string(),
        }
    }

    #[test]
    fn test_add_undo_redo() {
        let mut state = state_with(&["c1"]);
        let mut stack = CommandStack::new(10);
        let cmd = add(&mut state, "c1", GridLayout::new(0, 0, 10, 2));
        let id = cmd.item.id.clone();

        assert!(stack.execute(Command::AddItem(cmd), &mut state));
        assert_eq!(state.canvases["c1"].len(), 1);

        assert!(stack.undo(&mut state));
        assert!(state.find_item(&id).is_none());
        assert_eq!(state.canvases["c1"].z_index_counter, 1, "counter never decreases");

        assert!(stack.redo(&mut state));
        assert_eq!(state.canvases["c1"].items[0].id, id);
    }

    #[test]
    fn test_boundaries_are_noops() {
        let mut state = state_with(&["c1"]);
        let mut stack = CommandStack::new(10);
        let before = state.clone();
        assert!(!stack.undo(&mut state));
        assert!(!stack.redo(&mut state));
        assert_eq!(state, before);
    }

    #[test]
    fn test_replays_are_idempotent() {
        let mut state = state_with(&["c1", "c2"]);
        let add_cmd = add(&mut state, "c1", GridLayout::new(0, 0, 10, 2));
        let item = add_cmd.item.clone();
        let cmd = Command::AddItem(add_cmd);
        cmd.redo(&mut state);
        cmd.redo(&mut state);
        assert_eq!(state.canvases["c1"].len(), 1);

        let moved = {
            let mut after = Placement::from(&item);
            after.z_index = 1;
            after.layouts.set_desktop(GridLayout::new(5, 3, 10, 2));
            Command::MoveItem(MoveItemCommand {
                item_id: item.id.clone(),
                source_canvas_id: "c1".into(),
                target_canvas_id: "c2".into(),
                source_index: 0,
                before: Placement::from(&item),
                after,
            })
        };
        moved.redo(&mut state);
        let once = state.clone();
        moved.redo(&mut state);
        assert_eq!(state, once);

        moved.undo(&mut state);
        let undone = state.clone();
        moved.undo(&mut state);
        assert_eq!(state, undone);
        assert_eq!(state.canvases["c1"].items[0], item);
    }

    #[test]
    fn test_delete_undo_restores_index() {
        let mut state = state_with(&["c1"]);
        let mut stack = CommandStack::new(10);
        let mut ids = Vec::new();
        for x in [0, 10, 20] {
            let cmd = add(&mut state, "c1", GridLayout::new(x, 0, 10, 2));
            ids.push(cmd.item.id.clone());
            stack.execute(Command::AddItem(cmd), &mut state);
        }

        let middle = state.canvases["c1"].items[1].clone();
        state.selected_item_id = Some(middle.id.clone());
        state.selected_canvas_id = Some("c1".into());
        stack.execute(
            Command::DeleteItem(DeleteItemCommand {
                item: middle.clone(),
                canvas_id: "c1".into(),
                index: 1,
                was_selected: true,
            }),
            &mut state,
        );
        assert_eq!(state.canvases["c1"].len(), 2);
        assert!(state.selected_item_id.is_none());

        stack.undo(&mut state);
        let order: Vec<_> = state.canvases["c1"].items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(order, ids);
        assert_eq!(state.selected_item_id.as_ref(), Some(&middle.id));
        assert_eq!(state.selected_canvas_id.as_deref(), Some("c1"));
        assert!(state.selection_is_consistent());
    }

    #[test]
    fn test_new_command_discards_redo_branch() {
        let mut state = state_with(&["c1"]);
        let mut stack = CommandStack::new(10);
        for x in [0, 10] {
            let cmd = add(&mut state, "c1", GridLayout::new(x, 0, 10, 2));
            stack.execute(Command::AddItem(cmd), &mut state);
        }
        stack.undo(&mut state);
        assert!(stack.can_redo());

        let cmd = add(&mut state, "c1", GridLayout::new(30, 0, 10, 2));
        stack.execute(Command::AddItem(cmd), &mut state);
        assert!(!stack.can_redo());
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.position(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = state_with(&["c1"]);
        let mut stack = CommandStack::new(3);
        for x in 0..5 {
            let cmd = add(&mut state, "c1", GridLayout::new(x * 10, 0, 10, 2));
            stack.execute(Command::AddItem(cmd), &mut state);
        }
        assert_eq!(stack.len(), 3);
        let mut undone = 0;
        while stack.undo(&mut state) {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert_eq!(state.canvases["c1"].len(), 2);
    }

    #[test]
    fn test_zero_history_records_nothing() {
        let mut state = state_with(&["c1"]);
        let mut stack = CommandStack::new(0);
        let cmd = add(&mut state, "c1", GridLayout::new(0, 0, 10, 2));
        assert!(stack.execute(Command::AddItem(cmd), &mut state));
        assert_eq!(state.canvases["c1"].len(), 1);
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_missing_canvas_fails_replay() {
        let mut state = state_with(&["c1"]);
        let cmd = add(&mut state, "c1", GridLayout::new(0, 0, 10, 2));
        state.canvases.remove("c1");
        let cmd = Command::AddItem(cmd);
        assert!(!cmd.redo(&mut state));
        assert!(!cmd.undo(&mut state));
    }

    #[test]
    fn test_stale_command_is_stepped_over() {
        let mut state = state_with(&["c1", "c2"]);
        let mut stack = CommandStack::new(10);
        let first = add(&mut state, "c2", GridLayout::new(0, 0, 10, 2));
        stack.execute(Command::AddItem(first), &mut state);
        let stale = add(&mut state, "c1", GridLayout::new(0, 0, 10, 2));
        stack.execute(Command::AddItem(stale), &mut state);
        state.canvases.remove("c1");

        let before = state.clone();
        assert!(!stack.undo(&mut state));
        assert_eq!(state, before);
        assert_eq!(stack.position(), 1);

        assert!(stack.undo(&mut state));
        assert!(state.canvases["c2"].is_empty());
    }

    #[test]
    fn test_forget_canvas_keeps_cursor_split() {
        let mut state = state_with(&["c1", "c2"]);
        let mut stack = CommandStack::new(10);
        for canvas_id in ["c1", "c2", "c1", "c2"] {
            let cmd = add(&mut state, canvas_id, GridLayout::new(0, 0, 10, 2));
            stack.execute(Command::AddItem(cmd), &mut state);
        }
        stack.undo(&mut state);
        stack.undo(&mut state);
        assert_eq!(stack.position(), 2);

        assert_eq!(stack.forget_canvas("c1"), 2);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.position(), 1);
        assert!(stack.can_undo());
        assert!(stack.can_redo());
    }
}
