//! Builder events and the typed publish/subscribe bus.

use serde::{Deserialize, Serialize};

use crate::{GridLayout, Item, ItemId};

/// Events emitted after state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum BuilderEvent {
    /// An item was placed on a canvas.
    ComponentAdded {
        /// The new item.
        item: Item,
        /// Canvas that received it.
        canvas_id: String,
    },

    /// An item was removed.
    ComponentDeleted {
        /// ID of the removed item.
        item_id: ItemId,
        /// Canvas it was removed from.
        canvas_id: String,
    },

    /// An item changed canvas or position.
    ComponentMoved {
        /// The item after the move.
        item: Item,
        /// Canvas it left.
        source_canvas_id: String,
        /// Canvas it now belongs to.
        target_canvas_id: String,
        /// Desktop layout after the move.
        position: GridLayout,
    },

    /// A canvas became the active canvas.
    CanvasActivated {
        /// The active canvas.
        canvas_id: String,
    },

    /// A command was undone.
    UndoExecuted,

    /// A command was redone.
    RedoExecuted,
}

/// Discriminant of [`BuilderEvent`], used to subscribe to one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// [`BuilderEvent::ComponentAdded`].
    ComponentAdded,
    /// [`BuilderEvent::ComponentDeleted`].
    ComponentDeleted,
    /// [`BuilderEvent::ComponentMoved`].
    ComponentMoved,
    /// [`BuilderEvent::CanvasActivated`].
    CanvasActivated,
    /// [`BuilderEvent::UndoExecuted`].
    UndoExecuted,
    /// [`BuilderEvent::RedoExecuted`].
    RedoExecuted,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ComponentAdded => "componentAdded",
            Self::ComponentDeleted => "componentDeleted",
            Self::ComponentMoved => "componentMoved",
            Self::CanvasActivated => "canvasActivated",
            Self::UndoExecuted => "undoExecuted",
            Self::RedoExecuted => "redoExecuted",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::ComponentAdded,
            Self::ComponentDeleted,
            Self::ComponentMoved,
            Self::CanvasActivated,
            Self::UndoExecuted,
            Self::RedoExecuted,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }
}

impl BuilderEvent {
    /// The variant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ComponentAdded { .. } => EventKind::ComponentAdded,
            Self::ComponentDeleted { .. } => EventKind::ComponentDeleted,
            Self::ComponentMoved { .. } => EventKind::ComponentMoved,
            Self::CanvasActivated { .. } => EventKind::CanvasActivated,
            Self::UndoExecuted => EventKind::UndoExecuted,
            Self::RedoExecuted => EventKind::RedoExecuted,
        }
    }
}

/// Event callback.
pub type EventHandler = Box<dyn FnMut(&BuilderEvent)>;

/// Token returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every event.
    filter: Option<EventKind>,
    handler: EventHandler,
}

/// Dispatches events to subscribers in subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriptions.len())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&mut self, filter: Option<EventKind>, handler: EventHandler) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription {
            id,
            filter,
            handler,
        });
        id
    }

    /// Subscribe to one kind of event.
    pub fn on(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&BuilderEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe(Some(kind), Box::new(handler))
    }

    /// Subscribe to every event.
    pub fn on_any(&mut self, handler: impl FnMut(&BuilderEvent) + 'static) -> SubscriptionId {
        self.subscribe(None, Box::new(handler))
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    /// Deliver an event to matching subscribers.
    pub fn emit(&mut self, event: &BuilderEvent) {
        let kind = event.kind();
        tracing::trace!("Emitting {}", kind.name());
        for sub in &mut self.subscriptions {
            if sub.filter.is_none_or(|filter| filter == kind) {
                (sub.handler)(event);
            }
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}
