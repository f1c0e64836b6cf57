//! # Builder Core
//!
//! Layout and state engine for a drag-and-drop grid page builder.
//! Compiles to WASM so any front-end can drive it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              builder-core.wasm              │
//! ├─────────────────────────────────────────────┤
//! │  PageBuilder (lifecycle operations, events) │
//! ├──────────────────────┬──────────────────────┤
//! │  Command Stack       │  Placement Engine    │
//! │  - Add/Delete/Move   │  - Collision scan    │
//! │  - Linear undo/redo  │  - Boundary clamp    │
//! ├──────────────────────┼──────────────────────┤
//! │  State Store         │  Grid Calculator     │
//! │  - Canvases, items   │  - px <-> grid units │
//! │  - Selection, active │  - Width cache       │
//! └──────────────────────┴──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod grid;
pub mod item;
pub mod placement;
pub mod registry;
pub mod schema;
pub mod state;
pub mod store;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use builder::{DeleteGuard, FnGuard, HookResult, PageBuilder};
pub use command::{Command, CommandStack};
pub use config::BuilderConfig;
pub use error::{BuilderError, BuilderResult};
pub use event::{BuilderEvent, EventBus, EventKind, SubscriptionId};
pub use grid::{
    GridCalculator, StaticWidths, WidthProvider, CANVAS_WIDTH_UNITS, VERTICAL_UNIT_PX,
};
pub use item::{GridLayout, Item, ItemConfig, ItemId, ItemLayouts, MobileLayout, Viewport};
pub use registry::{ComponentDefinition, ComponentRegistry, ComponentSize};
pub use schema::StateDocument;
pub use state::{Canvas, GridState};
pub use store::{SharedStateLease, SharedStateRegistry, StateStore};

/// Builder core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
