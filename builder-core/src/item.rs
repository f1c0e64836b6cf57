//! Placed components and their per-viewport layouts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::CANVAS_WIDTH_UNITS;

/// Component-specific configuration. Opaque to the core.
pub type ItemConfig = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for an item. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a new unique item ID.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("item-{}", Uuid::new_v4().simple()))
    }

    /// Borrow the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layout variant stored per item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    /// Wide layout, positions chosen by the user.
    #[default]
    Desktop,
    /// Narrow layout, derived from desktop until customized.
    Mobile,
}

/// Position and size in grid units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    /// Column of the left edge.
    pub x: i32,
    /// Row of the top edge.
    pub y: i32,
    /// Width in horizontal units.
    pub width: i32,
    /// Height in vertical units.
    pub height: i32,
}

impl GridLayout {
    /// Create a layout from position and size.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Column just past the right edge. Saturates at `i32::MAX`.
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Row just past the bottom edge. Saturates at `i32::MAX`.
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Axis-aligned bounding-box overlap. Touching edges do not overlap.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Same size, moved to `(x, y)`.
    #[must_use]
    pub const fn at(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }
}

/// Mobile layout. `customized == false` means it is derived from desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileLayout {
    /// Column of the left edge.
    pub x: i32,
    /// Row of the top edge.
    pub y: i32,
    /// Width in horizontal units.
    pub width: i32,
    /// Height in vertical units.
    pub height: i32,
    /// Set once the user adjusts the mobile layout explicitly.
    #[serde(default)]
    pub customized: bool,
}

impl MobileLayout {
    /// Default mobile layout: full width, height follows desktop.
    #[must_use]
    pub const fn derived_from(desktop: &GridLayout) -> Self {
        Self {
            x: 0,
            y: 0,
            width: CANVAS_WIDTH_UNITS,
            height: desktop.height,
            customized: false,
        }
    }

    /// The geometry without the customization flag.
    #[must_use]
    pub const fn grid(&self) -> GridLayout {
        GridLayout::new(self.x, self.y, self.width, self.height)
    }
}

/// Per-viewport layouts of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLayouts {
    /// Desktop layout.
    pub desktop: GridLayout,
    /// Mobile layout.
    pub mobile: MobileLayout,
}

impl ItemLayouts {
    /// Layouts for a freshly placed item.
    #[must_use]
    pub const fn new(desktop: GridLayout) -> Self {
        Self {
            desktop,
            mobile: MobileLayout::derived_from(&desktop),
        }
    }

    /// Replace the desktop layout, re-deriving mobile unless customized.
    pub fn set_desktop(&mut self, desktop: GridLayout) {
        self.desktop = desktop;
        if !self.mobile.customized {
            self.mobile = MobileLayout::derived_from(&desktop);
        }
    }

    /// Replace the mobile layout and mark it as customized.
    pub fn set_mobile(&mut self, layout: GridLayout) {
        self.mobile = MobileLayout {
            x: layout.x,
            y: layout.y,
            width: layout.width,
            height: layout.height,
            customized: true,
        };
    }

    /// Layout for the given viewport.
    #[must_use]
    pub const fn get(&self, viewport: Viewport) -> GridLayout {
        match viewport {
            Viewport::Desktop => self.desktop,
            Viewport::Mobile => self.mobile.grid(),
        }
    }
}

/// One placed component instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier.
    pub id: ItemId,
    /// Key into the component registry.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Owning canvas. Always equals the key of the containing canvas.
    pub canvas_id: String,
    /// Display label.
    pub name: String,
    /// Stacking order within the owning canvas.
    pub z_index: i64,
    /// Desktop and mobile layouts.
    pub layouts: ItemLayouts,
    /// Component configuration.
    #[serde(default)]
    pub config: ItemConfig,
}

impl Item {
    /// Create a new item with a fresh ID.
    #[must_use]
    pub fn new(
        component_type: impl Into<String>,
        canvas_id: impl Into<String>,
        name: impl Into<String>,
        desktop: GridLayout,
    ) -> Self {
        Self {
            id: ItemId::new(),
            component_type: component_type.into(),
            canvas_id: canvas_id.into(),
            name: name.into(),
            z_index: 0,
            layouts: ItemLayouts::new(desktop),
            config: ItemConfig::new(),
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ItemConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the z-index.
    #[must_use]
    pub fn with_z_index(mut self, z_index: i64) -> Self {
        self.z_index = z_index;
        self
    }

    /// Desktop bounding box, used for collision checks.
    #[must_use]
    pub const fn bounds(&self) -> GridLayout {
        self.layouts.desktop
    }
}
