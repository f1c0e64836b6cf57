//! Grid coordinate system.
//!
//! Layouts are stored in grid units. Horizontally the grid is responsive:
//! [`CANVAS_WIDTH_UNITS`] units always span the full container width, so one
//! unit is 2% of the measured width. Vertically a unit is a fixed
//! [`VERTICAL_UNIT_PX`] pixels because canvas height is unbounded.
//!
//! Container widths come from a [`WidthProvider`] so the math runs without a
//! DOM. Measuring is assumed to be expensive; horizontal sizes are cached per
//! canvas until [`GridCalculator::invalidate`] is called.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Number of horizontal grid units spanning a canvas.
pub const CANVAS_WIDTH_UNITS: i32 = 50;

/// Fraction of the container width covered by one horizontal unit.
pub const HORIZONTAL_UNIT_RATIO: f64 = 0.02;

/// Pixel height of one vertical grid unit.
pub const VERTICAL_UNIT_PX: f64 = 20.0;

/// Source of rendered container widths, in pixels.
///
/// Returning `None` (or a non-positive width) means the container is not
/// measurable yet.
pub trait WidthProvider {
    /// Rendered width of the container for `canvas_id`.
    fn container_width(&self, canvas_id: &str) -> Option<f64>;
}

impl<F> WidthProvider for F
where
    F: Fn(&str) -> Option<f64>,
{
    fn container_width(&self, canvas_id: &str) -> Option<f64> {
        self(canvas_id)
    }
}

/// Width provider backed by a shared table of known widths.
///
/// Useful for headless hosts and tests. Clones share the same table, so a
/// host can keep one handle to report resizes after giving another to a
/// [`GridCalculator`].
#[derive(Debug, Clone, Default)]
pub struct StaticWidths {
    widths: Arc<RwLock<HashMap<String, f64>>>,
}

impl StaticWidths {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with one entry.
    #[must_use]
    pub fn with(canvas_id: &str, width: f64) -> Self {
        let table = Self::new();
        table.set(canvas_id, width);
        table
    }

    /// Record the rendered width of a canvas container.
    pub fn set(&self, canvas_id: &str, width: f64) {
        self.widths
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(canvas_id.to_string(), width);
    }

    /// Forget a canvas container.
    pub fn remove(&self, canvas_id: &str) {
        self.widths
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(canvas_id);
    }
}

impl WidthProvider for StaticWidths {
    fn container_width(&self, canvas_id: &str) -> Option<f64> {
        self.widths
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(canvas_id)
            .copied()
    }
}

/// Converts between pixels and grid units.
pub struct GridCalculator {
    provider: Box<dyn WidthProvider>,
    /// Horizontal unit sizes keyed by `"<canvasId>-h"`.
    cache: HashMap<String, f64>,
}

impl std::fmt::Debug for GridCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridCalculator")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl GridCalculator {
    /// Create a calculator measuring containers through `provider`.
    #[must_use]
    pub fn new(provider: impl WidthProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            cache: HashMap::new(),
        }
    }

    fn cache_key(canvas_id: &str) -> String {
        format!("{canvas_id}-h")
    }

    /// Pixel width of one horizontal unit on `canvas_id`.
    ///
    /// Returns `0.0` when the container cannot be measured. A zero result is
    /// not cached, so the next call measures again.
    pub fn grid_size_horizontal(&mut self, canvas_id: &str) -> f64 {
        let key = Self::cache_key(canvas_id);
        if let Some(size) = self.cache.get(&key) {
            return *size;
        }

        match self.provider.container_width(canvas_id) {
            Some(width) if width.is_finite() && width > 0.0 => {
                let size = width * HORIZONTAL_UNIT_RATIO;
                self.cache.insert(key, size);
                size
            }
            _ => {
                tracing::debug!("Container width unavailable for canvas {canvas_id}");
                0.0
            }
        }
    }

    /// Pixel height of one vertical unit.
    #[must_use]
    pub const fn grid_size_vertical() -> f64 {
        VERTICAL_UNIT_PX
    }

    /// Whether horizontal conversions on `canvas_id` are meaningful.
    pub fn is_ready(&mut self, canvas_id: &str) -> bool {
        self.grid_size_horizontal(canvas_id) > 0.0
    }

    /// Horizontal units to whole pixels.
    pub fn to_pixels_x(&mut self, units: i32, canvas_id: &str) -> f64 {
        (f64::from(units) * self.grid_size_horizontal(canvas_id)).round()
    }

    /// Vertical units to pixels.
    #[must_use]
    pub fn to_pixels_y(units: i32) -> f64 {
        f64::from(units) * VERTICAL_UNIT_PX
    }

    /// Pixels to the nearest horizontal unit. This rounding is the snap.
    ///
    /// Returns `0` when the container is not measurable.
    pub fn to_grid_x(&mut self, pixels: f64, canvas_id: &str) -> i32 {
        let size = self.grid_size_horizontal(canvas_id);
        if size <= 0.0 {
            return 0;
        }
        round_to_units(pixels / size)
    }

    /// Pixels to the nearest vertical unit.
    #[must_use]
    pub fn to_grid_y(pixels: f64) -> i32 {
        round_to_units(pixels / VERTICAL_UNIT_PX)
    }

    /// Drop the cached size of one canvas.
    pub fn invalidate(&mut self, canvas_id: &str) {
        self.cache.remove(&Self::cache_key(canvas_id));
    }

    /// Drop every cached size.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Whether a size is currently cached for `canvas_id`.
    #[must_use]
    pub fn is_cached(&self, canvas_id: &str) -> bool {
        self.cache.contains_key(&Self::cache_key(canvas_id))
    }
}

#[allow(clippy::cast_possible_truncation)] // `as` saturates out-of-range values
fn round_to_units(value: f64) -> i32 {
    if value.is_finite() {
        value.round() as i32
    } else {
        0
    }
}
