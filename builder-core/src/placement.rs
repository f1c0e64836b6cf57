//! Item placement: collision avoidance for new items and boundary clamping.
//!
//! Collisions are checked against desktop layouts of items on the same
//! canvas. When a requested position is occupied, rows are scanned top to
//! bottom starting at the requested row, columns left to right, and the first
//! free slot wins. A slot below every existing item is always free, so the
//! scan terminates.
//!
//! Only the requested row and rows where some item ends can hold the first
//! free slot: if a slot is free one row lower than such a row, it was already
//! free one row higher. The scan visits those rows only, so its cost depends
//! on the number of items, not on how far down they sit.

use crate::grid::CANVAS_WIDTH_UNITS;
use crate::{GridLayout, Item, ItemId};

/// Clamp a position so an item of `width` stays on the canvas.
///
/// `x` is limited to `0..=CANVAS_WIDTH_UNITS - width`; an item wider than the
/// canvas is pinned to `x = 0`. `y` only has a lower bound.
#[must_use]
pub fn clamp_to_canvas(x: i32, y: i32, width: i32) -> (i32, i32) {
    let max_x = (CANVAS_WIDTH_UNITS - width).max(0);
    (x.clamp(0, max_x), y.max(0))
}

/// Clamp a whole layout. See [`clamp_to_canvas`]. The bottom edge is also
/// kept representable, so `y + height` never exceeds `i32::MAX`.
#[must_use]
pub fn clamp_layout(layout: GridLayout) -> GridLayout {
    let (x, y) = clamp_to_canvas(layout.x, layout.y, layout.width);
    layout.at(x, y.min(i32::MAX - layout.height.max(0)))
}

/// Whether `candidate` overlaps any item, optionally ignoring one.
#[must_use]
pub fn collides(candidate: &GridLayout, items: &[Item], ignore: Option<&ItemId>) -> bool {
    items
        .iter()
        .filter(|item| Some(&item.id) != ignore)
        .any(|item| candidate.overlaps(&item.bounds()))
}

/// Choose a non-overlapping position for a new item.
///
/// Returns the clamped candidate unchanged when it is free.
#[must_use]
pub fn find_free_position(candidate: GridLayout, items: &[Item]) -> GridLayout {
    let candidate = clamp_layout(candidate);
    if !collides(&candidate, items, None) {
        return candidate;
    }

    let max_x = (CANVAS_WIDTH_UNITS - candidate.width).max(0);
    let max_y = i32::MAX - candidate.height.max(0);
    let mut rows: Vec<i32> = items
        .iter()
        .map(|item| item.bounds().bottom())
        .filter(|&bottom| bottom > candidate.y && bottom <= max_y)
        .collect();
    rows.push(candidate.y);
    rows.sort_unstable();
    rows.dedup();
    let lowest = rows.last().copied().unwrap_or(candidate.y);

    for &y in &rows {
        for x in 0..=max_x {
            let slot = candidate.at(x, y);
            if !collides(&slot, items, None) {
                tracing::debug!(
                    "Requested ({}, {}) occupied, placed at ({x}, {y})",
                    candidate.x,
                    candidate.y
                );
                return slot;
            }
        }
    }

    tracing::warn!("No free slot below row {lowest}, overlapping at the bottom edge");
    candidate.at(0, lowest)
}
