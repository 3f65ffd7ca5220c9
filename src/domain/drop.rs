//! Pointer geometry for drag-and-drop.
//!
//! The view measures card rectangles and the pointer; these functions turn
//! that into the plain index `BoardController::move_note` expects, so the
//! controller never sees pixels.

use serde::{Deserialize, Serialize};

/// Minimum share of the dragged card's area that must overlap a target
/// before the two swap.
pub const SWAP_OVERLAP_THRESHOLD: f64 = 0.2;

/// An axis-aligned bounding box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    fn intersection_area(&self, other: &Rect) -> f64 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }
}

/// Insertion index for a drop at `pointer_y` into a column whose cards
/// (dragged card excluded) occupy `layout`, top to bottom.
///
/// Dropping above a card's vertical midpoint lands before it; anywhere
/// below every midpoint appends.
pub fn resolve_drop_index(pointer_y: f64, layout: &[Rect]) -> usize {
    layout
        .iter()
        .position(|rect| pointer_y - rect.mid_y() <= 0.0)
        .unwrap_or(layout.len())
}

/// Fraction of `dragged`'s area covered by `target`
pub fn overlap_ratio(dragged: &Rect, target: &Rect) -> f64 {
    let area = dragged.area();
    if area <= 0.0 {
        return 0.0;
    }
    dragged.intersection_area(target) / area
}

/// Whether the overlap is large enough to commit a swap
pub fn should_swap(dragged: &Rect, target: &Rect) -> bool {
    overlap_ratio(dragged, target) > SWAP_OVERLAP_THRESHOLD
}
