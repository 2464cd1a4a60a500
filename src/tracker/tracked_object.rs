//! Single object owned by a centroid tracker.

use crate::tracker::rect::{Centroid, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Tracker-local identifier, never reused by the same tracker
    pub id: u64,
    /// Centre of the last matched box
    pub centroid: Centroid,
    /// Last matched box
    pub rect: Rect,
    /// Consecutive updates without a matching detection
    pub disappeared_count: u32,
}

impl TrackedObject {
    pub fn new(id: u64, rect: Rect) -> Self {
        Self {
            id,
            centroid: rect.centroid(),
            rect,
            disappeared_count: 0,
        }
    }

    /// Move the object onto a new detection and clear its miss streak.
    pub fn update(&mut self, rect: Rect) {
        self.rect = rect;
        self.centroid = rect.centroid();
        self.disappeared_count = 0;
    }

    /// Record one missed update; returns true once the object should be
    /// deregistered.
    pub fn mark_missed(&mut self, max_disappeared: u32) -> bool {
        self.disappeared_count += 1;
        self.disappeared_count > max_disappeared
    }

    /// Whether the object was matched or registered on the latest update.
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.disappeared_count == 0
    }
}
