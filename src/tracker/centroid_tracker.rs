//! Greedy centroid tracker.

use std::collections::BTreeMap;

use tracing::trace;

use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::{Centroid, Rect};
use crate::tracker::tracked_object::TrackedObject;

/// Configuration for the CentroidTracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Consecutive misses an object survives; one more deregisters it.
    pub max_disappeared: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { max_disappeared: 50 }
    }
}

/// Assigns persistent IDs to detections of a single camera stream.
///
/// Objects are kept in registration order, which is also ID order since IDs
/// are handed out from a monotonically increasing counter.
#[derive(Debug, Clone)]
pub struct CentroidTracker {
    objects: Vec<TrackedObject>,
    next_object_id: u64,
    config: TrackerConfig,
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            objects: Vec::new(),
            next_object_id: 0,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Objects still registered after the latest update.
    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    /// ID to centroid view of [`Self::objects`].
    pub fn centroids(&self) -> BTreeMap<u64, Centroid> {
        self.objects.iter().map(|o| (o.id, o.centroid)).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// ID the next registered object will receive.
    pub fn next_id(&self) -> u64 {
        self.next_object_id
    }

    /// Drop every object. The ID counter keeps running so IDs are never
    /// reused.
    pub fn reset(&mut self) {
        self.objects.clear();
    }

    pub fn update(&mut self, detections: &[Detection]) -> &[TrackedObject] {
        let rects: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
        self.update_rects(&rects)
    }

    pub fn update_rects(&mut self, rects: &[Rect]) -> &[TrackedObject] {
        if rects.is_empty() {
            self.age_all();
            return &self.objects;
        }

        if self.objects.is_empty() {
            for &rect in rects {
                self.register(rect);
            }
            return &self.objects;
        }

        let tracked: Vec<Centroid> = self.objects.iter().map(|o| o.centroid).collect();
        let inputs: Vec<Centroid> = rects.iter().map(Rect::centroid).collect();
        let dists = matching::centroid_distance(&tracked, &inputs);

        let AssignmentResult {
            matches,
            unmatched_rows,
            unmatched_cols,
        } = matching::greedy_assignment(&dists);

        for (row, col) in matches {
            self.objects[row].update(rects[col]);
        }

        let max_disappeared = self.config.max_disappeared;
        let mut expired = vec![false; self.objects.len()];
        for row in unmatched_rows {
            expired[row] = self.objects[row].mark_missed(max_disappeared);
        }
        self.remove_expired(&expired);

        for col in unmatched_cols {
            self.register(rects[col]);
        }

        &self.objects
    }

    fn register(&mut self, rect: Rect) {
        let object = TrackedObject::new(self.next_object_id, rect);
        trace!(id = object.id, x = object.centroid.x, y = object.centroid.y, "registered object");
        self.objects.push(object);
        self.next_object_id += 1;
    }

    fn age_all(&mut self) {
        let max_disappeared = self.config.max_disappeared;
        let expired: Vec<bool> = self
            .objects
            .iter_mut()
            .map(|o| o.mark_missed(max_disappeared))
            .collect();
        self.remove_expired(&expired);
    }

    fn remove_expired(&mut self, expired: &[bool]) {
        let mut flags = expired.iter();
        self.objects.retain(|o| {
            let gone = flags.next().copied().unwrap_or(false);
            if gone {
                trace!(id = o.id, "deregistered object");
            }
            !gone
        });
    }
}
