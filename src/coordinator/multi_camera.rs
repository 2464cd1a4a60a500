//! One tracker per camera, merged into a single per-tick view.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coordinator::sightings::SightingHistory;
use crate::coordinator::vehicle_id::{IdNamespace, VehicleId};
use crate::tracker::{CentroidTracker, Detection, TrackerConfig};

/// Where per-camera object IDs come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// The coordinator runs a [`CentroidTracker`] per camera.
    #[default]
    Centroid,
    /// Boxes arrive with `track_id` set by an external tracker.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub mode: TrackingMode,
    pub namespace: IdNamespace,
    pub tracker: TrackerConfig,
    /// Consecutive ticks a camera may go without a frame before its objects
    /// are dropped. `None` keeps them until the camera comes back.
    pub stale_camera_ticks: Option<u32>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let tracker = TrackerConfig::default();
        Self {
            mode: TrackingMode::default(),
            namespace: IdNamespace::default(),
            stale_camera_ticks: Some(tracker.max_disappeared),
            tracker,
        }
    }
}

#[derive(Debug, Clone)]
struct CameraSlot {
    tracker: CentroidTracker,
    missed_ticks: u32,
}

/// Result of one coordinator tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickView {
    pub timestamp: f64,
    /// IDs visible this tick, per camera that delivered a frame
    pub current_vehicle_ids: BTreeMap<usize, BTreeSet<VehicleId>>,
    /// Camera sequence of every vehicle with at least two sightings
    pub directions: BTreeMap<VehicleId, Vec<usize>>,
}

impl TickView {
    /// Sum of visible IDs over all cameras.
    pub fn interval_vehicle_count(&self) -> usize {
        self.current_vehicle_ids.values().map(BTreeSet::len).sum()
    }

    pub fn visible_ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.current_vehicle_ids.values().flatten().copied()
    }
}

pub struct MultiCameraCoordinator {
    config: CoordinatorConfig,
    cameras: BTreeMap<usize, CameraSlot>,
    history: SightingHistory,
}

impl MultiCameraCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            cameras: BTreeMap::new(),
            history: SightingHistory::new(),
        }
    }

    /// Register cameras up front so a camera that never delivers a frame is
    /// still accounted for by stale-camera handling.
    pub fn with_cameras(mut self, cameras: impl IntoIterator<Item = usize>) -> Self {
        for camera in cameras {
            self.cameras
                .entry(camera)
                .or_insert_with(|| CameraSlot::new(self.config.tracker));
        }
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn camera_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.cameras.keys().copied()
    }

    pub fn tracker(&self, camera: usize) -> Option<&CentroidTracker> {
        self.cameras.get(&camera).map(|slot| &slot.tracker)
    }

    pub fn history(&self) -> &SightingHistory {
        &self.history
    }

    /// Advance one tick.
    ///
    /// `frames` holds the boxes of every camera that produced a frame. A
    /// camera missing from `frames` failed to read: its tracker is not
    /// advanced, which is different from a frame with no detections.
    pub fn update(&mut self, now: f64, frames: &BTreeMap<usize, Vec<Detection>>) -> TickView {
        let tracker_config = self.config.tracker;
        let namespace = self.config.namespace;
        let mut current_vehicle_ids = BTreeMap::new();

        for (&camera, detections) in frames {
            let slot = self
                .cameras
                .entry(camera)
                .or_insert_with(|| CameraSlot::new(tracker_config));
            slot.missed_ticks = 0;

            let ids: BTreeSet<VehicleId> = match self.config.mode {
                TrackingMode::Centroid => slot
                    .tracker
                    .update(detections)
                    .iter()
                    .filter(|o| o.is_visible())
                    .map(|o| namespace.vehicle_id(camera, o.id))
                    .collect(),
                TrackingMode::External => {
                    let untracked = detections.iter().filter(|d| d.track_id.is_none()).count();
                    if untracked > 0 {
                        debug!(camera, untracked, "dropping boxes without an external track id");
                    }
                    detections
                        .iter()
                        .filter_map(|d| d.track_id)
                        .filter_map(|id| {
                            let vehicle = namespace.try_vehicle_id(camera, id);
                            if vehicle.is_none() {
                                warn!(
                                    camera,
                                    track_id = id,
                                    "track id too wide for the id namespace, dropping box"
                                );
                            }
                            vehicle
                        })
                        .collect()
                }
            };

            for &id in &ids {
                self.history.record(id, camera, now);
            }
            current_vehicle_ids.insert(camera, ids);
        }

        self.age_missing_cameras(frames);

        TickView {
            timestamp: now,
            current_vehicle_ids,
            directions: self.history.directions(),
        }
    }

    fn age_missing_cameras(&mut self, frames: &BTreeMap<usize, Vec<Detection>>) {
        let limit = self.config.stale_camera_ticks;
        for (&camera, slot) in self.cameras.iter_mut() {
            if frames.contains_key(&camera) {
                continue;
            }
            slot.missed_ticks = slot.missed_ticks.saturating_add(1);
            match limit {
                Some(limit) if slot.missed_ticks > limit && !slot.tracker.is_empty() => {
                    warn!(
                        camera,
                        missed_ticks = slot.missed_ticks,
                        dropped = slot.tracker.len(),
                        "camera stalled, dropping its tracked objects"
                    );
                    slot.tracker.reset();
                }
                _ if slot.missed_ticks == 1 => debug!(camera, "no frame from camera this tick"),
                _ => {}
            }
        }
    }
}

impl CameraSlot {
    fn new(config: TrackerConfig) -> Self {
        Self {
            tracker: CentroidTracker::new(config),
            missed_ticks: 0,
        }
    }
}
