//! Merges per-camera tracking results into one view per tick.

mod multi_camera;
mod sightings;
mod vehicle_id;

pub use multi_camera::{CoordinatorConfig, MultiCameraCoordinator, TickView, TrackingMode};
pub use sightings::{Sighting, SightingHistory, direction_key};
pub use vehicle_id::{IdNamespace, VehicleId};
