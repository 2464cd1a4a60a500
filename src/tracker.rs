mod centroid_tracker;
mod matching;
mod rect;
mod tracked_object;

pub use centroid_tracker::{CentroidTracker, TrackerConfig};
pub use matching::{AssignmentResult, Detection, centroid_distance, greedy_assignment};
pub use rect::{Centroid, Rect};
pub use tracked_object::TrackedObject;
