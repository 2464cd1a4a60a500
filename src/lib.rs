//! Vehicle identity tracking and traffic aggregation across camera feeds.
//!
//! Detection boxes from one or more cameras flow through a greedy centroid
//! tracker per camera, get merged by a multi-camera coordinator, and feed a
//! one-hour sliding window that emits traffic statistics on a fixed cadence.
//! Known vehicle identities survive restarts through a small JSON store.

pub mod aggregation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod integration;
pub mod tracker;

pub use aggregation::{AggregatedRecord, Aggregator, IntervalRecord, IntervalWindow};
pub use config::Settings;
pub use coordinator::{IdNamespace, MultiCameraCoordinator, TickView, TrackingMode, VehicleId};
pub use error::{Error, Result};
pub use identity::{IdentityStore, VehicleIdentityState, VehicleRegistry};
pub use tracker::{Centroid, CentroidTracker, Detection, Rect, TrackedObject};
