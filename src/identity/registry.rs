use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::aggregation::HOUR_SECS;
use crate::coordinator::VehicleId;

/// Known vehicles and when each was last seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleIdentityState {
    /// Every vehicle ever reported as new; never pruned
    pub tracked_ids: BTreeSet<VehicleId>,
    /// Last-seen Unix time in seconds; pruned to the last hour
    pub id_timestamps: BTreeMap<VehicleId, f64>,
}

impl VehicleIdentityState {
    pub fn is_empty(&self) -> bool {
        self.tracked_ids.is_empty() && self.id_timestamps.is_empty()
    }
}

/// Runtime owner of [`VehicleIdentityState`].
#[derive(Debug, Clone, Default)]
pub struct VehicleRegistry {
    state: VehicleIdentityState,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: VehicleIdentityState) -> Self {
        let mut registry = Self::new();
        registry.merge(state);
        registry
    }

    /// Fold persisted state into the runtime state. A vehicle that only has
    /// a timestamp is added to `tracked_ids`; the newer timestamp wins.
    pub fn merge(&mut self, other: VehicleIdentityState) {
        self.state.tracked_ids.extend(other.tracked_ids);
        for (id, seen) in other.id_timestamps {
            self.state.tracked_ids.insert(id);
            let entry = self.state.id_timestamps.entry(id).or_insert(seen);
            if seen > *entry {
                *entry = seen;
            }
        }
    }

    /// Record that `id` was seen at `now`. Returns true for a new vehicle.
    pub fn observe(&mut self, id: VehicleId, now: f64) -> bool {
        self.state.id_timestamps.insert(id, now);
        self.state.tracked_ids.insert(id)
    }

    /// Forget last-seen times older than one hour relative to `now`.
    pub fn prune(&mut self, now: f64) -> usize {
        let before = self.state.id_timestamps.len();
        self.state
            .id_timestamps
            .retain(|_, seen| now - *seen <= HOUR_SECS);
        before - self.state.id_timestamps.len()
    }

    /// Vehicles with a last-seen time inside the window.
    pub fn active_count(&self) -> usize {
        self.state.id_timestamps.len()
    }

    pub fn known_count(&self) -> usize {
        self.state.tracked_ids.len()
    }

    pub fn is_known(&self, id: VehicleId) -> bool {
        self.state.tracked_ids.contains(&id)
    }

    pub fn state(&self) -> &VehicleIdentityState {
        &self.state
    }

    pub fn into_state(self) -> VehicleIdentityState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_reports_new_once() {
        let mut registry = VehicleRegistry::new();
        assert!(registry.observe(VehicleId(3), 10.0));
        assert!(!registry.observe(VehicleId(3), 20.0));
        assert_eq!(registry.state().id_timestamps[&VehicleId(3)], 20.0);
        assert_eq!(registry.known_count(), 1);
    }

    #[test]
    fn test_prune_keeps_tracked_ids() {
        let mut registry = VehicleRegistry::new();
        registry.observe(VehicleId(1), 0.0);
        registry.observe(VehicleId(2), 500.0);

        assert_eq!(registry.prune(3600.0), 0);
        assert_eq!(registry.prune(3700.0), 1);
        assert_eq!(registry.active_count(), 1);
        assert!(registry.is_known(VehicleId(1)));
        assert_eq!(registry.known_count(), 2);
    }

    #[test]
    fn test_merge_backfills_tracked_ids() {
        let mut loaded = VehicleIdentityState::default();
        loaded.tracked_ids.insert(VehicleId(7));
        loaded.id_timestamps.insert(VehicleId(9), 50.0);

        let mut registry = VehicleRegistry::new();
        registry.observe(VehicleId(9), 80.0);
        registry.merge(loaded);

        assert!(registry.is_known(VehicleId(7)));
        assert!(registry.is_known(VehicleId(9)));
        assert_eq!(registry.state().id_timestamps[&VehicleId(9)], 80.0);
    }
}
