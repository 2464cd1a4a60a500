//! Per-vehicle sighting history and direction inference.

use std::collections::{BTreeMap, HashMap};

use crate::coordinator::vehicle_id::VehicleId;

/// One observation of a vehicle by a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub camera: usize,
    /// Unix time in seconds
    pub timestamp: f64,
}

/// Append-only sighting log keyed by vehicle.
#[derive(Debug, Clone, Default)]
pub struct SightingHistory {
    sightings: HashMap<VehicleId, Vec<Sighting>>,
}

impl SightingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: VehicleId, camera: usize, timestamp: f64) {
        self.sightings
            .entry(id)
            .or_default()
            .push(Sighting { camera, timestamp });
    }

    pub fn sightings(&self, id: VehicleId) -> Option<&[Sighting]> {
        self.sightings.get(&id).map(Vec::as_slice)
    }

    /// Number of vehicles with at least one sighting.
    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }

    /// Camera sequence of every vehicle seen at least twice, oldest first.
    ///
    /// Recomputed from the full history on each call. The sort is stable, so
    /// sightings sharing a timestamp stay in the order they were recorded.
    pub fn directions(&mut self) -> BTreeMap<VehicleId, Vec<usize>> {
        let mut directions = BTreeMap::new();
        for (&id, sightings) in self.sightings.iter_mut() {
            if sightings.len() < 2 {
                continue;
            }
            sightings.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            directions.insert(id, sightings.iter().map(|s| s.camera).collect());
        }
        directions
    }
}

/// Human readable key for a camera sequence, e.g. `0 -> 1 -> 2`.
pub fn direction_key(cameras: &[usize]) -> String {
    cameras
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
