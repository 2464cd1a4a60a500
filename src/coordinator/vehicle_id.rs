use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Identity of a vehicle downstream of the coordinator.
///
/// Serialized as a bare integer so the identity store stays a plain list of
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

impl VehicleId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VehicleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// How tracker-local IDs turn into [`VehicleId`]s.
///
/// With the default `PerCamera` and the centroid tracker every camera owns
/// its IDs, so a vehicle path never spans two cameras; cross-camera paths
/// need `Shared` with externally assigned IDs from one counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdNamespace {
    /// `(camera, local_id)` packed as `camera << 32 | local_id`; two cameras
    /// can never produce the same vehicle ID.
    #[default]
    PerCamera,
    /// The local ID is used as-is, so equal numbers from different cameras
    /// are the same vehicle. Only sound when the IDs share one counter.
    Shared,
}

const CAMERA_SHIFT: u32 = 32;
const LOCAL_MASK: u64 = (1 << CAMERA_SHIFT) - 1;

impl IdNamespace {
    /// Packs `(camera, local_id)`. `None` when `PerCamera` cannot represent
    /// the pair: `local_id` or `camera` does not fit in 32 bits.
    pub fn try_vehicle_id(self, camera: usize, local_id: u64) -> Option<VehicleId> {
        match self {
            IdNamespace::PerCamera => {
                let camera = u64::try_from(camera).ok().filter(|&c| c <= LOCAL_MASK)?;
                (local_id <= LOCAL_MASK).then(|| VehicleId((camera << CAMERA_SHIFT) | local_id))
            }
            IdNamespace::Shared => Some(VehicleId(local_id)),
        }
    }

    /// Like [`Self::try_vehicle_id`], but out-of-range parts are masked to 32
    /// bits with a warning.
    pub fn vehicle_id(self, camera: usize, local_id: u64) -> VehicleId {
        self.try_vehicle_id(camera, local_id).unwrap_or_else(|| {
            warn!(camera, local_id, "id does not fit the per-camera namespace, truncating");
            VehicleId((((camera as u64) & LOCAL_MASK) << CAMERA_SHIFT) | (local_id & LOCAL_MASK))
        })
    }

    /// Inverse of [`Self::vehicle_id`]; the camera is unknown for shared IDs.
    pub fn split(self, id: VehicleId) -> (Option<usize>, u64) {
        match self {
            IdNamespace::PerCamera => {
                (Some((id.0 >> CAMERA_SHIFT) as usize), id.0 & LOCAL_MASK)
            }
            IdNamespace::Shared => (None, id.0),
        }
    }
}
