//! JSON snapshot of known vehicle identities.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coordinator::VehicleId;
use crate::error::{Error, Result};
use crate::identity::registry::VehicleIdentityState;

pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk layout. Files written before versioning have no `version` field
/// and are read as version 1.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default = "legacy_version")]
    version: u32,
    #[serde(default)]
    tracked_ids: BTreeSet<VehicleId>,
    #[serde(default)]
    id_timestamps: BTreeMap<VehicleId, f64>,
}

fn legacy_version() -> u32 {
    1
}

impl Snapshot {
    fn into_state(self, path: &Path) -> Result<VehicleIdentityState> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::UnsupportedSnapshot {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut state = VehicleIdentityState {
            tracked_ids: self.tracked_ids,
            id_timestamps: BTreeMap::new(),
        };
        for (id, seen) in self.id_timestamps {
            if seen.is_finite() && seen >= 0.0 {
                state.tracked_ids.insert(id);
                state.id_timestamps.insert(id, seen);
            } else {
                warn!(path = %path.display(), %id, seen, "ignoring invalid last-seen time");
            }
        }
        Ok(state)
    }
}

/// File-backed identity store. Failures are logged, never fatal.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, falling back to empty state when the file is
    /// missing or cannot be used.
    pub fn load(&self) -> VehicleIdentityState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    tracked = state.tracked_ids.len(),
                    "loaded vehicle ids"
                );
                state
            }
            Ok(None) => {
                info!(path = %self.path.display(), "no existing vehicle ids");
                VehicleIdentityState::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "error loading vehicle ids, starting empty");
                VehicleIdentityState::default()
            }
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn try_load(&self) -> Result<Option<VehicleIdentityState>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        snapshot.into_state(&self.path).map(Some)
    }

    /// Persist `state`, logging instead of failing.
    pub fn save(&self, state: &VehicleIdentityState) {
        match self.try_save(state) {
            Ok(()) => info!(
                path = %self.path.display(),
                tracked = state.tracked_ids.len(),
                "vehicle ids saved"
            ),
            Err(e) => warn!(path = %self.path.display(), error = %e, "error saving vehicle ids"),
        }
    }

    /// Write to a sibling temporary file, then rename it over the target.
    pub fn try_save(&self, state: &VehicleIdentityState) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            tracked_ids: state.tracked_ids.clone(),
            id_timestamps: state
                .id_timestamps
                .iter()
                .filter(|(_, seen)| seen.is_finite())
                .map(|(&id, &seen)| (id, seen))
                .collect(),
        };
        let json = serde_json::to_string(&snapshot)?;

        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("vehicle_ids.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
