//! Vehicle identities that outlive a single run.

mod registry;
mod store;

pub use registry::{VehicleIdentityState, VehicleRegistry};
pub use store::{IdentityStore, SNAPSHOT_VERSION};
