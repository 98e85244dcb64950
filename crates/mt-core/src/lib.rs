//! `mt-core` — foundational types for the `rust_mt` traffic engine.
//!
//! Every other `mt-*` crate depends on this one.  It has no `mt-*`
//! dependencies of its own.
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `VehicleId`, `NodeId`, `EdgeId`                       |
//! | [`geo`]         | `GeoPoint`, haversine distance, bearings, `Direction` |
//! | [`time`]        | `Tick`, `SimClock`, `SimConfig`                       |
//! | [`rng`]         | `DriverRng` (per-driver), `SimRng` (global)           |
//! | [`kind`]        | `VehicleKind` enum                                    |
//! | [`error`]       | `MtError`, `MtResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public data types.   |

pub mod error;
pub mod geo;
pub mod ids;
pub mod kind;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{MtError, MtResult};
pub use geo::{Direction, GeoPoint};
pub use ids::{EdgeId, NodeId, VehicleId};
pub use kind::VehicleKind;
pub use rng::{DriverRng, SimRng};
pub use time::{SimClock, SimConfig, Tick};
