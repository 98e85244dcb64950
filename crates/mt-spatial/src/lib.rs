//! `mt-spatial` — road network, routes, and the shared spatial environment.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`network`]     | `RoadNetwork` (CSR in/out adjacency + R-tree), builder    |
//! | [`route`]       | `Route`, `RouteStop`                                      |
//! | [`environment`] | `SpatialEnvironment`: lane occupancy, moves, exploration  |
//! | [`error`]       | `SpatialError`, `SpatialResult<T>`                        |
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                     |
//! |-----------|------------------------------------------------------------|
//! | `serde`   | Derives `Serialize`/`Deserialize` on public data types.    |
//! | `fx-hash` | Uses `FxHashMap` for the entity index.                     |

pub mod environment;
pub mod error;
pub mod network;
pub mod route;


pub use environment::{
    Approach, EdgeExplore, EntityState, ExploreResult, MoveOutcome, Occupant, Placement,
    SignalPhase, SpatialEnvironment,
};
pub use error::{SpatialError, SpatialResult};
pub use network::{RoadNetwork, RoadNetworkBuilder};
pub use route::{Route, RouteStop};
