//! `mt-sim` — deterministic tick loop for the rust_mt traffic engine.
//!
//! # Four-phase tick loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① Prepare    — vehicles that have not started are inserted on the first
//!                  edge of their route (ascending VehicleId).
//!   ② Reconcile  — the per-junction arrival order is rebuilt from the
//!                  environment; ties go to the lower VehicleId.
//!   ③ Decide     — every SteeringHandle computes its driving distance
//!                  against the frozen environment (parallel with the
//!                  `parallel` feature).
//!   ④ Apply      — distances are committed in ascending VehicleId order;
//!                  vehicles reaching their goal are reported (and detached).
//! ```
//!
//! Because the shared environment is only written in phases ① and ④, a run
//! is bit-for-bit reproducible for a given seed, with or without `parallel`.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs the decision phase on Rayon's thread pool.        |
//! | `fx-hash`  | FxHashMap for the environment's entity index.          |
//! | `serde`    | Serde derives on the data types of all crates.         |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use mt_core::SimConfig;
//! use mt_sim::{NoopObserver, SimBuilder};
//!
//! let mut sim = SimBuilder::new(config, network).fleet(handles).build()?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod error;
pub mod observer;
pub mod sim;


pub use builder::SimBuilder;
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver};
pub use sim::Sim;
