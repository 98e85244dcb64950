//! `mt-drive` — the microscopic driving engine.
//!
//! Once per tick every [`SteeringHandle`] decides how far its vehicle may
//! drive by combining a car-following model, the right-of-way rules of the
//! junctions ahead, and a lane-exact lookahead for the nearest obstruction.
//! The **most restrictive** candidate always wins.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                      |
//! |--------------|---------------------------------------------------------------|
//! | [`vehicle`]  | `Vehicle`, `VehicleSpec`, `DriverProfile`, turning speeds     |
//! | [`accel`]    | `Accelerator` trait, `Idm`, `Wiedemann`, `AccelerationModel`  |
//! | [`finder`]   | `find_entity_ahead`                                           |
//! | [`junction`] | `IntersectionPolicy`, `Fifo`, `RightBeforeLeft`, `ArrivalRegistry` |
//! | [`schedule`] | station-braking and pacing strategies for scheduled vehicles  |
//! | [`handle`]   | `SteeringHandle`, `DriveState`, `TickView`                    |
//! | [`error`]    | `DriveError`, `DriveResult<T>`                                |
//!
//! # Units
//!
//! One tick is one second: velocities are metres per tick, accelerations
//! metres per tick², distances metres.

pub mod accel;
pub mod error;
pub mod finder;
pub mod handle;
pub mod junction;
pub mod schedule;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use accel::{AccelerationModel, Accelerator, FollowInput, Idm, Wiedemann, WiedemannParams};
pub use error::{DriveError, DriveResult};
pub use finder::{find_entity_ahead, EntityAhead};
pub use handle::{DriveState, SteeringHandle, TickView};
pub use junction::{
    ArrivalRegistry, Contender, Fifo, IntersectionPolicy, JunctionAhead, RightBeforeLeft, RightOfWay,
};
pub use schedule::{DistancePacing, ScheduledSection, ScheduledStopBraking, StationBraking, TimetablePacing};
pub use vehicle::{DriverProfile, DriverType, RiderProfile, TrafficCode, TurningSpeeds, Vehicle, VehicleSpec};

/// Candidate deceleration meaning "nothing constrains this vehicle".
///
/// Every constraint is min-merged against this start value; a result still
/// equal to it selects free driving.
pub const UNCONSTRAINED: f64 = 1000.0;

/// Round to `decimals` places, half to even.
#[inline]
pub(crate) fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round_ties_even() / f
}
