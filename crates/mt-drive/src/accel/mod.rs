//! Car-following acceleration models.
//!
//! A model answers one question: given my speed, the gap to whatever is
//! ahead, and that thing's speed, how much should my speed change this
//! tick?  Negative answers are braking.  The steering handle asks the same
//! question for real leaders, virtual stopped leaders at stop lines, and
//! "free road" (a leader 1000 m away at the speed limit).

mod idm;
mod wiedemann;

pub use idm::Idm;
pub use wiedemann::{Wiedemann, WiedemannParams};

use crate::DriveResult;
use crate::vehicle::{DriverProfile, VehicleSpec};
use mt_core::{DriverRng, VehicleKind};

/// Inputs to one speed-change evaluation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FollowInput {
    pub speed: f64,
    /// Desired top speed on this stretch.
    pub max_speed: f64,
    /// Metres to the leader (or stop line).
    pub gap: f64,
    pub leader_speed: f64,
    pub leader_acceleration: f64,
    /// The follower's own acceleration during the last tick.
    pub own_acceleration: f64,
}

impl FollowInput {
    /// Leader with unknown acceleration, follower at steady speed.
    pub fn new(speed: f64, max_speed: f64, gap: f64, leader_speed: f64) -> Self {
        Self { speed, max_speed, gap, leader_speed, leader_acceleration: 0.0, own_acceleration: 0.0 }
    }

    pub fn with_accelerations(mut self, leader: f64, own: f64) -> Self {
        self.leader_acceleration = leader;
        self.own_acceleration = own;
        self
    }
}

/// A car-following model.
///
/// Takes `&mut self` because stochastic models draw from a per-driver RNG.
pub trait Accelerator {
    fn speed_change(&mut self, input: &FollowInput) -> f64;
}

/// The models available to a steering handle.
#[derive(Clone, Debug)]
pub enum AccelerationModel {
    Idm(Idm),
    Wiedemann(Wiedemann),
}

impl AccelerationModel {
    /// Default model for a vehicle kind: Wiedemann for bicycles, IDM for
    /// everything else.
    ///
    /// Bicycles need a rider profile; a missing or physically impossible
    /// rider is a configuration error.
    pub fn for_driver(
        kind: VehicleKind,
        spec: &VehicleSpec,
        driver: &DriverProfile,
        mut rng: DriverRng,
    ) -> DriveResult<AccelerationModel> {
        match kind {
            VehicleKind::Bicycle => {
                let rider = driver.rider.unwrap_or_default();
                let params = WiedemannParams::sample(driver.driver_type, &mut rng);
                Ok(AccelerationModel::Wiedemann(Wiedemann::new(params, rider, rng)?))
            }
            _ => Ok(AccelerationModel::Idm(Idm::with_max_acceleration(spec.max_acceleration))),
        }
    }
}

impl Accelerator for AccelerationModel {
    #[inline]
    fn speed_change(&mut self, input: &FollowInput) -> f64 {
        match self {
            AccelerationModel::Idm(m) => m.speed_change(input),
            AccelerationModel::Wiedemann(m) => m.speed_change(input),
        }
    }
}

impl From<Idm> for AccelerationModel {
    fn from(m: Idm) -> Self {
        AccelerationModel::Idm(m)
    }
}

impl From<Wiedemann> for AccelerationModel {
    fn from(m: Wiedemann) -> Self {
        AccelerationModel::Wiedemann(m)
    }
}
