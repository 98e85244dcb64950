use mt_core::DriverRng;

use crate::vehicle::{DriverType, RiderProfile};
use crate::{DriveError, DriveResult};

use super::{Accelerator, FollowInput};

/// Standstill distance CC0, metres.
const CC0: f64 = 0.2;
/// Negative following threshold CC4.
const CC4: f64 = -0.25;
/// Positive following threshold CC5.
const CC5: f64 = 0.25;
/// Oscillation speed dependency CC6.
const CC6: f64 = 1.0;
const MAX_DECEL_FACTOR: f64 = -5.0;
const EFFICIENCY: f64 = 0.95;
/// Mean of the per-evaluation max-acceleration factor.
const MAX_ACCELERATION_FACTOR: f64 = 3.0;
const MAX_ACCELERATION_SPREAD: f64 = 0.3;
const G: f64 = 9.81;

/// Driver-specific Wiedemann thresholds.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WiedemannParams {
    /// CC1, seconds.
    pub headway_time: f64,
    /// CC2, metres.
    pub following_variation: f64,
    /// CC3.
    pub entering_threshold: f64,
    /// CC7, m/s².
    pub oscillation_acceleration: f64,
    /// Undershoot correction used when closing in on a slower leader.
    pub driver_rand: f64,
}

impl Default for WiedemannParams {
    fn default() -> Self {
        Self {
            headway_time: 1.5,
            following_variation: 2.0,
            entering_threshold: -20.0,
            oscillation_acceleration: 0.2,
            driver_rand: 0.5,
        }
    }
}

impl WiedemannParams {
    /// Draw thresholds for a driver type.  Normal drivers get the defaults;
    /// aggressive ones follow closer and oscillate harder, defensive ones
    /// the reverse.
    pub fn sample(driver_type: DriverType, rng: &mut DriverRng) -> Self {
        let d = Self::default();
        let third = 1.0 / 3.0;
        match driver_type {
            DriverType::Normal => d,
            DriverType::Aggressive => Self {
                headway_time: rng.gen_range(d.headway_time / 2.0..d.headway_time),
                following_variation: rng.gen_range(d.following_variation / 2.0..d.following_variation),
                entering_threshold: rng.gen_range(d.entering_threshold..d.entering_threshold / 2.0),
                oscillation_acceleration: rng
                    .gen_range(d.oscillation_acceleration..d.oscillation_acceleration * 1.5),
                driver_rand: rng.gen_range(2.0 * third..1.0),
            },
            DriverType::Defensive => Self {
                headway_time: rng.gen_range(d.headway_time..d.headway_time * 1.5),
                following_variation: rng.gen_range(d.following_variation..d.following_variation * 1.5),
                entering_threshold: rng.gen_range(d.entering_threshold * 1.5..d.entering_threshold),
                oscillation_acceleration: rng
                    .gen_range(d.oscillation_acceleration / 2.0..d.oscillation_acceleration),
                driver_rand: rng.gen_range(0.0..third),
            },
        }
    }
}

/// Wiedemann 74-style psycho-physical model with a power-limited free
/// acceleration, for human-powered vehicles.
#[derive(Clone, Debug)]
pub struct Wiedemann {
    params: WiedemannParams,
    rider: RiderProfile,
    rng: DriverRng,
}

impl Wiedemann {
    /// Fails if the rider has no mass or negative power.
    pub fn new(params: WiedemannParams, rider: RiderProfile, rng: DriverRng) -> DriveResult<Self> {
        if !rider.mass_kg.is_finite() || rider.mass_kg <= 0.0 {
            return Err(DriveError::Config(format!(
                "rider mass must be positive, got {} kg",
                rider.mass_kg
            )));
        }
        if rider.power_w.is_nan() || rider.power_w < 0.0 {
            return Err(DriveError::Config(format!(
                "rider power must not be negative, got {} W",
                rider.power_w
            )));
        }
        Ok(Self { params, rider, rng })
    }

    #[inline]
    pub fn params(&self) -> &WiedemannParams {
        &self.params
    }

    #[inline]
    pub fn rider(&self) -> &RiderProfile {
        &self.rider
    }

    /// Update the gradient of the road being ridden.
    pub fn set_gradient(&mut self, gradient_pct: f64) {
        self.rider.gradient_pct = gradient_pct;
    }

    /// Power-limited acceleration at `speed`, with a noisy efficiency factor.
    fn max_acceleration(&mut self, speed: f64, max_speed: f64) -> f64 {
        let speed = speed.abs();
        let factor = self.rng.gaussian(MAX_ACCELERATION_FACTOR, MAX_ACCELERATION_SPREAD);
        let power = self.rider.power_w * EFFICIENCY;
        let mass = self.rider.mass_kg;
        let epsilon = power / (mass * factor);
        let drag = if max_speed > 0.0 { speed * speed / max_speed.powi(3) } else { 0.0 };
        let climb = if self.rider.gradient_pct > 0.0 { G * self.rider.gradient_pct / 100.0 } else { 0.0 };
        power / mass * (1.0 / (speed + epsilon) - drag) - climb
    }
}

impl Accelerator for Wiedemann {
    fn speed_change(&mut self, input: &FollowInput) -> f64 {
        let p = self.params;
        let v = input.speed;
        let v_lead = input.leader_speed;
        let own = input.own_acceleration;

        let dx = input.gap + CC0;
        let dv = v_lead - v;
        let sdxc = if v_lead <= 0.0 { CC0 } else { CC0 + p.headway_time * v };
        let sdxo = p.following_variation + sdxc;
        let sdv = CC6 * dx * dx;
        let sdvc = if v_lead > 0.0 { CC4 - sdv } else { 0.0 };
        let sdvo = if v > CC5 { sdv + CC5 } else { sdv };

        if dx <= sdxc && dv <= sdvo {
            // Closing in below the safe distance: emergency regime.
            let mut acc = 0.0;
            if v > 0.0 && dv < 0.0 {
                acc = if dx > CC0 {
                    (input.leader_acceleration + dv * dv / (CC0 - dx)).min(own)
                } else {
                    (input.leader_acceleration + 0.5 * (dv - sdvo)).min(own)
                };
                acc = if acc > -p.oscillation_acceleration {
                    -p.oscillation_acceleration
                } else {
                    acc.max(MAX_DECEL_FACTOR + 0.5 * v.sqrt())
                };
                if v + acc < v_lead {
                    acc = dv - p.driver_rand;
                }
            }
            acc
        } else if dv < sdvc && dx < sdxo + p.entering_threshold * (dv - CC4) {
            // Approaching a slower leader.
            let acc = 0.5 * dv * dv / (sdxc - dx - 0.1);
            acc.max(MAX_DECEL_FACTOR + v.sqrt())
        } else if dv < sdvo && dx < sdxo {
            // Following: oscillate around the leader's speed.
            if own <= 0.0 {
                let acc = (if v + own < v_lead { dv } else { own }).min(-p.oscillation_acceleration);
                if v + acc < 0.0 { -v } else { acc }
            } else {
                own.max(p.oscillation_acceleration)
            }
        } else if dx > sdxc {
            // Free riding.
            let max_acc = self.max_acceleration(v, input.max_speed);
            if dx < sdxo { (dv * dv / (sdxo - dx)).min(max_acc) } else { max_acc }
        } else {
            0.0
        }
    }
}
