use crate::round_to;

use super::{Accelerator, FollowInput};

/// Intelligent Driver Model.
///
/// Intermediate terms and the result are rounded to three decimals so that
/// repeated evaluation settles on exact fixed points (a car cruising at its
/// top speed gets exactly `0.0`).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Idm {
    /// Desired time headway T, seconds.
    pub time_headway: f64,
    /// Maximum acceleration a.
    pub max_acceleration: f64,
    /// Comfortable deceleration b (positive).
    pub comfortable_deceleration: f64,
    /// Jam distance s0, metres.
    pub jam_distance: f64,
    /// Speed-dependent jam distance s1.
    pub jam_distance_s1: f64,
    /// Acceleration exponent δ.
    pub delta: i32,
}

impl Default for Idm {
    fn default() -> Self {
        Self {
            time_headway: 1.6,
            max_acceleration: 0.73,
            comfortable_deceleration: 1.67,
            jam_distance: 2.0,
            jam_distance_s1: 0.0,
            delta: 4,
        }
    }
}

impl Idm {
    pub fn with_max_acceleration(max_acceleration: f64) -> Self {
        Self { max_acceleration, ..Self::default() }
    }

    /// Desired dynamic gap s*.
    pub fn desired_gap(&self, speed: f64, max_speed: f64, leader_speed: f64) -> f64 {
        let speed_diff = round_to((leader_speed - speed).abs(), 3);
        let braking = 2.0 * (self.max_acceleration * self.comfortable_deceleration).sqrt();
        round_to(
            self.jam_distance
                + self.jam_distance_s1 * (speed / max_speed).sqrt()
                + self.time_headway * speed
                + speed * speed_diff / braking,
            3,
        )
    }
}

impl Accelerator for Idm {
    fn speed_change(&mut self, input: &FollowInput) -> f64 {
        let v = input.speed;
        // Already at (or past) the obstacle, or nowhere to go: stop.
        if input.gap <= 0.0 || input.max_speed <= 0.0 {
            return -v;
        }
        let desired = self.desired_gap(v, input.max_speed, input.leader_speed);
        let free = (v / input.max_speed).powi(self.delta);
        let interaction = (desired / input.gap).powi(2);
        round_to(self.max_acceleration * (1.0 - free - interaction), 3)
    }
}
