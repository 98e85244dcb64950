//! Vehicle and driver data model.

use std::str::FromStr;

use mt_core::{Direction, DriverRng, VehicleId, VehicleKind};
use mt_spatial::{Placement, SpatialEnvironment};

use crate::DriveError;

// ── Turning speeds ────────────────────────────────────────────────────────────

/// Speed ceilings (m/s) for taking a turn at a junction.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurningSpeeds {
    pub u_turn: f64,
    pub sharp: f64,
    pub regular: f64,
    pub wide: f64,
}

impl TurningSpeeds {
    pub const MOTOR: TurningSpeeds = TurningSpeeds { u_turn: 1.38, sharp: 2.7, regular: 4.1, wide: 5.5 };
    pub const BICYCLE: TurningSpeeds = TurningSpeeds { u_turn: 1.389, sharp: 1.667, regular: 3.33, wide: 5.0 };

    /// Ceiling for a turn in `direction`; `0.0` means none (straight on).
    pub fn for_direction(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Up => 0.0,
            Direction::UpRight | Direction::UpLeft => self.wide,
            Direction::Right | Direction::Left => self.regular,
            Direction::DownRight | Direction::DownLeft => self.sharp,
            Direction::Down => self.u_turn,
        }
    }
}

// ── VehicleSpec ───────────────────────────────────────────────────────────────

/// Static physical description of a vehicle.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleSpec {
    pub length: f64,
    /// Kilograms.
    pub mass: f64,
    /// m/s.
    pub max_speed: f64,
    pub max_acceleration: f64,
    /// Positive magnitude of the strongest comfortable braking.
    pub max_deceleration: f64,
    /// Lookahead is `max(MIN_EXPLORE_DISTANCE, factor * velocity)`.
    pub explore_factor: f64,
    /// Speed limit on edges without a posted one.
    pub standard_speed_limit: f64,
    pub turning: TurningSpeeds,
}

/// 50 km/h.
const URBAN_LIMIT: f64 = 50.0 / 3.6;
const WATER_RAIL_LIMIT: f64 = 6.172_222_2;

impl VehicleSpec {
    /// Stock parameters for each vehicle kind.
    pub fn for_kind(kind: VehicleKind) -> VehicleSpec {
        let base = VehicleSpec {
            length: 4.5,
            mass: 1_300.0,
            max_speed: 36.1,
            max_acceleration: 0.73,
            max_deceleration: 7.0,
            explore_factor: 6.0,
            standard_speed_limit: URBAN_LIMIT,
            turning: TurningSpeeds::MOTOR,
        };
        match kind {
            VehicleKind::Car => base,
            VehicleKind::Bicycle => VehicleSpec {
                length: 1.8,
                mass: 85.0,
                max_speed: 4.167,
                max_acceleration: 1.0,
                turning: TurningSpeeds::BICYCLE,
                ..base
            },
            VehicleKind::Bus => VehicleSpec {
                length: 12.0,
                mass: 11_000.0,
                max_speed: 16.7,
                max_deceleration: 5.0,
                ..base
            },
            VehicleKind::Train => VehicleSpec {
                length: 60.0,
                mass: 45_000.0,
                max_speed: 22.2,
                max_deceleration: 5.0,
                standard_speed_limit: WATER_RAIL_LIMIT,
                ..base
            },
            VehicleKind::Ferry => VehicleSpec {
                length: 30.0,
                mass: 90_000.0,
                max_speed: 8.0,
                max_acceleration: 0.5,
                max_deceleration: 3.0,
                standard_speed_limit: WATER_RAIL_LIMIT,
                ..base
            },
        }
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

/// Mutable kinematic state of one vehicle.
///
/// The authoritative placement lives in the [`SpatialEnvironment`]; the
/// copy here is refreshed after every committed move.
#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: VehicleId,
    pub kind: VehicleKind,
    pub spec: VehicleSpec,
    /// Metres per tick, never negative.
    pub velocity: f64,
    /// Change of velocity during the last tick.
    pub acceleration: f64,
    pub placement: Option<Placement>,
    /// Whether the vehicle takes part in car-following and arbitration.
    pub colliding: bool,
    bearing: Option<f64>,
}

impl Vehicle {
    pub fn new(id: VehicleId, kind: VehicleKind) -> Self {
        Self::with_spec(id, kind, VehicleSpec::for_kind(kind))
    }

    pub fn with_spec(id: VehicleId, kind: VehicleKind, spec: VehicleSpec) -> Self {
        Self {
            id,
            kind,
            spec,
            velocity: 0.0,
            acceleration: 0.0,
            placement: None,
            colliding: true,
            bearing: None,
        }
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.placement.is_some()
    }

    /// Mark the cached bearing stale after a move.
    #[inline]
    pub(crate) fn invalidate_bearing(&mut self) {
        self.bearing = None;
    }

    /// Heading of the edge the vehicle is on, computed on first read after
    /// a move.  `None` while unattached.
    pub fn bearing(&mut self, env: &SpatialEnvironment) -> Option<f64> {
        if self.bearing.is_none() {
            self.bearing = self.placement.map(|p| env.network().bearing(p.edge));
        }
        self.bearing
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriverType {
    Aggressive,
    #[default]
    Normal,
    Defensive,
}

/// Right-of-way convention the driver follows at unsignalised junctions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrafficCode {
    #[default]
    RightBeforeLeft,
    /// First come, first served (four-way stops).
    Fifo,
}

impl FromStr for TrafficCode {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "german" | "right-before-left" | "" => Ok(TrafficCode::RightBeforeLeft),
            "south-african" | "fifo" => Ok(TrafficCode::Fifo),
            other => Err(DriveError::Config(format!("unknown traffic code {other:?}"))),
        }
    }
}

/// Physical capability of a rider powering the vehicle.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiderProfile {
    /// Sustained pedalling power, watts.
    pub power_w: f64,
    /// Rider plus vehicle, kilograms.
    pub mass_kg: f64,
    /// Road gradient in percent; only climbs slow the rider.
    pub gradient_pct: f64,
}

impl Default for RiderProfile {
    fn default() -> Self {
        Self { power_w: 100.0, mass_kg: 85.0, gradient_pct: 0.0 }
    }
}

/// What the driver brings to the vehicle.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverProfile {
    pub driver_type: DriverType,
    /// Read by an external lane-change layer.
    pub overtaking_allowed: bool,
    /// When set, the driver brakes to a stop as if facing an obstacle at
    /// its braking distance.
    pub braking_activated: bool,
    pub traffic_code: TrafficCode,
    pub rider: Option<RiderProfile>,
}

impl DriverProfile {
    pub fn new(driver_type: DriverType) -> Self {
        Self { driver_type, ..Self::default() }
    }

    pub fn with_rider(mut self, rider: RiderProfile) -> Self {
        self.rider = Some(rider);
        self
    }

    pub fn with_traffic_code(mut self, code: TrafficCode) -> Self {
        self.traffic_code = code;
        self
    }

    /// Draw the overtaking disposition from the driver type.
    pub fn sample_overtaking(&mut self, rng: &mut DriverRng) {
        let likeliness: f64 = match self.driver_type {
            DriverType::Aggressive => rng.gen_range(40.0..100.0),
            DriverType::Normal => rng.gen_range(0.0..100.0),
            DriverType::Defensive => rng.gen_range(0.0..60.0),
        };
        self.overtaking_allowed = likeliness >= 50.0;
    }
}
