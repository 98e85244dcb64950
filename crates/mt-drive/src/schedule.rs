//! Strategies for vehicles that run to a timetable.
//!
//! A steering handle can carry one [`StationBraking`] strategy (extra
//! braking toward a stop) and one [`DistancePacing`] strategy (replacing
//! free driving with a distance that keeps the vehicle on schedule).  Both
//! are optional; cars and bicycles carry neither.

use std::fmt::Debug;

use mt_core::Tick;
use mt_spatial::Route;

/// Timing of the current section between two stops.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledSection {
    /// Tick the vehicle started boarding at the departure stop.
    pub boarding_since: Tick,
    /// Minimum ticks spent boarding, regardless of the timetable.
    pub min_dwell_ticks: u64,
    /// Timetabled departure from this stop.
    pub departure: Tick,
    /// Timetabled arrival at the next stop.
    pub arrival: Tick,
}

impl ScheduledSection {
    /// Boarding ends once the minimum dwell has passed **and** the
    /// departure tick has been reached.
    pub fn boarding_complete(&self, now: Tick) -> bool {
        now.since(self.boarding_since) > self.min_dwell_ticks && now >= self.departure
    }
}

/// Extra braking toward a scheduled stop.
pub trait StationBraking: Send + Sync + Debug {
    /// Distance to a stop line the vehicle must halt at, if one is near.
    fn stop_ahead(&self, route: &Route) -> Option<f64>;
}

/// Brake for the end of the route once it is closer than `within` metres.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScheduledStopBraking {
    pub within: f64,
}

impl Default for ScheduledStopBraking {
    fn default() -> Self {
        Self { within: 50.0 }
    }
}

impl StationBraking for ScheduledStopBraking {
    fn stop_ahead(&self, route: &Route) -> Option<f64> {
        let remaining = route.remaining_distance_to_goal();
        (remaining < self.within).then_some(remaining)
    }
}

/// Replacement for free driving.
pub trait DistancePacing: Send + Sync + Debug {
    /// Metres to drive this tick, or `None` to drive freely.  The handle
    /// clamps the answer to `[0, max_speed]` and to the remaining route.
    fn driving_distance(&self, route: &Route, section: Option<&ScheduledSection>, now: Tick) -> Option<f64>;
}

/// Spread the remaining distance evenly over the ticks left until the
/// section's timetabled arrival.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TimetablePacing;

impl DistancePacing for TimetablePacing {
    fn driving_distance(&self, route: &Route, section: Option<&ScheduledSection>, now: Tick) -> Option<f64> {
        let section = section?;
        let ticks_left = section.arrival.since(now).max(1);
        Some(route.remaining_distance_to_goal() / ticks_left as f64)
    }
}
