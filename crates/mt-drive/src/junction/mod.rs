//! Right-of-way arbitration at unsignalised junctions.
//!
//! A policy is asked once per junction ahead (within
//! [`ARBITRATION_DISTANCE`]) and answers with a candidate speed change that
//! the steering handle min-merges with its other constraints.  Policies
//! never fail: a vehicle that must wait gets a braking value, and deadlock
//! is resolved inside the policy.
//!
//! Arrival order is shared through the [`ArrivalRegistry`], which the
//! simulation reconciles once per tick before any vehicle decides.

mod fifo;
mod registry;
mod right_before_left;

pub use fifo::Fifo;
pub use registry::{ArrivalRegistry, APPROACH_WINDOW};
pub use right_before_left::{
    RightBeforeLeft, DEADLOCK_TICKS, GIVE_WAY_DISTANCE, INTERSECTION_SPEED, RELEASE_SPEED,
};

use mt_core::{Direction, EdgeId, NodeId, VehicleId};
use mt_spatial::SignalPhase;

use crate::accel::Accelerator;
use crate::handle::TickView;
use crate::vehicle::TrafficCode;

/// Junctions closer than this are subject to turning and right-of-way rules.
pub const ARBITRATION_DISTANCE: f64 = 50.0;

/// A junction in the exploration window.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JunctionAhead {
    pub node: NodeId,
    /// The route edge ending at the junction.
    pub incoming: EdgeId,
    /// The route edge leaving it.
    pub outgoing: EdgeId,
    /// The turn the vehicle will make.
    pub direction: Direction,
    /// Metres to the stop line.
    pub distance: f64,
    pub signal: SignalPhase,
    /// Speed limit on the incoming edge.
    pub speed_limit: f64,
    /// Number of edges entering the junction.
    pub incoming_edges: usize,
}

/// The vehicle asking for right of way.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contender {
    pub id: VehicleId,
    pub velocity: f64,
}

/// A right-of-way rule.
pub trait IntersectionPolicy {
    /// Candidate speed change for `me` at `junction`.
    fn evaluate(
        &mut self,
        junction: &JunctionAhead,
        me: &Contender,
        model: &mut dyn Accelerator,
        view: &TickView<'_>,
    ) -> f64;

    /// Forget per-approach state, e.g. after a route change.
    fn reset(&mut self) {}
}

/// The policies a steering handle can carry.
#[derive(Clone, Debug)]
pub enum RightOfWay {
    Fifo(Fifo),
    RightBeforeLeft(RightBeforeLeft),
}

impl RightOfWay {
    pub fn for_code(code: TrafficCode) -> RightOfWay {
        match code {
            TrafficCode::Fifo => RightOfWay::Fifo(Fifo),
            TrafficCode::RightBeforeLeft => RightOfWay::RightBeforeLeft(RightBeforeLeft::default()),
        }
    }
}

impl Default for RightOfWay {
    fn default() -> Self {
        RightOfWay::for_code(TrafficCode::default())
    }
}

impl IntersectionPolicy for RightOfWay {
    fn evaluate(
        &mut self,
        junction: &JunctionAhead,
        me: &Contender,
        model: &mut dyn Accelerator,
        view: &TickView<'_>,
    ) -> f64 {
        match self {
            RightOfWay::Fifo(p) => p.evaluate(junction, me, model, view),
            RightOfWay::RightBeforeLeft(p) => p.evaluate(junction, me, model, view),
        }
    }

    fn reset(&mut self) {
        match self {
            RightOfWay::Fifo(p) => p.reset(),
            RightOfWay::RightBeforeLeft(p) => p.reset(),
        }
    }
}
