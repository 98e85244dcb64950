use std::collections::BTreeMap;

use mt_core::geo::reverse_bearing;
use mt_core::{Direction, NodeId};

use crate::accel::{Accelerator, FollowInput};
use crate::handle::{TickView, FREE_DRIVING_CLEARANCE};
use crate::UNCONSTRAINED;

use super::{Contender, IntersectionPolicy, JunctionAhead};

/// Speed ceiling for crossing an unsignalised junction, m/s.
pub const INTERSECTION_SPEED: f64 = 2.7;
/// Vehicles with right of way closer than this to the stop line make
/// others wait.
pub const GIVE_WAY_DISTANCE: f64 = 10.0;
/// Stationary evaluations after which deadlock recovery kicks in.
pub const DEADLOCK_TICKS: u32 = 10;
/// Speed a vehicle released from deadlock starts with.
pub const RELEASE_SPEED: f64 = 1.5;

const STATIONARY_SPEED: f64 = 0.01;
/// Leader speed assumed when a released vehicle picks its acceleration.
const RELEASE_TARGET_SPEED: f64 = 14.0;

/// Right before left: yield to traffic approaching from the right, and to
/// oncoming traffic when turning across it.
///
/// If every approach is blocked by someone on its right, nobody moves.
/// After [`DEADLOCK_TICKS`] stationary evaluations a waiting vehicle checks
/// the junction's arrival order; only the earliest arrival still present is
/// released, so exactly one vehicle per cycle gets through.
///
/// The wait is counted per junction, so a second junction inside the
/// lookahead window does not interrupt the count at the first.
#[derive(Clone, Debug, Default)]
pub struct RightBeforeLeft {
    stationary: BTreeMap<NodeId, u32>,
}

impl RightBeforeLeft {
    /// Evaluations spent standing in front of `node`.
    #[inline]
    pub fn stationary_ticks(&self, node: NodeId) -> u32 {
        self.stationary.get(&node).copied().unwrap_or(0)
    }
}

/// Whether a vehicle turning `mine` must wait for an approach located at
/// `other` relative to its heading.
fn must_give_way(other: Direction, mine: Direction) -> bool {
    if other == Direction::Up {
        // Oncoming traffic has priority over anyone turning across it.
        return !(mine.is_rightward() || mine == Direction::Up);
    }
    other.is_rightward()
}

impl IntersectionPolicy for RightBeforeLeft {
    fn evaluate(
        &mut self,
        junction: &JunctionAhead,
        me: &Contender,
        model: &mut dyn Accelerator,
        view: &TickView<'_>,
    ) -> f64 {
        let v = me.velocity;
        let mut decel = UNCONSTRAINED;

        // Slow to crossing speed, or cap acceleration below it.
        if v >= INTERSECTION_SPEED {
            let change = model.speed_change(&FollowInput::new(
                v,
                junction.speed_limit,
                junction.distance,
                INTERSECTION_SPEED,
            ));
            let change = if v + change < INTERSECTION_SPEED { INTERSECTION_SPEED - v } else { change };
            decel = decel.min(change);
        } else {
            let change = model.speed_change(&FollowInput::new(
                v,
                INTERSECTION_SPEED,
                FREE_DRIVING_CLEARANCE,
                INTERSECTION_SPEED,
            ));
            decel = decel.min(change.min(INTERSECTION_SPEED - v));
        }

        let waited = if v < STATIONARY_SPEED {
            let count = self.stationary.entry(junction.node).or_insert(0);
            *count += 1;
            *count
        } else {
            self.stationary_ticks(junction.node)
        };

        if waited > DEADLOCK_TICKS && view.arrivals.is_front(junction.node, me.id) {
            log::debug!("{} released from deadlock at {} after {waited} ticks", me.id, junction.node);
            self.stationary.remove(&junction.node);
            let free = model.speed_change(&FollowInput::new(
                RELEASE_SPEED,
                junction.speed_limit,
                FREE_DRIVING_CLEARANCE,
                RELEASE_TARGET_SPEED,
            ));
            return (RELEASE_SPEED - v) + free;
        }

        let net = view.env.network();
        let heading = net.bearing(junction.incoming);
        let approaches = view.env.approaching(junction.node, GIVE_WAY_DISTANCE);
        for a in approaches.iter().filter(|a| a.edge != junction.incoming && a.remaining > 0.0) {
            let from = Direction::between(heading, reverse_bearing(net.bearing(a.edge)));
            if must_give_way(from, junction.direction) {
                let hold = model.speed_change(&FollowInput::new(
                    v,
                    junction.speed_limit,
                    junction.distance,
                    0.0,
                ));
                decel = decel.min(hold);
            }
        }

        if decel > 0.0 {
            self.stationary.remove(&junction.node);
        }
        decel
    }

    fn reset(&mut self) {
        self.stationary.clear();
    }
}
