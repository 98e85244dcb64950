use crate::accel::{Accelerator, FollowInput};
use crate::handle::TickView;
use crate::UNCONSTRAINED;

use super::{Contender, IntersectionPolicy, JunctionAhead};

/// First come, first served.
///
/// The front of the junction's arrival order may go.  Everyone else brakes
/// toward a virtual stopped vehicle at the stop line; inside the approach
/// window that braking is never allowed to turn into acceleration, so
/// waiting vehicles stay put until their turn.
#[derive(Copy, Clone, Debug, Default)]
pub struct Fifo;

impl IntersectionPolicy for Fifo {
    fn evaluate(
        &mut self,
        junction: &JunctionAhead,
        me: &Contender,
        model: &mut dyn Accelerator,
        view: &TickView<'_>,
    ) -> f64 {
        let order = view.arrivals.order(junction.node);
        let place = order.iter().position(|&id| id == me.id);
        if place == Some(0) {
            return UNCONSTRAINED;
        }
        let hold = model.speed_change(&FollowInput::new(
            me.velocity,
            junction.speed_limit,
            junction.distance,
            0.0,
        ));
        match place {
            Some(_) => hold.min(0.0),
            // Still outside the window: roll up to the stop line.
            None => hold,
        }
    }
}
