//! Lane-exact lookahead for the nearest obstruction on the route.

use mt_core::VehicleId;
use mt_spatial::{ExploreResult, Route};

/// The nearest entity ahead in the vehicle's lane of travel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EntityAhead {
    pub id: VehicleId,
    /// Metres from the explorer's position to the entity's position.
    pub distance: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

/// Scan `explore` for the first entity in the lane the vehicle will use.
///
/// On the current edge that is `own_lane`; on each later edge it is the
/// route stop's desired lane.  Entities on any other lane are ignored, even
/// when they are closer.  `explore` must come from the same `route`, so
/// that entry `i` of the window is route stop `i`.
pub fn find_entity_ahead(
    explore: &ExploreResult,
    route: &Route,
    own_position: f64,
    own_lane: u8,
) -> Option<EntityAhead> {
    let mut distance = -own_position;
    for (i, edge) in explore.iter().enumerate() {
        let stop = route.get(i)?;
        let lane = if i == 0 { own_lane } else { stop.desired_lane };
        if let Some(first) = edge.lane(lane).first() {
            return Some(EntityAhead {
                id: first.id,
                distance: distance + first.position,
                velocity: first.velocity,
                acceleration: first.acceleration,
            });
        }
        distance += stop.length;
    }
    None
}
