//! The steering handle: one vehicle's per-tick driving decision.
//!
//! A tick is split into a read-only [`SteeringHandle::decide`] and a
//! mutating [`SteeringHandle::apply`], so the simulation can run all
//! decisions against one frozen environment and commit the moves
//! afterwards in a fixed order.

use mt_core::{Direction, DriverRng, EdgeId, GeoPoint, Tick};
use mt_spatial::{
    EdgeExplore, Placement, RoadNetwork, Route, SignalPhase, SpatialEnvironment, SpatialError,
};

use crate::accel::{AccelerationModel, Accelerator, FollowInput};
use crate::finder::find_entity_ahead;
use crate::junction::{
    ArrivalRegistry, Contender, IntersectionPolicy, JunctionAhead, RightOfWay, ARBITRATION_DISTANCE,
};
use crate::schedule::{DistancePacing, ScheduledSection, StationBraking};
use crate::vehicle::{DriverProfile, Vehicle, VehicleSpec};
use crate::{round_to, DriveError, DriveResult, UNCONSTRAINED};

/// Gap used to ask a model about an empty road.
pub const FREE_DRIVING_CLEARANCE: f64 = 1000.0;
/// Lower bound of the lookahead distance.
pub const MIN_EXPLORE_DISTANCE: f64 = 30.0;
/// Junctions are ignored while more than this is left on the current edge.
pub const INTERSECTION_AHEAD_CLEARANCE: f64 = 150.0;
/// Closer than this to the goal, the vehicle drives the rest in one go.
pub const GOAL_SNAP_DISTANCE: f64 = 3.0;

/// Read-only state shared by all decisions of one tick.
#[derive(Copy, Clone)]
pub struct TickView<'a> {
    pub now: Tick,
    pub env: &'a SpatialEnvironment,
    pub arrivals: &'a ArrivalRegistry,
}

impl<'a> TickView<'a> {
    pub fn new(now: Tick, env: &'a SpatialEnvironment, arrivals: &'a ArrivalRegistry) -> Self {
        Self { now, env, arrivals }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveState {
    /// Not yet placed in the environment.
    #[default]
    NotStarted,
    Driving,
    /// Waiting at a stop for the section's departure.
    Boarding,
    GoalReached,
}

/// Drives one vehicle along its route.
#[derive(Debug)]
pub struct SteeringHandle {
    vehicle: Vehicle,
    driver: DriverProfile,
    route: Option<Route>,
    state: DriveState,
    accelerator: AccelerationModel,
    right_of_way: RightOfWay,
    station_braking: Option<Box<dyn StationBraking>>,
    pacing: Option<Box<dyn DistancePacing>>,
    section: Option<ScheduledSection>,
}

impl SteeringHandle {
    /// Handle with the default model for the vehicle kind and the policy
    /// for the driver's traffic code.
    pub fn new(vehicle: Vehicle, driver: DriverProfile, rng: DriverRng) -> DriveResult<Self> {
        let accelerator = AccelerationModel::for_driver(vehicle.kind, &vehicle.spec, &driver, rng)?;
        let right_of_way = RightOfWay::for_code(driver.traffic_code);
        Ok(Self {
            vehicle,
            driver,
            route: None,
            state: DriveState::NotStarted,
            accelerator,
            right_of_way,
            station_braking: None,
            pacing: None,
            section: None,
        })
    }

    /// Route for a vehicle that has not been placed yet.
    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_accelerator(mut self, model: impl Into<AccelerationModel>) -> Self {
        self.accelerator = model.into();
        self
    }

    pub fn with_right_of_way(mut self, policy: RightOfWay) -> Self {
        self.right_of_way = policy;
        self
    }

    pub fn with_station_braking(mut self, strategy: impl StationBraking + 'static) -> Self {
        self.station_braking = Some(Box::new(strategy));
        self
    }

    pub fn with_pacing(mut self, strategy: impl DistancePacing + 'static) -> Self {
        self.pacing = Some(Box::new(strategy));
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    #[inline]
    pub fn driver(&self) -> &DriverProfile {
        &self.driver
    }

    /// The driver profile is mutated from outside, e.g. to activate braking.
    #[inline]
    pub fn driver_mut(&mut self) -> &mut DriverProfile {
        &mut self.driver
    }

    #[inline]
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    #[inline]
    pub fn state(&self) -> DriveState {
        self.state
    }

    #[inline]
    pub fn section(&self) -> Option<&ScheduledSection> {
        self.section.as_ref()
    }

    #[inline]
    pub fn right_of_way(&self) -> &RightOfWay {
        &self.right_of_way
    }

    pub fn goal_reached(&self) -> bool {
        self.state == DriveState::GoalReached
    }

    pub fn bearing(&mut self, env: &SpatialEnvironment) -> Option<f64> {
        self.vehicle.bearing(env)
    }

    /// Interpolated geographic position, `None` while unattached.
    pub fn position(&self, env: &SpatialEnvironment) -> Option<GeoPoint> {
        env.position_of(self.vehicle.id)
    }

    // ── Route and schedule control ───────────────────────────────────────

    /// Replace the route.
    ///
    /// If the vehicle is on the new route's first edge it continues from its
    /// position (a vehicle placed by the caller is adopted this way);
    /// otherwise it is taken off the network and re-inserted at
    /// the start of the new route on the next tick.  Arbitration state is
    /// reset either way.
    pub fn set_route(&mut self, env: &mut SpatialEnvironment, mut route: Route) -> DriveResult<()> {
        let id = self.vehicle.id;
        let first = route.current().map(|s| s.edge);
        match env.placement(id) {
            Some(p) if Some(p.edge) == first => {
                route.align_to(p.position);
                self.vehicle.placement = Some(p);
                if matches!(self.state, DriveState::NotStarted | DriveState::GoalReached) {
                    self.state = DriveState::Driving;
                }
            }
            Some(_) => {
                env.remove(id)?;
                self.reset_kinematics();
                self.state = DriveState::NotStarted;
            }
            None => self.state = DriveState::NotStarted,
        }
        self.right_of_way.reset();
        log::debug!("{id} got a new route over {} edges ({:.1} m)", route.len(), route.remaining_distance_to_goal());
        self.route = Some(route);
        Ok(())
    }

    /// Start the next timetabled section.  A placed vehicle boards until
    /// the section's gate opens.
    pub fn begin_section(&mut self, section: ScheduledSection) {
        self.section = Some(section);
        if matches!(self.state, DriveState::Driving | DriveState::GoalReached) {
            self.state = DriveState::Boarding;
        }
    }

    // ── Tick ──────────────────────────────────────────────────────────────

    /// Put a not-started vehicle on the first edge of its route.
    pub fn prepare(&mut self, env: &mut SpatialEnvironment) -> DriveResult<()> {
        if self.state != DriveState::NotStarted {
            return Ok(());
        }
        let Some(stop) = self.route.as_ref().and_then(Route::current).copied() else {
            return Ok(());
        };
        let lanes = env.network().lanes(stop.edge);
        let placement = Placement {
            edge: stop.edge,
            position: 0.0,
            lane: stop.desired_lane.min(lanes.saturating_sub(1)),
        };
        env.insert(self.vehicle.id, placement, self.vehicle.spec.length, self.vehicle.colliding)?;
        self.vehicle.placement = Some(placement);
        self.vehicle.invalidate_bearing();
        self.state = if self.section.is_some() { DriveState::Boarding } else { DriveState::Driving };
        log::trace!("{} placed on {} lane {}", self.vehicle.id, placement.edge, placement.lane);
        Ok(())
    }

    /// How far to drive this tick, or `None` if the vehicle stays put.
    ///
    /// Only reads the environment; mutates nothing but this handle's own
    /// model and policy state.
    pub fn decide(&mut self, view: &TickView<'_>) -> DriveResult<Option<f64>> {
        match self.state {
            DriveState::NotStarted | DriveState::GoalReached => return Ok(None),
            DriveState::Boarding => {
                if !self.section.is_none_or(|s| s.boarding_complete(view.now)) {
                    return Ok(None);
                }
                log::debug!("{} departs at {:?}", self.vehicle.id, view.now);
                self.state = DriveState::Driving;
            }
            DriveState::Driving => {}
        }

        let Self { vehicle, driver, route, accelerator, right_of_way, station_braking, pacing, section, .. } =
            self;
        let id = vehicle.id;
        let route = route.as_ref().ok_or(DriveError::MissingRoute(id))?;
        if route.goal_reached() {
            return Ok(None);
        }
        let here = view.env.placement(id).ok_or(SpatialError::EntityNotFound(id))?;
        let net = view.env.network();
        let spec = &vehicle.spec;
        let v = vehicle.velocity;
        let speed_limit = speed_limit(net, spec, here.edge);
        let max_speed = speed_limit.min(spec.max_speed);

        let explore = view.env.explore(id, route, MIN_EXPLORE_DISTANCE.max(spec.explore_factor * v))?;
        let mut decel = UNCONSTRAINED;

        if driver.braking_activated {
            let kmh = v * 3.6 / 10.0;
            decel = accelerator.speed_change(&FollowInput::new(v, max_speed, kmh * kmh * 2.0, 0.0));
        }

        if route.remaining_on_current() <= INTERSECTION_AHEAD_CLEARANCE {
            for pair in explore.edges.windows(2) {
                let [incoming, outgoing] = pair else { continue };
                if incoming.intersection_distance >= ARBITRATION_DISTANCE {
                    break;
                }
                let junction = junction_ahead(net, spec, incoming, outgoing);
                let turning = turning_constraint(accelerator, spec, &junction, v, max_speed);
                decel = decel.min(turning);

                match junction.signal {
                    SignalPhase::None if junction.incoming_edges > 1 => {
                        let me = Contender { id, velocity: v };
                        decel = decel.min(right_of_way.evaluate(&junction, &me, &mut *accelerator, view));
                    }
                    SignalPhase::None | SignalPhase::Green => {}
                    SignalPhase::Yellow => {
                        let stop = accelerator.speed_change(&FollowInput::new(v, max_speed, junction.distance, 0.0));
                        if -stop <= spec.max_deceleration {
                            decel = decel.min(stop);
                        }
                    }
                    SignalPhase::Red => {
                        let stop = accelerator.speed_change(&FollowInput::new(v, max_speed, junction.distance, 0.0));
                        decel = decel.min(stop);
                    }
                }
            }
        }

        if let Some(stop) = station_braking.as_ref().and_then(|s| s.stop_ahead(route)) {
            decel = decel.min(accelerator.speed_change(&FollowInput::new(v, max_speed, stop, 0.0)));
        }

        if vehicle.colliding {
            if let Some(ahead) = find_entity_ahead(&explore, route, here.position, here.lane) {
                let input = FollowInput::new(v, max_speed, ahead.distance, ahead.velocity)
                    .with_accelerations(ahead.acceleration, vehicle.acceleration);
                decel = decel.min(accelerator.speed_change(&input));
            }
        }

        let remaining = route.remaining_distance_to_goal();
        let paced = || pacing.as_ref().and_then(|p| p.driving_distance(route, section.as_ref(), view.now));
        let distance = if remaining < GOAL_SNAP_DISTANCE {
            remaining
        } else if decel < UNCONSTRAINED {
            (v + decel).max(0.0)
        } else if let Some(d) = paced() {
            d.min(max_speed).max(0.0).min(remaining)
        } else {
            let free = accelerator.speed_change(&FollowInput::new(v, max_speed, FREE_DRIVING_CLEARANCE, speed_limit));
            (v + free).max(0.0)
        };
        log::trace!("{id} v={v:.2} decel={decel:.3} -> {distance:.2} m");
        Ok(Some(distance))
    }

    /// Commit a decided distance to the environment.
    ///
    /// A refused move means the vehicle and environment disagree about
    /// where it is; that is reported as [`DriveError::MoveRejected`].
    pub fn apply(&mut self, env: &mut SpatialEnvironment, distance: f64) -> DriveResult<()> {
        let id = self.vehicle.id;
        let route = self.route.as_mut().ok_or(DriveError::MissingRoute(id))?;
        let old = self.vehicle.velocity;
        let mut velocity = 0.0;
        if distance > 0.0 {
            let outcome = env.move_along(id, route, distance).map_err(|source| {
                log::warn!("{id} could not move {distance:.2} m: {source}");
                DriveError::MoveRejected { vehicle: id, source }
            })?;
            self.vehicle.placement = Some(outcome.placement);
            self.vehicle.invalidate_bearing();
            velocity = round_to(outcome.moved, 2);
        }
        if route.goal_reached() {
            velocity = 0.0;
            self.state = DriveState::GoalReached;
            log::debug!("{id} reached its goal");
        }
        self.vehicle.velocity = velocity;
        self.vehicle.acceleration = round_to(velocity - old, 2);
        env.set_kinematics(id, self.vehicle.velocity, self.vehicle.acceleration)?;
        Ok(())
    }

    /// Prepare, decide and apply in one call.  Returns whether the vehicle
    /// moved.
    pub fn move_vehicle(
        &mut self,
        env: &mut SpatialEnvironment,
        arrivals: &ArrivalRegistry,
        now: Tick,
    ) -> DriveResult<bool> {
        self.prepare(env)?;
        let decision = self.decide(&TickView::new(now, env, arrivals))?;
        match decision {
            Some(distance) => {
                self.apply(env, distance)?;
                Ok(distance > 0.0)
            }
            None => Ok(false),
        }
    }

    /// Take the vehicle off the network, e.g. when its driver leaves.
    pub fn detach(&mut self, env: &mut SpatialEnvironment) -> DriveResult<()> {
        if env.placement(self.vehicle.id).is_some() {
            env.remove(self.vehicle.id)?;
        }
        self.reset_kinematics();
        Ok(())
    }

    fn reset_kinematics(&mut self) {
        self.vehicle.placement = None;
        self.vehicle.velocity = 0.0;
        self.vehicle.acceleration = 0.0;
        self.vehicle.invalidate_bearing();
    }
}

/// Posted limit of `edge`, or the vehicle kind's standard limit.
fn speed_limit(net: &RoadNetwork, spec: &VehicleSpec, edge: EdgeId) -> f64 {
    net.max_speed(edge).unwrap_or(spec.standard_speed_limit)
}

fn junction_ahead(net: &RoadNetwork, spec: &VehicleSpec, incoming: &EdgeExplore, outgoing: &EdgeExplore) -> JunctionAhead {
    let node = net.to_node(incoming.edge);
    JunctionAhead {
        node,
        incoming: incoming.edge,
        outgoing: outgoing.edge,
        direction: Direction::between(net.bearing(incoming.edge), net.bearing(outgoing.edge)),
        distance: incoming.intersection_distance,
        signal: incoming.signal,
        speed_limit: speed_limit(net, spec, incoming.edge),
        incoming_edges: net.in_degree(node),
    }
}

/// Slow down to the turning speed for the junction's direction, or cap
/// acceleration at it.
fn turning_constraint(
    model: &mut AccelerationModel,
    spec: &VehicleSpec,
    junction: &JunctionAhead,
    v: f64,
    max_speed: f64,
) -> f64 {
    let turn = spec.turning.for_direction(junction.direction);
    if turn <= 0.0 {
        return UNCONSTRAINED;
    }
    if v > turn {
        let change = model.speed_change(&FollowInput::new(v, max_speed, junction.distance, turn));
        if v + change < turn { turn - v } else { change }
    } else {
        model.speed_change(&FollowInput::new(v, turn, FREE_DRIVING_CLEARANCE, turn))
    }
}
