//! Unit tests for mt-drive.
//!
//! Scenarios are built on small hand-made networks; vehicles are placed
//! directly in the environment and adopted by a handle.

#[cfg(test)]
pub(crate) mod helpers {
    use mt_core::{DriverRng, EdgeId, GeoPoint, NodeId, VehicleId, VehicleKind};
    use mt_spatial::{Placement, RoadNetwork, RoadNetworkBuilder, Route, SpatialEnvironment};

    use crate::{DriverProfile, SteeringHandle, TrafficCode, Vehicle};

    /// One-way corridor heading north: 100 m (2 lanes, 13.9 m/s),
    /// 100 m (2 lanes), 50 m (1 lane).
    pub fn corridor() -> (RoadNetwork, [EdgeId; 3]) {
        let mut b = RoadNetworkBuilder::new();
        let n: Vec<NodeId> = (0..4).map(|i| b.add_node(GeoPoint::new(i as f32 * 0.001, 0.0))).collect();
        b.add_directed_edge(n[0], n[1], 100.0, 2, Some(13.9));
        b.add_directed_edge(n[1], n[2], 100.0, 2, None);
        b.add_directed_edge(n[2], n[3], 50.0, 1, None);
        let net = b.build();
        let e = [
            net.edge_between(n[0], n[1]).unwrap(),
            net.edge_between(n[1], n[2]).unwrap(),
            net.edge_between(n[2], n[3]).unwrap(),
        ];
        (net, e)
    }

    /// `segments` single-lane 200 m edges in a straight line, limit 10 m/s.
    pub fn long_road(segments: usize) -> (RoadNetwork, Vec<EdgeId>) {
        let mut b = RoadNetworkBuilder::new();
        let n: Vec<NodeId> =
            (0..=segments).map(|i| b.add_node(GeoPoint::new(i as f32 * 0.0018, 0.0))).collect();
        for w in n.windows(2) {
            b.add_directed_edge(w[0], w[1], 200.0, 1, Some(10.0));
        }
        let net = b.build();
        let edges = n.windows(2).map(|w| net.edge_between(w[0], w[1]).unwrap()).collect();
        (net, edges)
    }

    /// Four single-lane arms meeting at `c`.  Incoming and outgoing edges
    /// are listed as [south, east, north, west].
    pub fn crossroads() -> (RoadNetwork, NodeId, [EdgeId; 4], [EdgeId; 4]) {
        let mut b = RoadNetworkBuilder::new();
        let c = b.add_node(GeoPoint::new(0.0, 0.0));
        let s = b.add_node(GeoPoint::new(-0.001, 0.0));
        let e = b.add_node(GeoPoint::new(0.0, 0.001));
        let n = b.add_node(GeoPoint::new(0.001, 0.0));
        let w = b.add_node(GeoPoint::new(0.0, -0.001));
        for arm in [s, e, n, w] {
            b.add_directed_edge(arm, c, 100.0, 1, None);
            b.add_directed_edge(c, arm, 100.0, 1, None);
        }
        let net = b.build();
        let inn = [s, e, n, w].map(|a| net.edge_between(a, c).unwrap());
        let out = [s, e, n, w].map(|a| net.edge_between(c, a).unwrap());
        (net, c, inn, out)
    }

    /// Place a car at `position` on the first edge of `edges` and hand it to
    /// a steering handle following that route.
    pub fn place_car(
        env: &mut SpatialEnvironment,
        id: u32,
        edges: &[EdgeId],
        position: f64,
        velocity: f64,
        code: TrafficCode,
    ) -> SteeringHandle {
        place(env, id, VehicleKind::Car, edges, position, velocity, DriverProfile::default().with_traffic_code(code))
    }

    pub fn place(
        env: &mut SpatialEnvironment,
        id: u32,
        kind: VehicleKind,
        edges: &[EdgeId],
        position: f64,
        velocity: f64,
        driver: DriverProfile,
    ) -> SteeringHandle {
        let vid = VehicleId(id);
        let mut vehicle = Vehicle::new(vid, kind);
        vehicle.velocity = velocity;
        let placement = Placement { edge: edges[0], position, lane: 0 };
        env.insert(vid, placement, vehicle.spec.length, true).unwrap();
        env.set_kinematics(vid, velocity, 0.0).unwrap();
        let route = Route::from_edges(env.network(), edges).unwrap();
        let mut handle = SteeringHandle::new(vehicle, driver, DriverRng::new(42, vid)).unwrap();
        handle.set_route(env, route).unwrap();
        handle
    }
}

// ── Acceleration models ───────────────────────────────────────────────────────

#[cfg(test)]
mod accel {
    use mt_core::{DriverRng, VehicleId, VehicleKind};

    use crate::{
        AccelerationModel, Accelerator, DriveError, DriverProfile, FollowInput, Idm, RiderProfile, VehicleSpec,
        Wiedemann, WiedemannParams,
    };

    #[test]
    fn idm_free_road_uses_full_acceleration() {
        let mut idm = Idm::default();
        let change = idm.speed_change(&FollowInput::new(0.0, 13.9, 1000.0, 13.9));
        assert!((change - 0.73).abs() < 1e-9);
    }

    #[test]
    fn idm_is_monotone_in_gap() {
        let mut idm = Idm::default();
        let changes: Vec<f64> = [3.0, 5.0, 10.0, 20.0, 40.0, 80.0]
            .iter()
            .map(|&gap| idm.speed_change(&FollowInput::new(5.0, 13.9, gap, 0.0)))
            .collect();
        assert!(changes.windows(2).all(|w| w[0] <= w[1]), "{changes:?}");
        assert!(changes[0] < 0.0);
    }

    #[test]
    fn idm_strictly_decreasing_as_gap_closes_at_equal_speed() {
        let mut idm = Idm::default();
        let changes: Vec<f64> = [20.0, 15.0, 10.0, 7.0, 5.0, 3.0, 2.0]
            .iter()
            .map(|&gap| idm.speed_change(&FollowInput::new(5.0, 13.9, gap, 5.0)))
            .collect();
        assert!(changes.windows(2).all(|w| w[0] > w[1]), "{changes:?}");
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(crate::round_to(0.125, 2), 0.12);
        assert_eq!(crate::round_to(0.375, 2), 0.38);
        assert_eq!(crate::round_to(-2.5, 0), -2.0);
    }

    #[test]
    fn idm_brakes_harder_for_slower_leader() {
        let mut idm = Idm::default();
        let slow = idm.speed_change(&FollowInput::new(8.0, 13.9, 30.0, 0.0));
        let fast = idm.speed_change(&FollowInput::new(8.0, 13.9, 30.0, 8.0));
        assert!(slow < fast);
    }

    #[test]
    fn idm_degenerate_inputs_stop_the_vehicle() {
        let mut idm = Idm::default();
        assert_eq!(idm.speed_change(&FollowInput::new(4.0, 13.9, 0.0, 0.0)), -4.0);
        assert_eq!(idm.speed_change(&FollowInput::new(4.0, 13.9, -1.0, 0.0)), -4.0);
        assert_eq!(idm.speed_change(&FollowInput::new(4.0, 0.0, 50.0, 0.0)), -4.0);
    }

    #[test]
    fn idm_cruise_is_a_fixed_point() {
        let mut idm = Idm::default();
        assert_eq!(idm.speed_change(&FollowInput::new(10.0, 10.0, 1000.0, 10.0)), 0.0);
    }

    #[test]
    fn wiedemann_approach_sequence() {
        let rider = RiderProfile { power_w: 75.0, mass_kg: 85.0, gradient_pct: 0.0 };
        let mut model = Wiedemann::new(WiedemannParams::default(), rider, DriverRng::new(1, VehicleId(0))).unwrap();
        let (mut v, mut gap, mut own) = (2.0, 5.0, 2.0);
        let mut seen = Vec::new();
        for _ in 0..5 {
            let input = FollowInput::new(v, 4.167, gap, 0.0).with_accelerations(0.0, own);
            let acc = model.speed_change(&input);
            seen.push((acc * 1000.0).round() / 1000.0);
            v += acc;
            gap -= v;
            own = acc;
        }
        assert_eq!(seen, vec![-0.392, -0.37, -0.34, -0.297, -0.239]);
    }

    #[test]
    fn wiedemann_free_riding_accelerates() {
        let mut model =
            Wiedemann::new(WiedemannParams::default(), RiderProfile::default(), DriverRng::new(3, VehicleId(1)))
                .unwrap();
        let acc = model.speed_change(&FollowInput::new(1.0, 4.167, 1000.0, 4.167));
        assert!(acc > 0.0);
    }

    #[test]
    fn wiedemann_climb_is_slower() {
        let rng = DriverRng::new(3, VehicleId(1));
        let mut flat = Wiedemann::new(WiedemannParams::default(), RiderProfile::default(), rng.clone()).unwrap();
        let mut hill = Wiedemann::new(WiedemannParams::default(), RiderProfile::default(), rng).unwrap();
        hill.set_gradient(5.0);
        let input = FollowInput::new(2.0, 4.167, 1000.0, 4.167);
        assert!(hill.speed_change(&input) < flat.speed_change(&input));
    }

    #[test]
    fn wiedemann_rejects_massless_rider() {
        let rider = RiderProfile { mass_kg: 0.0, ..RiderProfile::default() };
        let err = Wiedemann::new(WiedemannParams::default(), rider, DriverRng::new(0, VehicleId(0))).unwrap_err();
        assert!(matches!(err, DriveError::Config(_)));

        let rider = RiderProfile { power_w: -1.0, ..RiderProfile::default() };
        assert!(Wiedemann::new(WiedemannParams::default(), rider, DriverRng::new(0, VehicleId(0))).is_err());
    }

    #[test]
    fn model_follows_vehicle_kind() {
        let rng = || DriverRng::new(9, VehicleId(4));
        let driver = DriverProfile::default();
        let bike = VehicleSpec::for_kind(VehicleKind::Bicycle);
        let car = VehicleSpec::for_kind(VehicleKind::Car);
        assert!(matches!(
            AccelerationModel::for_driver(VehicleKind::Bicycle, &bike, &driver, rng()).unwrap(),
            AccelerationModel::Wiedemann(_)
        ));
        match AccelerationModel::for_driver(VehicleKind::Car, &car, &driver, rng()).unwrap() {
            AccelerationModel::Idm(idm) => assert_eq!(idm.max_acceleration, 0.73),
            other => panic!("expected IDM, got {other:?}"),
        }
    }
}

// ── Entity-ahead finder ───────────────────────────────────────────────────────

#[cfg(test)]
mod finder {
    use mt_core::VehicleId;
    use mt_spatial::{Placement, Route, SpatialEnvironment};

    use super::helpers::corridor;
    use crate::find_entity_ahead;

    fn env_with_me() -> (SpatialEnvironment, Route) {
        let (net, e) = corridor();
        let route = Route::with_lanes(&net, &[(e[0], 0), (e[1], 1), (e[2], 0)]).unwrap();
        let mut env = SpatialEnvironment::new(net);
        env.insert(VehicleId(0), Placement { edge: e[0], position: 10.0, lane: 0 }, 4.5, true).unwrap();
        (env, route)
    }

    #[test]
    fn leader_on_own_lane() {
        let (mut env, mut route) = env_with_me();
        route.align_to(10.0);
        let e0 = route.current().unwrap().edge;
        env.insert(VehicleId(1), Placement { edge: e0, position: 40.0, lane: 0 }, 4.5, true).unwrap();
        // Closer, but on the other lane.
        env.insert(VehicleId(2), Placement { edge: e0, position: 20.0, lane: 1 }, 4.5, true).unwrap();
        env.set_kinematics(VehicleId(1), 3.0, -0.5).unwrap();

        let explore = env.explore(VehicleId(0), &route, 200.0).unwrap();
        let ahead = find_entity_ahead(&explore, &route, 10.0, 0).unwrap();
        assert_eq!(ahead.id, VehicleId(1));
        assert!((ahead.distance - 30.0).abs() < 1e-9);
        assert_eq!(ahead.velocity, 3.0);
        assert_eq!(ahead.acceleration, -0.5);
    }

    #[test]
    fn leader_on_next_edge_uses_desired_lane() {
        let (mut env, mut route) = env_with_me();
        route.align_to(10.0);
        let e1 = route.get(1).unwrap().edge;
        env.insert(VehicleId(1), Placement { edge: e1, position: 15.0, lane: 1 }, 4.5, true).unwrap();

        let explore = env.explore(VehicleId(0), &route, 200.0).unwrap();
        let ahead = find_entity_ahead(&explore, &route, 10.0, 0).unwrap();
        assert_eq!(ahead.id, VehicleId(1));
        assert!((ahead.distance - 105.0).abs() < 1e-9);
    }

    #[test]
    fn other_lane_is_not_found() {
        let (mut env, mut route) = env_with_me();
        route.align_to(10.0);
        let e1 = route.get(1).unwrap().edge;
        env.insert(VehicleId(1), Placement { edge: e1, position: 15.0, lane: 0 }, 4.5, true).unwrap();

        let explore = env.explore(VehicleId(0), &route, 200.0).unwrap();
        assert!(find_entity_ahead(&explore, &route, 10.0, 0).is_none());
    }

    #[test]
    fn vehicle_behind_is_ignored() {
        let (mut env, mut route) = env_with_me();
        route.align_to(10.0);
        let e0 = route.current().unwrap().edge;
        env.insert(VehicleId(1), Placement { edge: e0, position: 5.0, lane: 0 }, 4.5, true).unwrap();

        let explore = env.explore(VehicleId(0), &route, 200.0).unwrap();
        assert!(find_entity_ahead(&explore, &route, 10.0, 0).is_none());
    }

    #[test]
    fn nothing_beyond_the_window() {
        let (mut env, mut route) = env_with_me();
        route.align_to(10.0);
        let e2 = route.get(2).unwrap().edge;
        env.insert(VehicleId(1), Placement { edge: e2, position: 1.0, lane: 0 }, 4.5, true).unwrap();

        // 30 m only covers the current edge.
        let explore = env.explore(VehicleId(0), &route, 30.0).unwrap();
        assert!(find_entity_ahead(&explore, &route, 10.0, 0).is_none());
    }
}

// ── Junction arbitration ──────────────────────────────────────────────────────

#[cfg(test)]
mod junction {
    use mt_core::{EdgeId, GeoPoint, NodeId, Tick, VehicleId};
    use mt_spatial::{RoadNetworkBuilder, SpatialEnvironment};

    use super::helpers::{crossroads, place_car};
    use crate::junction::DEADLOCK_TICKS;
    use crate::{ArrivalRegistry, RightOfWay, SteeringHandle, TickView, TrafficCode};

    fn decide_all(fleet: &mut [SteeringHandle], env: &SpatialEnvironment, arrivals: &ArrivalRegistry) -> Vec<f64> {
        let view = TickView::new(Tick(0), env, arrivals);
        fleet.iter_mut().map(|h| h.decide(&view).unwrap().unwrap_or(0.0)).collect()
    }

    #[test]
    fn fifo_front_goes_others_hold() {
        let (net, c, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        // ids deliberately not in distance order
        let mut fleet = vec![
            place_car(&mut env, 0, &[inn[1], out[3]], 95.0, 0.0, TrafficCode::Fifo),
            place_car(&mut env, 1, &[inn[2], out[0]], 92.0, 0.0, TrafficCode::Fifo),
            place_car(&mut env, 2, &[inn[0], out[2]], 98.0, 0.0, TrafficCode::Fifo),
        ];
        let mut arrivals = ArrivalRegistry::new();
        arrivals.reconcile(&env);
        assert_eq!(arrivals.order(c), &[VehicleId(2), VehicleId(0), VehicleId(1)]);

        let d = decide_all(&mut fleet, &env, &arrivals);
        assert!(d[2] > 0.0);
        assert_eq!(d[0], 0.0);
        assert_eq!(d[1], 0.0);

        // The front vehicle clears the junction; the 5 m vehicle takes over.
        fleet[2].apply(&mut env, 5.0).unwrap();
        arrivals.reconcile(&env);
        assert_eq!(arrivals.front(c), Some(VehicleId(0)));
        let d = decide_all(&mut fleet, &env, &arrivals);
        assert!(d[0] > 0.0);
        assert_eq!(d[1], 0.0);
    }

    #[test]
    fn fifo_order_is_sticky() {
        let (net, c, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        let _a = place_car(&mut env, 5, &[inn[0], out[2]], 90.0, 0.0, TrafficCode::Fifo);
        let mut arrivals = ArrivalRegistry::new();
        arrivals.reconcile(&env);

        // A later arrival closer to the stop line still queues behind.
        let _b = place_car(&mut env, 1, &[inn[1], out[3]], 99.0, 0.0, TrafficCode::Fifo);
        arrivals.reconcile(&env);
        assert_eq!(arrivals.order(c), &[VehicleId(5), VehicleId(1)]);

        env.remove(VehicleId(5)).unwrap();
        arrivals.reconcile(&env);
        assert_eq!(arrivals.order(c), &[VehicleId(1)]);

        env.remove(VehicleId(1)).unwrap();
        arrivals.reconcile(&env);
        assert!(arrivals.is_empty());
    }

    #[test]
    fn fifo_lone_vehicle_seeds_the_order() {
        let (net, c, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        let mut fleet = vec![place_car(&mut env, 3, &[inn[3], out[1]], 98.0, 0.0, TrafficCode::Fifo)];
        let mut arrivals = ArrivalRegistry::new();
        arrivals.reconcile(&env);
        assert_eq!(arrivals.front(c), Some(VehicleId(3)));
        assert!(decide_all(&mut fleet, &env, &arrivals)[0] > 0.0);
    }

    #[test]
    fn fifo_rolls_up_outside_the_window() {
        let (net, c, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        let mut fleet = vec![
            place_car(&mut env, 0, &[inn[0], out[2]], 98.0, 0.0, TrafficCode::Fifo),
            place_car(&mut env, 1, &[inn[1], out[3]], 75.0, 0.0, TrafficCode::Fifo),
        ];
        let mut arrivals = ArrivalRegistry::new();
        arrivals.reconcile(&env);
        assert_eq!(arrivals.order(c), &[VehicleId(0)]);
        let d = decide_all(&mut fleet, &env, &arrivals);
        assert!(d[1] > 0.0);
    }

    #[test]
    fn right_before_left_yields_to_the_right() {
        let (net, _, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        // Coming from the south at 2 m/s; a car waits on the east arm, i.e.
        // to its right.
        let mut fleet = vec![
            place_car(&mut env, 0, &[inn[0], out[2]], 95.0, 2.0, TrafficCode::RightBeforeLeft),
            place_car(&mut env, 1, &[inn[1], out[3]], 95.0, 2.0, TrafficCode::RightBeforeLeft),
        ];
        let arrivals = ArrivalRegistry::new();
        let d = decide_all(&mut fleet, &env, &arrivals);
        assert!(d[0] < 2.0, "south car should brake, got {}", d[0]);
        // For the east car the south car is on the left.
        assert!(d[1] > 2.0, "east car should go, got {}", d[1]);
    }

    #[test]
    fn right_before_left_free_junction_caps_speed() {
        let (net, _, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        let mut fleet = vec![place_car(&mut env, 0, &[inn[0], out[2]], 95.0, 2.0, TrafficCode::RightBeforeLeft)];
        let d = decide_all(&mut fleet, &env, &ArrivalRegistry::new());
        assert!(d[0] > 2.0 && d[0] <= 2.7);
    }

    #[test]
    fn right_before_left_deadlock_releases_one_per_cycle() {
        let (net, c, inn, out) = crossroads();
        let mut env = SpatialEnvironment::new(net);
        let mut fleet: Vec<SteeringHandle> = (0..4)
            .map(|i| place_car(&mut env, i as u32, &[inn[i], out[(i + 2) % 4]], 98.0, 0.0, TrafficCode::RightBeforeLeft))
            .collect();
        let mut arrivals = ArrivalRegistry::new();

        for round in 1..=10 {
            arrivals.reconcile(&env);
            let d = decide_all(&mut fleet, &env, &arrivals);
            assert!(d.iter().all(|&x| x == 0.0), "round {round}: {d:?}");
            for (h, x) in fleet.iter_mut().zip(d) {
                h.apply(&mut env, x).unwrap();
            }
        }

        arrivals.reconcile(&env);
        let d = decide_all(&mut fleet, &env, &arrivals);
        let released: Vec<usize> = d.iter().enumerate().filter(|(_, x)| **x > 0.0).map(|(i, _)| i).collect();
        assert_eq!(released, vec![0]);
        assert!(d[0] > 2.0, "released car must clear the stop line, got {}", d[0]);
        for (h, x) in fleet.iter_mut().zip(d) {
            h.apply(&mut env, x).unwrap();
        }

        // A newcomer on the south arm keeps the gridlock closed; the next
        // earliest arrival is the only one to go.
        let _south = place_car(&mut env, 4, &[inn[0], out[2]], 98.0, 0.0, TrafficCode::RightBeforeLeft);
        arrivals.reconcile(&env);
        assert_eq!(arrivals.front(c), Some(VehicleId(1)));
        let d = decide_all(&mut fleet, &env, &arrivals);
        let released: Vec<usize> = (1..4).filter(|&i| d[i] > 0.0).collect();
        assert_eq!(released, vec![1]);
    }

    /// South car blocked by a car on the east arm; its route leaves over a
    /// 20 m edge into a second junction that is also inside the lookahead.
    fn crossroads_with_near_junction() -> (SpatialEnvironment, [EdgeId; 3], NodeId) {
        let mut b = RoadNetworkBuilder::new();
        let c = b.add_node(GeoPoint::new(0.0, 0.0));
        let s = b.add_node(GeoPoint::new(-0.0009, 0.0));
        let e = b.add_node(GeoPoint::new(0.0, 0.0009));
        let w = b.add_node(GeoPoint::new(0.0, -0.0009));
        let n = b.add_node(GeoPoint::new(0.00018, 0.0));
        let beyond = b.add_node(GeoPoint::new(0.0011, 0.0));
        let feeder = b.add_node(GeoPoint::new(0.00018, 0.0009));
        b.add_directed_edge(s, c, 100.0, 1, None);
        b.add_directed_edge(e, c, 100.0, 1, None);
        b.add_directed_edge(c, w, 100.0, 1, None);
        b.add_directed_edge(c, n, 20.0, 1, None);
        b.add_directed_edge(n, beyond, 100.0, 1, None);
        b.add_directed_edge(feeder, n, 100.0, 1, None);
        let net = b.build();
        let route = [
            net.edge_between(s, c).unwrap(),
            net.edge_between(c, n).unwrap(),
            net.edge_between(n, beyond).unwrap(),
        ];
        let east = net.edge_between(e, c).unwrap();
        let west = net.edge_between(c, w).unwrap();
        let mut env = SpatialEnvironment::new(net);
        let _east = place_car(&mut env, 1, &[east, west], 98.0, 0.0, TrafficCode::RightBeforeLeft);
        (env, route, n)
    }

    #[test]
    fn right_before_left_deadlock_counts_past_a_near_second_junction() {
        let (mut env, route, second) = crossroads_with_near_junction();
        assert!(env.network().in_degree(second) > 1);
        let mut fleet = vec![place_car(&mut env, 0, &route, 98.0, 0.0, TrafficCode::RightBeforeLeft)];
        let mut arrivals = ArrivalRegistry::new();

        let mut released_at = None;
        for tick in 0..30 {
            arrivals.reconcile(&env);
            let d = decide_all(&mut fleet, &env, &arrivals);
            if d[0] > 0.0 {
                released_at = Some(tick);
                break;
            }
            fleet[0].apply(&mut env, d[0]).unwrap();
        }
        assert_eq!(released_at, Some(DEADLOCK_TICKS as usize));
    }

    #[test]
    fn right_before_left_waits_are_counted_per_junction() {
        let (mut env, route, second) = crossroads_with_near_junction();
        let mut fleet = vec![place_car(&mut env, 0, &route, 98.0, 0.0, TrafficCode::RightBeforeLeft)];
        let mut arrivals = ArrivalRegistry::new();
        for _ in 0..5 {
            arrivals.reconcile(&env);
            let d = decide_all(&mut fleet, &env, &arrivals);
            fleet[0].apply(&mut env, d[0]).unwrap();
        }
        let first = env.network().to_node(route[0]);
        let RightOfWay::RightBeforeLeft(policy) = fleet[0].right_of_way() else {
            panic!("expected right-before-left");
        };
        assert_eq!(policy.stationary_ticks(first), 5);
        assert_eq!(policy.stationary_ticks(second), 0);
    }
}

// ── Steering handle ───────────────────────────────────────────────────────────

#[cfg(test)]
mod handle {
    use mt_core::{DriverRng, Tick, VehicleId, VehicleKind};
    use mt_spatial::{Route, SignalPhase, SpatialEnvironment};

    use super::helpers::{corridor, long_road, place, place_car};
    use crate::{
        ArrivalRegistry, DriveError, DriveState, DriverProfile, ScheduledSection, ScheduledStopBraking,
        SteeringHandle, TickView, TimetablePacing, TrafficCode, Vehicle,
    };

    fn decide(h: &mut SteeringHandle, env: &SpatialEnvironment, now: u64) -> Option<f64> {
        let arrivals = ArrivalRegistry::new();
        h.decide(&TickView::new(Tick(now), env, &arrivals)).unwrap()
    }

    #[test]
    fn free_drive_to_goal() {
        let (net, edges) = long_road(10);
        let route = Route::from_edges(&net, &edges).unwrap();
        let mut env = SpatialEnvironment::new(net);
        let vehicle = Vehicle::new(VehicleId(0), VehicleKind::Car);
        let mut h = SteeringHandle::new(vehicle, DriverProfile::default(), DriverRng::new(1, VehicleId(0)))
            .unwrap()
            .with_route(route);
        let arrivals = ArrivalRegistry::new();

        let mut speeds = Vec::new();
        for t in 0..400 {
            h.move_vehicle(&mut env, &arrivals, Tick(t)).unwrap();
            let v = h.vehicle().velocity;
            assert!((0.0..=10.0).contains(&v), "tick {t}: v={v}");
            let p = env.placement(VehicleId(0)).unwrap();
            assert!((0.0..=200.0).contains(&p.position));
            if h.goal_reached() {
                break;
            }
            speeds.push(v);
        }

        assert!(h.goal_reached());
        assert_eq!(h.vehicle().velocity, 0.0);
        assert!(h.route().unwrap().remaining_distance_to_goal() < 1e-6);
        let p = env.placement(VehicleId(0)).unwrap();
        assert_eq!(p.edge, *edges.last().unwrap());
        assert!((p.position - 200.0).abs() < 1e-6);

        // Speed rises, then holds steady just under the limit.
        assert!(speeds.windows(2).take(10).all(|w| w[0] < w[1]));
        let cruise = &speeds[speeds.len() - 20..];
        assert!(cruise.iter().all(|&v| v == cruise[0] && v > 9.0));
    }

    #[test]
    fn prepare_places_on_desired_lane() {
        let (net, e) = corridor();
        let route = Route::with_lanes(&net, &[(e[0], 1), (e[1], 0)]).unwrap();
        let mut env = SpatialEnvironment::new(net);
        let mut h = SteeringHandle::new(Vehicle::new(VehicleId(3), VehicleKind::Car), DriverProfile::default(), DriverRng::new(0, VehicleId(3)))
            .unwrap()
            .with_route(route);
        assert_eq!(h.state(), DriveState::NotStarted);
        assert_eq!(decide(&mut h, &env, 0), None);

        h.prepare(&mut env).unwrap();
        assert_eq!(h.state(), DriveState::Driving);
        let p = env.placement(VehicleId(3)).unwrap();
        assert_eq!((p.edge, p.position, p.lane), (e[0], 0.0, 1));
        assert!(h.bearing(&env).unwrap().abs() < 1e-6);
    }

    #[test]
    fn follows_leader() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 10.0, 8.0, TrafficCode::default());
        let _leader = place_car(&mut env, 1, &e, 25.0, 0.0, TrafficCode::default());
        let d = decide(&mut h, &env, 0).unwrap();
        assert!(d < 8.0);
    }

    #[test]
    fn red_light_brakes_green_does_not() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 80.0, 5.0, TrafficCode::default());

        env.set_signal(e[0], SignalPhase::Red).unwrap();
        let red = decide(&mut h, &env, 0).unwrap();
        env.set_signal(e[0], SignalPhase::Yellow).unwrap();
        let yellow = decide(&mut h, &env, 0).unwrap();
        env.set_signal(e[0], SignalPhase::Green).unwrap();
        let green = decide(&mut h, &env, 0).unwrap();

        assert!(red < 5.0);
        assert_eq!(yellow, red);
        assert!(green > 5.0);
    }

    #[test]
    fn yellow_too_late_to_stop_is_ignored() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 99.0, 13.0, TrafficCode::default());
        env.set_signal(e[0], SignalPhase::Red).unwrap();
        assert_eq!(decide(&mut h, &env, 0), Some(0.0));
        env.set_signal(e[0], SignalPhase::Yellow).unwrap();
        assert!(decide(&mut h, &env, 0).unwrap() > 13.0);
    }

    #[test]
    fn braking_override() {
        let (net, edges) = long_road(3);
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &edges, 10.0, 10.0, TrafficCode::default());
        assert!(decide(&mut h, &env, 0).unwrap() >= 10.0);
        h.driver_mut().braking_activated = true;
        assert!(decide(&mut h, &env, 0).unwrap() < 10.0);
    }

    #[test]
    fn snaps_to_goal_when_close() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &[e[2]], 48.0, 0.0, TrafficCode::default());
        let d = decide(&mut h, &env, 0).unwrap();
        assert!((d - 2.0).abs() < 1e-9);
        h.apply(&mut env, d).unwrap();
        assert!(h.goal_reached());
        assert_eq!(h.vehicle().velocity, 0.0);
        assert_eq!(decide(&mut h, &env, 1), None);
    }

    #[test]
    fn velocity_and_acceleration_bookkeeping() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 0.0, 4.0, TrafficCode::default());
        h.apply(&mut env, 4.567).unwrap();
        assert_eq!(h.vehicle().velocity, 4.57);
        assert!((h.vehicle().acceleration - 0.57).abs() < 1e-9);
        let state = env.entity(VehicleId(0)).unwrap();
        assert_eq!(state.velocity, 4.57);

        h.apply(&mut env, 0.0).unwrap();
        assert_eq!(h.vehicle().velocity, 0.0);
        assert!((h.vehicle().acceleration + 4.57).abs() < 1e-9);
    }

    #[test]
    fn rejected_move_is_fatal() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 0.0, 4.0, TrafficCode::default());
        env.remove(VehicleId(0)).unwrap();
        let err = h.apply(&mut env, 3.0).unwrap_err();
        assert!(matches!(err, DriveError::MoveRejected { vehicle: VehicleId(0), .. }));
    }

    #[test]
    fn route_replacement() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 30.0, 4.0, TrafficCode::default());

        // Same first edge: continue from the current position.
        let route = Route::from_edges(env.network(), &e[..2]).unwrap();
        h.set_route(&mut env, route).unwrap();
        assert!((h.route().unwrap().remaining_distance_to_goal() - 170.0).abs() < 1e-9);
        assert_eq!(h.state(), DriveState::Driving);

        // Elsewhere: detach and start over.
        let route = Route::from_edges(env.network(), &e[1..]).unwrap();
        h.set_route(&mut env, route).unwrap();
        assert_eq!(h.state(), DriveState::NotStarted);
        assert!(env.placement(VehicleId(0)).is_none());
        h.prepare(&mut env).unwrap();
        assert_eq!(env.placement(VehicleId(0)).unwrap().edge, e[1]);
    }

    #[test]
    fn detach_removes_from_environment() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place_car(&mut env, 0, &e, 30.0, 4.0, TrafficCode::default());
        h.detach(&mut env).unwrap();
        assert!(env.is_empty());
        assert!(!h.vehicle().is_attached());
        assert!(h.position(&env).is_none());
    }

    #[test]
    fn boarding_holds_until_departure() {
        let (net, e) = corridor();
        let route = Route::from_edges(&net, &e).unwrap();
        let mut env = SpatialEnvironment::new(net);
        let bus = Vehicle::new(VehicleId(7), VehicleKind::Bus);
        let mut h = SteeringHandle::new(bus, DriverProfile::default(), DriverRng::new(0, VehicleId(7)))
            .unwrap()
            .with_route(route)
            .with_pacing(TimetablePacing)
            .with_station_braking(ScheduledStopBraking::default());
        h.begin_section(ScheduledSection {
            boarding_since: Tick(0),
            min_dwell_ticks: 5,
            departure: Tick(10),
            arrival: Tick(40),
        });
        h.prepare(&mut env).unwrap();
        assert_eq!(h.state(), DriveState::Boarding);

        for now in [0, 3, 6, 9] {
            assert_eq!(decide(&mut h, &env, now), None, "tick {now}");
        }
        let d = decide(&mut h, &env, 10).unwrap();
        assert_eq!(h.state(), DriveState::Driving);
        assert!((d - 250.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn pacing_is_clamped_to_max_speed() {
        let (net, e) = corridor();
        let mut env = SpatialEnvironment::new(net);
        let mut h = place(&mut env, 7, VehicleKind::Bus, &e, 0.0, 0.0, DriverProfile::default())
            .with_pacing(TimetablePacing);
        h.begin_section(ScheduledSection {
            boarding_since: Tick(0),
            min_dwell_ticks: 0,
            departure: Tick(1),
            arrival: Tick(2),
        });
        // Posted 13.9 m/s is below the bus's own maximum.
        let d = decide(&mut h, &env, 1).unwrap();
        assert!((d - 13.9).abs() < 1e-9);
    }

    #[test]
    fn station_braking_near_stop() {
        let run = |with_braking: bool| {
            let (net, e) = corridor();
            let mut env = SpatialEnvironment::new(net);
            let mut h = place(&mut env, 0, VehicleKind::Bus, &[e[2]], 10.0, 8.0, DriverProfile::default());
            if with_braking {
                h = h.with_station_braking(ScheduledStopBraking::default());
            }
            decide(&mut h, &env, 0).unwrap()
        };
        assert!(run(true) < 8.0);
        assert!(run(false) > 8.0);
    }
}

// ── Vehicle and driver data ───────────────────────────────────────────────────

#[cfg(test)]
mod vehicle {
    use mt_core::{Direction, DriverRng, VehicleId, VehicleKind};

    use crate::{DriverProfile, DriverType, TrafficCode, TurningSpeeds, VehicleSpec};

    #[test]
    fn presets() {
        let bike = VehicleSpec::for_kind(VehicleKind::Bicycle);
        assert_eq!(bike.max_speed, 4.167);
        assert_eq!(bike.turning, TurningSpeeds::BICYCLE);
        let ferry = VehicleSpec::for_kind(VehicleKind::Ferry);
        assert_eq!(ferry.max_acceleration, 0.5);
        assert!((ferry.standard_speed_limit - 6.1722222).abs() < 1e-6);
        assert!((VehicleSpec::for_kind(VehicleKind::Car).standard_speed_limit - 13.89).abs() < 0.01);
    }

    #[test]
    fn turning_speed_per_direction() {
        let t = TurningSpeeds::MOTOR;
        assert_eq!(t.for_direction(Direction::Up), 0.0);
        assert_eq!(t.for_direction(Direction::UpLeft), 5.5);
        assert_eq!(t.for_direction(Direction::Right), 4.1);
        assert_eq!(t.for_direction(Direction::DownLeft), 2.7);
        assert_eq!(t.for_direction(Direction::Down), 1.38);
    }

    #[test]
    fn traffic_code_parsing() {
        assert_eq!("south-african".parse::<TrafficCode>().unwrap(), TrafficCode::Fifo);
        assert_eq!("German".parse::<TrafficCode>().unwrap(), TrafficCode::RightBeforeLeft);
        assert_eq!("".parse::<TrafficCode>().unwrap(), TrafficCode::RightBeforeLeft);
        assert!("martian".parse::<TrafficCode>().is_err());
    }

    #[test]
    fn overtaking_is_reproducible() {
        let draw = || {
            let mut d = DriverProfile::new(DriverType::Aggressive);
            let mut rng = DriverRng::new(11, VehicleId(2));
            (0..10)
                .map(|_| {
                    d.sample_overtaking(&mut rng);
                    d.overtaking_allowed
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }
}
