//! A vehicle's planned path through the network.
//!
//! Routes are produced by an external planner; this crate only validates and
//! tracks them.  The front stop is always the edge the vehicle is on (or
//! will be inserted onto).  [`SpatialEnvironment::move_along`] pops stops as
//! the vehicle crosses junctions, so `remaining_distance_to_goal` decreases
//! monotonically while the vehicle moves.
//!
//! [`SpatialEnvironment::move_along`]: crate::SpatialEnvironment::move_along

use std::collections::VecDeque;

use mt_core::EdgeId;

use crate::network::RoadNetwork;
use crate::{SpatialError, SpatialResult};

/// Remaining distances below this count as "at the goal".
pub const GOAL_EPSILON: f64 = 1e-6;

/// One edge of a route and the lane the vehicle should use on it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStop {
    pub edge: EdgeId,
    pub desired_lane: u8,
    /// Cached edge length in metres.
    pub length: f64,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    stops: VecDeque<RouteStop>,
    route_length: f64,
    /// Total length of stops already popped.
    passed: f64,
    /// Position on the front stop's edge.
    offset: f64,
}

impl Route {
    /// Build a route over `edges`, all on lane 0.
    ///
    /// Fails on an empty list, an unknown edge, or consecutive edges that do
    /// not share a node.
    pub fn from_edges(network: &RoadNetwork, edges: &[EdgeId]) -> SpatialResult<Route> {
        if edges.is_empty() {
            return Err(SpatialError::EmptyRoute);
        }
        let mut stops = VecDeque::with_capacity(edges.len());
        for (i, &edge) in edges.iter().enumerate() {
            network.check_edge(edge)?;
            if let Some(&prev) = i.checked_sub(1).and_then(|p| edges.get(p)) {
                if network.to_node(prev) != network.from_node(edge) {
                    return Err(SpatialError::DisconnectedRoute { from: prev, to: edge });
                }
            }
            stops.push_back(RouteStop { edge, desired_lane: 0, length: network.length(edge) });
        }
        let route_length = stops.iter().map(|s| s.length).sum();
        Ok(Route { stops, route_length, passed: 0.0, offset: 0.0 })
    }

    /// Like [`from_edges`](Self::from_edges) with one desired lane per edge.
    /// Lanes beyond an edge's lane count are clamped to its rightmost lane.
    pub fn with_lanes(network: &RoadNetwork, legs: &[(EdgeId, u8)]) -> SpatialResult<Route> {
        let edges: Vec<EdgeId> = legs.iter().map(|&(e, _)| e).collect();
        let mut route = Route::from_edges(network, &edges)?;
        for (stop, &(edge, lane)) in route.stops.iter_mut().zip(legs) {
            stop.desired_lane = lane.min(network.lanes(edge).saturating_sub(1));
        }
        Ok(route)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The stop the vehicle is currently on.
    #[inline]
    pub fn current(&self) -> Option<&RouteStop> {
        self.stops.front()
    }

    /// Upcoming stops, current first.
    #[inline]
    pub fn stops(&self) -> impl ExactSizeIterator<Item = &RouteStop> + '_ {
        self.stops.iter()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&RouteStop> {
        self.stops.get(index)
    }

    /// Number of stops left, including the current one.
    #[inline]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Set the lane the vehicle should take on the `index`-th upcoming stop.
    pub fn set_desired_lane(&mut self, index: usize, lane: u8) -> bool {
        match self.stops.get_mut(index) {
            Some(stop) => {
                stop.desired_lane = lane;
                true
            }
            None => false,
        }
    }

    /// Total length of the route as planned, in metres.
    #[inline]
    pub fn route_length(&self) -> f64 {
        self.route_length
    }

    /// Metres driven along this route so far.
    #[inline]
    pub fn traversed(&self) -> f64 {
        self.passed + self.offset
    }

    #[inline]
    pub fn remaining_distance_to_goal(&self) -> f64 {
        (self.route_length - self.traversed()).max(0.0)
    }

    /// Metres left on the current edge.
    #[inline]
    pub fn remaining_on_current(&self) -> f64 {
        self.current().map_or(0.0, |s| (s.length - self.offset).max(0.0))
    }

    #[inline]
    pub fn goal_reached(&self) -> bool {
        self.stops.len() <= 1 && self.remaining_distance_to_goal() <= GOAL_EPSILON
    }

    // ── Progress (driven by the environment) ─────────────────────────────

    /// Record the vehicle's position on the current edge.
    pub(crate) fn set_offset(&mut self, position: f64) {
        self.offset = position;
    }

    /// Drop the current stop after the vehicle left its edge.
    pub(crate) fn pop_current(&mut self) -> Option<RouteStop> {
        let stop = self.stops.pop_front()?;
        self.passed += stop.length;
        self.offset = 0.0;
        Some(stop)
    }

    /// Re-anchor progress when a route is handed to a vehicle already
    /// driving on its first edge.
    pub fn align_to(&mut self, position: f64) {
        self.offset = position;
    }
}
