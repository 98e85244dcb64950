//! The shared spatial environment: who is where on which lane.
//!
//! # Data layout
//!
//! Occupancy is stored per edge, per lane, as a `Vec` sorted by position
//! along the edge (ties broken by `VehicleId`), so "everyone ahead of me"
//! is a suffix of one slice.  An entity index maps each `VehicleId` to its
//! current [`EntityState`].
//!
//! # Concurrency
//!
//! The environment is mutated only through `&mut self` (insert, move,
//! remove, kinematics, signals).  The simulation commits those mutations in
//! a sequential phase and shares `&SpatialEnvironment` read-only with the
//! decision phase, so no interior locking is needed.

use mt_core::{EdgeId, GeoPoint, NodeId, VehicleId};

use crate::network::RoadNetwork;
use crate::route::Route;
use crate::{SpatialError, SpatialResult};

#[cfg(feature = "fx-hash")]
type EntityMap = rustc_hash::FxHashMap<VehicleId, EntityState>;
#[cfg(not(feature = "fx-hash"))]
type EntityMap = std::collections::HashMap<VehicleId, EntityState>;

// ── Public data types ─────────────────────────────────────────────────────────

/// Where an entity sits: edge, metres from the edge start, lane index.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    pub edge: EdgeId,
    pub position: f64,
    pub lane: u8,
}

/// Everything the environment knows about a placed entity.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityState {
    pub placement: Placement,
    /// Metres per tick, as last reported by the owner.
    pub velocity: f64,
    pub acceleration: f64,
    pub length: f64,
    /// Non-colliding entities are invisible to explore and junction queries.
    pub colliding: bool,
}

/// Signal shown to traffic at the end of an edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalPhase {
    /// Unsignalised: right-of-way rules apply.
    #[default]
    None,
    Green,
    Yellow,
    Red,
}

/// Snapshot of another entity seen during exploration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Occupant {
    pub id: VehicleId,
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub length: f64,
}

/// One edge of an exploration window.
#[derive(Clone, Debug)]
pub struct EdgeExplore {
    pub edge: EdgeId,
    /// Metres from the explorer to the end of this edge.
    pub intersection_distance: f64,
    /// Occupants per lane, ascending by position.  On the explorer's own
    /// edge only those strictly ahead of it are listed.
    pub lanes: Vec<Vec<Occupant>>,
    pub signal: SignalPhase,
}

impl EdgeExplore {
    /// Occupants on `lane`, or an empty slice if the lane does not exist.
    #[inline]
    pub fn lane(&self, lane: u8) -> &[Occupant] {
        self.lanes.get(lane as usize).map_or(&[], Vec::as_slice)
    }
}

/// Transient result of [`SpatialEnvironment::explore`], current edge first.
#[derive(Clone, Debug, Default)]
pub struct ExploreResult {
    pub edges: Vec<EdgeExplore>,
}

impl ExploreResult {
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, EdgeExplore> {
        self.edges.iter()
    }
}

/// The lead entity of one lane of an incoming edge, close to a junction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Approach {
    pub vehicle: VehicleId,
    pub edge: EdgeId,
    pub lane: u8,
    /// Metres to the junction's stop line.
    pub remaining: f64,
    pub velocity: f64,
}

/// Result of a committed move.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MoveOutcome {
    pub placement: Placement,
    /// Metres actually moved; less than requested when clipped at the goal.
    pub moved: f64,
    /// Junctions crossed during the move.
    pub junctions_crossed: usize,
}

// ── SpatialEnvironment ────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct Slot {
    position: f64,
    id: VehicleId,
}

/// Lane-level occupancy over a [`RoadNetwork`].
pub struct SpatialEnvironment {
    network: RoadNetwork,
    entities: EntityMap,
    /// `occupancy[edge][lane]`, ascending by (position, id).
    occupancy: Vec<Vec<Vec<Slot>>>,
    signals: Vec<SignalPhase>,
}

impl SpatialEnvironment {
    pub fn new(network: RoadNetwork) -> Self {
        let occupancy = network
            .edge_lanes
            .iter()
            .map(|&lanes| vec![Vec::new(); lanes as usize])
            .collect();
        let signals = vec![SignalPhase::None; network.edge_count()];
        Self { network, entities: EntityMap::default(), occupancy, signals }
    }

    #[inline]
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Number of placed entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn entity(&self, id: VehicleId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    #[inline]
    pub fn placement(&self, id: VehicleId) -> Option<Placement> {
        self.entities.get(&id).map(|e| e.placement)
    }

    /// Interpolated geographic position of a placed entity.
    pub fn position_of(&self, id: VehicleId) -> Option<GeoPoint> {
        let p = self.placement(id)?;
        Some(self.network.point_along(p.edge, p.position))
    }

    // ── Signals ───────────────────────────────────────────────────────────

    pub fn set_signal(&mut self, edge: EdgeId, phase: SignalPhase) -> SpatialResult<()> {
        self.network.check_edge(edge)?;
        self.signals[edge.index()] = phase;
        Ok(())
    }

    #[inline]
    pub fn signal(&self, edge: EdgeId) -> SignalPhase {
        self.signals.get(edge.index()).copied().unwrap_or_default()
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Place a new entity.
    pub fn insert(
        &mut self,
        id: VehicleId,
        placement: Placement,
        length: f64,
        colliding: bool,
    ) -> SpatialResult<()> {
        if self.entities.contains_key(&id) {
            return Err(SpatialError::EntityExists(id));
        }
        self.check_placement(placement)?;
        self.occupy(id, placement);
        self.entities.insert(
            id,
            EntityState { placement, velocity: 0.0, acceleration: 0.0, length, colliding },
        );
        Ok(())
    }

    /// Take an entity off the network.
    pub fn remove(&mut self, id: VehicleId) -> SpatialResult<EntityState> {
        let state = self.entities.remove(&id).ok_or(SpatialError::EntityNotFound(id))?;
        self.vacate(id, state.placement);
        Ok(state)
    }

    /// Record the owner's latest velocity and acceleration.
    pub fn set_kinematics(&mut self, id: VehicleId, velocity: f64, acceleration: f64) -> SpatialResult<()> {
        let state = self.entities.get_mut(&id).ok_or(SpatialError::EntityNotFound(id))?;
        state.velocity = velocity;
        state.acceleration = acceleration;
        Ok(())
    }

    /// Advance `id` by `distance` metres along `route`, crossing onto later
    /// route edges as needed.
    ///
    /// The entity keeps its lane on the current edge and takes each later
    /// stop's desired lane (clamped to the lane count).  On the final edge
    /// the move is clipped at the edge end.  `route` progress is updated in
    /// place.
    pub fn move_along(&mut self, id: VehicleId, route: &mut Route, distance: f64) -> SpatialResult<MoveOutcome> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(SpatialError::InvalidDistance(distance));
        }
        let from = self.attached_on_route(id, route)?;

        let mut placement = from;
        let mut left = distance;
        let mut junctions_crossed = 0;
        loop {
            let length = self.network.length(placement.edge);
            let room = length - placement.position;
            if left <= room {
                placement.position += left;
                left = 0.0;
                break;
            }
            if route.len() <= 1 {
                placement.position = length;
                left -= room;
                break;
            }
            left -= room;
            route.pop_current();
            let next = route.current().ok_or(SpatialError::EmptyRoute)?;
            let lanes = self.network.lanes(next.edge);
            placement = Placement {
                edge: next.edge,
                position: 0.0,
                lane: next.desired_lane.min(lanes.saturating_sub(1)),
            };
            junctions_crossed += 1;
        }

        self.vacate(id, from);
        self.occupy(id, placement);
        if let Some(state) = self.entities.get_mut(&id) {
            state.placement = placement;
        }
        route.set_offset(placement.position);
        Ok(MoveOutcome { placement, moved: distance - left, junctions_crossed })
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Look ahead along `route` from the position of `id`.
    ///
    /// The window always contains the current edge and then adds route edges
    /// while the distance covered so far is below `distance`.
    pub fn explore(&self, id: VehicleId, route: &Route, distance: f64) -> SpatialResult<ExploreResult> {
        let here = self.attached_on_route(id, route)?;

        let mut edges = Vec::new();
        let mut covered = self.network.length(here.edge) - here.position;
        edges.push(EdgeExplore {
            edge: here.edge,
            intersection_distance: covered,
            lanes: self.lane_snapshot(here.edge, |slot| {
                slot.id != id && (slot.position, slot.id) > (here.position, id)
            }),
            signal: self.signal(here.edge),
        });

        for stop in route.stops().skip(1) {
            if covered >= distance {
                break;
            }
            covered += stop.length;
            edges.push(EdgeExplore {
                edge: stop.edge,
                intersection_distance: covered,
                lanes: self.lane_snapshot(stop.edge, |_| true),
                signal: self.signal(stop.edge),
            });
        }
        Ok(ExploreResult { edges })
    }

    /// Lead colliding entity of every lane of every edge into `node` that is
    /// less than `within` metres from the stop line.
    ///
    /// Ordered by incoming `EdgeId`, then lane.
    pub fn approaching(&self, node: NodeId, within: f64) -> Vec<Approach> {
        if node.index() >= self.network.node_count() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for &edge in self.network.incoming(node) {
            let length = self.network.length(edge);
            for (lane, slots) in self.occupancy[edge.index()].iter().enumerate() {
                let lead = slots
                    .iter()
                    .rev()
                    .filter_map(|s| self.entities.get(&s.id).map(|e| (s, e)))
                    .find(|(_, e)| e.colliding);
                if let Some((slot, state)) = lead {
                    let remaining = length - slot.position;
                    if remaining < within {
                        out.push(Approach {
                            vehicle: slot.id,
                            edge,
                            lane: lane as u8,
                            remaining,
                            velocity: state.velocity,
                        });
                    }
                }
            }
        }
        out
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn check_placement(&self, p: Placement) -> SpatialResult<()> {
        self.network.check_edge(p.edge)?;
        let lanes = self.network.lanes(p.edge);
        if p.lane >= lanes {
            return Err(SpatialError::LaneOutOfRange { edge: p.edge, lane: p.lane, lanes });
        }
        let length = self.network.length(p.edge);
        if !(0.0..=length).contains(&p.position) {
            return Err(SpatialError::PositionOutOfRange { edge: p.edge, position: p.position, length });
        }
        Ok(())
    }

    /// Placement of `id`, which must be on the route's current edge.
    fn attached_on_route(&self, id: VehicleId, route: &Route) -> SpatialResult<Placement> {
        let placement = self.placement(id).ok_or(SpatialError::EntityNotFound(id))?;
        let expected = route.current().ok_or(SpatialError::EmptyRoute)?.edge;
        if placement.edge != expected {
            return Err(SpatialError::RouteMismatch { vehicle: id, expected, actual: placement.edge });
        }
        Ok(placement)
    }

    fn lane_snapshot(&self, edge: EdgeId, keep: impl Fn(&Slot) -> bool) -> Vec<Vec<Occupant>> {
        self.occupancy[edge.index()]
            .iter()
            .map(|slots| {
                slots
                    .iter()
                    .filter(|s| keep(s))
                    .filter_map(|s| {
                        let e = self.entities.get(&s.id)?;
                        e.colliding.then_some(Occupant {
                            id: s.id,
                            position: s.position,
                            velocity: e.velocity,
                            acceleration: e.acceleration,
                            length: e.length,
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn occupy(&mut self, id: VehicleId, p: Placement) {
        let lane = &mut self.occupancy[p.edge.index()][p.lane as usize];
        let at = lane.partition_point(|s| (s.position, s.id) < (p.position, id));
        lane.insert(at, Slot { position: p.position, id });
    }

    fn vacate(&mut self, id: VehicleId, p: Placement) {
        let lane = &mut self.occupancy[p.edge.index()][p.lane as usize];
        if let Some(at) = lane.iter().position(|s| s.id == id) {
            lane.remove(at);
        }
    }
}
