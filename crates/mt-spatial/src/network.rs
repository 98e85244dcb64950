//! Road network representation and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format in both directions.
//! Outgoing edges of node `n` are the contiguous `EdgeId` range
//! `node_out_start[n] .. node_out_start[n+1]`; incoming edges of `n` are
//! `in_edges[node_in_start[n] .. node_in_start[n+1]]`.
//!
//! Edge arrays are sorted by source node and indexed by `EdgeId`.  Each edge
//! carries its length, lane count, optional speed limit, and a compass
//! bearing derived from its end-node positions (used for turn
//! classification at junctions).
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `(lat, lon)` to the nearest `NodeId`.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use mt_core::{EdgeId, GeoPoint, NodeId};

use crate::{SpatialError, SpatialResult};

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f32; 2], // [lat, lon]
    id: NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in lat/lon space.
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed, lane-aware road graph plus a spatial index for node snapping.
///
/// Build with [`RoadNetworkBuilder`].
pub struct RoadNetwork {
    // ── Node data ─────────────────────────────────────────────────────────
    /// Geographic position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<GeoPoint>,

    /// CSR row pointer for outgoing edges.  Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    /// CSR row pointer into `in_edges`.  Length = `node_count + 1`.
    pub node_in_start: Vec<u32>,

    /// Incoming edge ids grouped by destination node, ascending within a node.
    pub in_edges: Vec<EdgeId>,

    // ── Edge data (indexed by EdgeId) ─────────────────────────────────────
    pub edge_from: Vec<NodeId>,

    pub edge_to: Vec<NodeId>,

    /// Length of each edge in metres.
    pub edge_length_m: Vec<f64>,

    /// Number of lanes (at least 1).
    pub edge_lanes: Vec<u8>,

    /// Posted speed limit in m/s, if the edge has one.
    pub edge_max_speed: Vec<Option<f64>>,

    /// Compass bearing from source to destination node, degrees.
    pub edge_bearing: Vec<f64>,

    spatial_idx: RTree<NodeEntry>,
}

impl RoadNetwork {
    pub fn empty() -> Self {
        RoadNetworkBuilder::new().build()
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    // ── Edge attributes ───────────────────────────────────────────────────

    /// Fail with `EdgeNotFound` unless `edge` exists.
    #[inline]
    pub fn check_edge(&self, edge: EdgeId) -> SpatialResult<()> {
        if edge.index() < self.edge_count() {
            Ok(())
        } else {
            Err(SpatialError::EdgeNotFound(edge))
        }
    }

    #[inline]
    pub fn length(&self, edge: EdgeId) -> f64 {
        self.edge_length_m[edge.index()]
    }

    #[inline]
    pub fn lanes(&self, edge: EdgeId) -> u8 {
        self.edge_lanes[edge.index()]
    }

    #[inline]
    pub fn max_speed(&self, edge: EdgeId) -> Option<f64> {
        self.edge_max_speed[edge.index()]
    }

    #[inline]
    pub fn bearing(&self, edge: EdgeId) -> f64 {
        self.edge_bearing[edge.index()]
    }

    #[inline]
    pub fn from_node(&self, edge: EdgeId) -> NodeId {
        self.edge_from[edge.index()]
    }

    #[inline]
    pub fn to_node(&self, edge: EdgeId) -> NodeId {
        self.edge_to[edge.index()]
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Iterator over the `EdgeId`s of all outgoing edges from `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    /// Incoming edges of `node`, ascending by `EdgeId`.
    #[inline]
    pub fn incoming(&self, node: NodeId) -> &[EdgeId] {
        let start = self.node_in_start[node.index()] as usize;
        let end   = self.node_in_start[node.index() + 1] as usize;
        &self.in_edges[start..end]
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    #[inline]
    pub fn in_degree(&self, node: NodeId) -> usize {
        self.incoming(node).len()
    }

    /// The first directed edge from `from` to `to`, if any.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        if from.index() >= self.node_count() {
            return None;
        }
        self.out_edges(from).find(|&e| self.to_node(e) == to)
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Return the `NodeId` of the nearest road node to `pos`.
    ///
    /// Returns `None` only if the network has no nodes.
    pub fn snap_to_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.lat, pos.lon])
            .map(|e| e.id)
    }

    /// Return up to `k` nearest nodes to `pos`, sorted by ascending distance.
    pub fn k_nearest_nodes(&self, pos: GeoPoint, k: usize) -> Vec<NodeId> {
        self.spatial_idx
            .nearest_neighbor_iter(&[pos.lat, pos.lon])
            .take(k)
            .map(|e| e.id)
            .collect()
    }

    /// Interpolated position `offset_m` metres along `edge`.
    pub fn point_along(&self, edge: EdgeId, offset_m: f64) -> GeoPoint {
        let from = self.node_pos[self.from_node(edge).index()];
        let to = self.node_pos[self.to_node(edge).index()];
        let length = self.length(edge);
        let t = if length > 0.0 { offset_m / length } else { 0.0 };
        from.lerp(to, t)
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// Edge ids are assigned by `build()` (edges sorted by source node, insertion
/// order preserved within a node); look them up with
/// [`RoadNetwork::edge_between`].
///
/// # Example
///
/// ```
/// use mt_core::GeoPoint;
/// use mt_spatial::RoadNetworkBuilder;
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node(GeoPoint::new(52.52, 13.40));
/// let c = b.add_node(GeoPoint::new(52.53, 13.40));
/// b.add_road(a, c, 1_100.0, 2, Some(13.9));
/// let net = b.build();
/// assert_eq!(net.edge_count(), 2); // bidirectional
/// assert_eq!(net.lanes(net.edge_between(a, c).unwrap()), 2);
/// ```
pub struct RoadNetworkBuilder {
    nodes:     Vec<GeoPoint>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from:      NodeId,
    to:        NodeId,
    length_m:  f64,
    lanes:     u8,
    max_speed: Option<f64>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), raw_edges: Vec::new() }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes:     Vec::with_capacity(nodes),
            raw_edges: Vec::with_capacity(edges),
        }
    }

    /// Add a road node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        id
    }

    /// Add a **directed** edge from `from` to `to`.
    ///
    /// `lanes` of 0 is stored as a single lane.
    pub fn add_directed_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        length_m: f64,
        lanes: u8,
        max_speed: Option<f64>,
    ) {
        self.raw_edges.push(RawEdge { from, to, length_m, lanes: lanes.max(1), max_speed });
    }

    /// Add edges in both directions with the same attributes.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, length_m: f64, lanes: u8, max_speed: Option<f64>) {
        self.add_directed_edge(a, b, length_m, lanes, max_speed);
        self.add_directed_edge(b, a, length_m, lanes, max_speed);
    }

    pub fn node_pos(&self, id: NodeId) -> GeoPoint {
        self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.raw_edges.len() }

    /// Consume the builder and produce a [`RoadNetwork`].
    pub fn build(self) -> RoadNetwork {
        let node_count = self.nodes.len();
        let edge_count = self.raw_edges.len();

        // Stable sort keeps insertion order among a node's outgoing edges.
        let mut raw = self.raw_edges;
        raw.sort_by_key(|e| e.from.0);

        let edge_from:      Vec<NodeId>      = raw.iter().map(|e| e.from).collect();
        let edge_to:        Vec<NodeId>      = raw.iter().map(|e| e.to).collect();
        let edge_length_m:  Vec<f64>         = raw.iter().map(|e| e.length_m).collect();
        let edge_lanes:     Vec<u8>          = raw.iter().map(|e| e.lanes).collect();
        let edge_max_speed: Vec<Option<f64>> = raw.iter().map(|e| e.max_speed).collect();
        let edge_bearing:   Vec<f64>         = raw
            .iter()
            .map(|e| self.nodes[e.from.index()].bearing_to(self.nodes[e.to.index()]))
            .collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edge_count);

        // Reverse CSR: count, prefix-sum, then scatter in ascending EdgeId.
        let mut node_in_start = vec![0u32; node_count + 1];
        for to in &edge_to {
            node_in_start[to.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_in_start[i] += node_in_start[i - 1];
        }
        let mut cursor: Vec<u32> = node_in_start[..node_count].to_vec();
        let mut in_edges = vec![EdgeId::INVALID; edge_count];
        for (i, to) in edge_to.iter().enumerate() {
            let slot = &mut cursor[to.index()];
            in_edges[*slot as usize] = EdgeId(i as u32);
            *slot += 1;
        }

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &pos)| NodeEntry {
                point: [pos.lat, pos.lon],
                id: NodeId(i as u32),
            })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        RoadNetwork {
            node_pos: self.nodes,
            node_out_start,
            node_in_start,
            in_edges,
            edge_from,
            edge_to,
            edge_length_m,
            edge_lanes,
            edge_max_speed,
            edge_bearing,
            spatial_idx,
        }
    }
}

impl Default for RoadNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
