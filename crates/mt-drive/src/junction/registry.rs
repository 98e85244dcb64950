use std::collections::BTreeMap;

use mt_core::{NodeId, VehicleId};
use mt_spatial::SpatialEnvironment;

/// Lead vehicles closer than this to a junction take part in its arrival
/// order.
pub const APPROACH_WINDOW: f64 = 20.0;

/// Per-junction first-come order of the vehicles waiting at it.
///
/// Records are created the first time a junction sees a contender and
/// dropped once nobody is left.  Order is **sticky**: a vehicle keeps its
/// place for as long as it stays in the approach window, and newcomers are
/// appended behind everyone already recorded, sorted among themselves by
/// distance to the stop line and then by `VehicleId`.
#[derive(Clone, Debug)]
pub struct ArrivalRegistry {
    window: f64,
    records: BTreeMap<NodeId, Vec<VehicleId>>,
}

impl Default for ArrivalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrivalRegistry {
    pub fn new() -> Self {
        Self::with_window(APPROACH_WINDOW)
    }

    pub fn with_window(window: f64) -> Self {
        Self { window, records: BTreeMap::new() }
    }

    /// Bring every record in line with the current environment: drop
    /// vehicles that left the approach window, append newcomers.
    ///
    /// Only nodes with more than one incoming edge are tracked.
    pub fn reconcile(&mut self, env: &SpatialEnvironment) {
        let net = env.network();
        let mut present: BTreeMap<NodeId, Vec<(f64, VehicleId)>> = BTreeMap::new();
        for n in 0..net.node_count() {
            let node = NodeId(n as u32);
            if net.in_degree(node) < 2 {
                continue;
            }
            let approaches = env.approaching(node, self.window);
            if !approaches.is_empty() {
                present.insert(node, approaches.iter().map(|a| (a.remaining, a.vehicle)).collect());
            }
        }

        self.records.retain(|node, order| match present.get(node) {
            Some(here) => {
                order.retain(|id| here.iter().any(|&(_, v)| v == *id));
                true
            }
            None => {
                log::trace!("junction {node} cleared");
                false
            }
        });

        for (node, mut arrivals) in present {
            arrivals.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let order = self.records.entry(node).or_default();
            for (_, id) in arrivals {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
        }
    }

    /// Recorded order at `node`, earliest first.
    pub fn order(&self, node: NodeId) -> &[VehicleId] {
        self.records.get(&node).map_or(&[], Vec::as_slice)
    }

    /// The vehicle whose turn it is at `node`.
    #[inline]
    pub fn front(&self, node: NodeId) -> Option<VehicleId> {
        self.order(node).first().copied()
    }

    #[inline]
    pub fn is_front(&self, node: NodeId, id: VehicleId) -> bool {
        self.front(node) == Some(id)
    }

    /// Number of junctions with a live record.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
