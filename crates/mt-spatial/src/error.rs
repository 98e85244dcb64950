//! Spatial-subsystem error type.

use thiserror::Error;

use mt_core::{EdgeId, NodeId, VehicleId};

/// Errors produced by `mt-spatial`.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    #[error("edge {0} not found in network")]
    EdgeNotFound(EdgeId),

    #[error("{0} is not placed in the environment")]
    EntityNotFound(VehicleId),

    #[error("{0} is already placed in the environment")]
    EntityExists(VehicleId),

    #[error("lane {lane} out of range on {edge} ({lanes} lanes)")]
    LaneOutOfRange { edge: EdgeId, lane: u8, lanes: u8 },

    #[error("position {position} m out of range on {edge} (length {length} m)")]
    PositionOutOfRange { edge: EdgeId, position: f64, length: f64 },

    #[error("route has no stops")]
    EmptyRoute,

    #[error("route is not contiguous: {from} does not end where {to} starts")]
    DisconnectedRoute { from: EdgeId, to: EdgeId },

    #[error("{vehicle} is on {actual} but its route starts with {expected}")]
    RouteMismatch { vehicle: VehicleId, expected: EdgeId, actual: EdgeId },

    #[error("invalid distance {0} m")]
    InvalidDistance(f64),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
