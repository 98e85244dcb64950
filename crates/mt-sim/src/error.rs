use mt_core::{MtError, VehicleId};
use mt_drive::DriveError;
use mt_spatial::SpatialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] MtError),

    /// Fleet slots must hold vehicles in ascending id order, slot `i`
    /// holding `VehicleId(i)`.
    #[error("fleet slot {expected} holds {got}")]
    VehicleIdMismatch { expected: VehicleId, got: VehicleId },

    #[error("spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// A driving error aborts the run; `MoveRejected` in particular means
    /// the environment no longer matches the fleet.
    #[error("driving error: {0}")]
    Drive(#[from] DriveError),
}

pub type SimResult<T> = Result<T, SimError>;
