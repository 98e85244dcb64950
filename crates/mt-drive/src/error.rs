use mt_core::VehicleId;
use mt_spatial::SpatialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    /// A required physical parameter is missing or degenerate.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0} has no route")]
    MissingRoute(VehicleId),

    /// The environment refused a move the handle had already committed to.
    /// The vehicle's state is no longer trustworthy.
    #[error("environment rejected the move of {vehicle}: {source}")]
    MoveRejected {
        vehicle: VehicleId,
        #[source]
        source: SpatialError,
    },

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

pub type DriveResult<T> = Result<T, DriveError>;
