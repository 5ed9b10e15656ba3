use spacer_smt::mbp::ProjectionError;
use thiserror::Error;

/// Errors surfaced by the generalization engine.
///
/// Expected negative outcomes (no cluster, not inductive, projection left
/// variables behind) are not errors; they are reported through
/// [`crate::generalizers::GenOutcome`] and
/// [`crate::cluster_finder::ClusterOutcome`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Invariant violation: {0}")]
    Invariant(String),
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Reasons the convex closure could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    #[error("convex closure needs at least one dimension")]
    ZeroDimension,
    #[error("dimension {0} has no name")]
    UnnamedDimension(usize),
    #[error("dimension {index} out of range for {dims} dimensions")]
    DimensionOutOfRange { index: usize, dims: usize },
    #[error("point has {got} coordinates, expected {expected}")]
    PointArity { expected: usize, got: usize },
    #[error("no points to close over")]
    NoPoints,
}
