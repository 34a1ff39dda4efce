use thiserror::Error;

/// Failures of a solving tier. A problem that cannot hold any tile is not an
/// error: solvers answer it with an empty solution carrying a reason.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("ILP backend not compiled in (enable the `ilp` feature)")]
    BackendUnavailable,

    #[error("ILP model has {candidates} candidate placements, limit is {limit}")]
    ModelTooLarge { candidates: usize, limit: usize },

    #[error("ILP backend failed: {0}")]
    Backend(String),
}
