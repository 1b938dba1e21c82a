//! Error types for perturbation experiments.

use thiserror::Error;

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing or running an experiment.
#[derive(Debug, Error)]
pub enum Error {
    /// The unperturbed instance could not be solved to proven optimality
    /// and no cached baseline exists.
    #[error("no optimal baseline for instance '{instance}'")]
    BaselineUnattainable {
        /// Instance name.
        instance: String,
    },

    /// A solve was requested while the graph no longer matches the coordinates.
    #[error("graph is stale (built at revision {built}, coordinates at revision {current})")]
    StaleGraph {
        /// Revision the graph was built from.
        built: u64,
        /// Current coordinate revision.
        current: u64,
    },

    /// No graph has been built for the instance yet.
    #[error("graph has not been built")]
    MissingGraph,

    /// Slot index outside the coordinate table.
    #[error("slot {slot} out of range for dimension {dimension}")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Instance dimension.
        dimension: usize,
    },

    /// A solver produced a path that is not a permutation of the nodes.
    #[error("malformed solution: {0}")]
    MalformedSolution(String),

    /// The exact solver backend failed.
    #[error("solver error: {0}")]
    Solver(String),

    /// Invalid run configuration or instance description.
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}
