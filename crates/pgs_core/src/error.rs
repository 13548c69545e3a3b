use thiserror::Error;

/// Errors that abort a simulation call.
///
/// Numerical trouble inside a realization attempt (a singular kriging system,
/// an exhausted conditioning loop) is absorbed by the retry policy and never
/// surfaces here; only structural problems do.
#[derive(Debug, Error)]
pub enum SimError {
    /// Inputs are structurally invalid (shapes, dimensions, parameters).
    #[error("invalid input: {0}")]
    Validation(String),

    /// Conditioning points fall in the same grid cell with different values.
    #[error("inconsistent conditioning data: {0}")]
    InconsistentData(String),

    /// A scenario document could not be read.
    #[error("scenario i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A scenario or record document could not be (de)serialized.
    #[error("document format: {0}")]
    Format(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
