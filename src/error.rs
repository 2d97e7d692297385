//! Error types for the radar-volume-analysis crate.
use thiserror::Error;

/// Error type for the crate.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum AnalysisError {
    /// Requested height-range bounds are not increasing or fall outside the interpolated volume.
    #[error("Height bounds are not increasing or exceed the volume dimensions.")]
    InvalidBounds,
    /// A CRS argument was neither a known identifier nor a projection definition.
    #[error("Unrecognized coordinate reference system: {0}")]
    UnsupportedCrs(String),
    /// A cartesian grid could not be constructed from the given parameters.
    #[error("Invalid cartesian grid: {0}")]
    InvalidGrid(&'static str),
    /// The scan contained no elevation slices to build a volume from.
    #[error("Scan contains no elevation slices.")]
    EmptyScan,
    /// A raw slice's geometry disagrees with its own metadata.
    #[error("Slice geometry does not match its metadata: {0}")]
    ShapeMismatch(&'static str),
    /// Bad or invalid input.
    #[error("Invalid input.")]
    InvalidInput,

    /// Forward a timestamp parsing error from the chrono crate.
    #[error("Could not parse the scan timestamp: {0}")]
    Timestamp(#[from] chrono::format::ParseError),
}

/// Shorthand for results.
pub type Result<T> = std::result::Result<T, AnalysisError>;
