use thiserror::Error;

/// Top-level error type for the bevel kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors related to mesh topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Errors related to mesh operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Errors raised while validating bevel parameters, before any mesh access.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("segment count must be at least 1, got {0}")]
    InvalidSegments(usize),

    #[error("invalid offset {value} for {mode} mode")]
    InvalidOffset { value: f64, mode: &'static str },

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("unsupported miter pattern: {0}")]
    UnsupportedMiter(String),

    #[error("spread must be finite and non-negative, got {0}")]
    InvalidSpread(f64),
}

/// Convenience type alias for results using [`KernelError`].
pub type Result<T> = std::result::Result<T, KernelError>;
