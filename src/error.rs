//! Error types for the numerical core and for the data sources feeding it.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of padding, interpolation, coordinate mapping and projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliceError {
    #[error("field is empty")]
    EmptyField,
    #[error("field must be cubic, got shape {shape:?}")]
    NonCubic { shape: Vec<usize> },
    #[error("field must have rank 3, got rank {rank}")]
    WrongRank { rank: usize },
    #[error("flat field data has length {got}, expected {expected}")]
    FlatLength { expected: usize, got: usize },
    #[error("point {point:?} lies outside the unit cube")]
    OutOfBounds { point: [f64; 3] },
    #[error(
        "k-point {point:?} does not lie in the plane (out-of-plane component {residual:e}, tolerance {tolerance:e})"
    )]
    NotInPlane {
        point: [f64; 3],
        residual: f64,
        tolerance: f64,
    },
    #[error("plane basis vectors are parallel or zero")]
    DegeneratePlane,
    #[error("lattice transform is not invertible")]
    SingularTransform,
    #[error("point batch must have 3 columns, got {cols}")]
    BadPointBatch { cols: usize },
    #[error("resolution must be at least 1")]
    BadResolution,
}

/// Failures while fetching calculation results from disk or a results store.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("missing {what}")]
    Missing { what: String },
    #[error("source unavailable: {path}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },
}

impl DataError {
    pub fn malformed(what: impl Into<String>, reason: impl ToString) -> Self {
        DataError::Malformed {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}
