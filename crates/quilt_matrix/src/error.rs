use std::time::Duration;

use thiserror::Error;

use crate::bin::Bin;

/// Failure of a single oracle call. Recorded against the bin that produced it,
/// never fatal for the other bins of the same computation.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle call cancelled")]
    Cancelled,

    #[error("Oracle rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed response: expected {expected:?} cells, got {actual:?}")]
    MalformedResponse {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Cannot compute a matrix without coordinates")]
    EmptyCoordinates,

    #[error("Bin {bin} does not fit {num_coordinates} coordinates")]
    InvalidBin { bin: Bin, num_coordinates: usize },

    #[error("Bin {0} overlaps cells that were already stitched")]
    OverlappingBin(Bin),

    #[error("Partial result for bin {bin} is malformed: expected {expected:?}, got {actual:?}")]
    MalformedPartial {
        bin: Bin,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Matrix is incomplete, {} bin(s) missing", missing.len())]
    IncompleteMatrix { missing: Vec<Bin> },

    #[error("Matrix computation cancelled")]
    Cancelled,
}
