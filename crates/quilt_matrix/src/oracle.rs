use std::{future::Future, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{bin::Bin, coordinate::Coordinate, error::OracleError};

/// Row-major matrix as returned by a table service, `None` where no route exists.
pub type LocalMatrix = Vec<Vec<Option<f64>>>;

/// A table query over the full coordinate list, optionally restricted to a block
/// of sources and destinations. Without restrictions the oracle answers for all
/// pairs.
#[derive(Debug, Clone, Copy)]
pub struct TableRequest<'a> {
    pub coordinates: &'a [Coordinate],
    pub sources: Option<&'a Range<usize>>,
    pub destinations: Option<&'a Range<usize>>,
}

impl<'a> TableRequest<'a> {
    pub fn for_bin(coordinates: &'a [Coordinate], bin: &'a Bin) -> Self {
        Self {
            coordinates,
            sources: Some(&bin.sources),
            destinations: Some(&bin.destinations),
        }
    }

    pub fn full(coordinates: &'a [Coordinate]) -> Self {
        Self {
            coordinates,
            sources: None,
            destinations: None,
        }
    }

    pub fn source_range(&self) -> Range<usize> {
        self.sources.cloned().unwrap_or(0..self.coordinates.len())
    }

    pub fn destination_range(&self) -> Range<usize> {
        self.destinations
            .cloned()
            .unwrap_or(0..self.coordinates.len())
    }

    pub fn source_coordinates(&self) -> &'a [Coordinate] {
        &self.coordinates[self.source_range()]
    }

    pub fn destination_coordinates(&self) -> &'a [Coordinate] {
        &self.coordinates[self.destination_range()]
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.source_range().len(), self.destination_range().len())
    }
}

/// Durations in seconds and distances in meters for one table query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TableResponse {
    pub durations: LocalMatrix,
    pub distances: LocalMatrix,
}

fn matrix_shape(matrix: &LocalMatrix) -> Option<(usize, usize)> {
    let columns = matrix.first().map_or(0, Vec::len);
    matrix
        .iter()
        .all(|row| row.len() == columns)
        .then_some((matrix.len(), columns))
}

impl TableResponse {
    /// Checks both matrices have exactly `expected` rows and columns.
    pub fn check_shape(&self, expected: (usize, usize)) -> Result<(), OracleError> {
        for matrix in [&self.durations, &self.distances] {
            // ragged rows are reported with the row count and no columns
            let actual = matrix_shape(matrix).unwrap_or((matrix.len(), 0));
            if actual != expected {
                return Err(OracleError::MalformedResponse { expected, actual });
            }
        }

        Ok(())
    }
}

/// The external service computing travel durations and distances.
pub trait MatrixOracle {
    fn table(
        &self,
        request: TableRequest<'_>,
    ) -> impl Future<Output = Result<TableResponse, OracleError>> + Send;
}
