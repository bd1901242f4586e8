use tracing::{debug, warn};

use crate::{
    bin::Bin,
    dispatcher::BinOutcome,
    error::{MatrixError, OracleError},
    matrix::Matrix,
    oracle::TableResponse,
    travel_matrices::TravelMatrices,
};

/// A bin whose oracle call failed, its cells are left unwritten.
#[derive(Debug)]
pub struct BinFailure {
    pub bin: Bin,
    pub error: OracleError,
}

/// Result of a chunked computation, possibly with holes where bins failed.
#[derive(Debug)]
pub struct StitchedMatrices {
    pub durations: Matrix,
    pub distances: Matrix,
    pub failures: Vec<BinFailure>,
}

impl StitchedMatrices {
    pub fn num_coordinates(&self) -> usize {
        self.durations.size()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.durations.is_complete() && self.distances.is_complete()
    }

    /// Index ranges that have to be requested again to complete the matrices,
    /// in row-major order.
    pub fn missing_bins(&self) -> Vec<Bin> {
        let mut bins: Vec<Bin> = self
            .failures
            .iter()
            .map(|failure| failure.bin.clone())
            .collect();
        bins.sort_by_key(|bin| (bin.sources.start, bin.destinations.start));
        bins
    }

    pub fn into_travel_matrices(self) -> Result<TravelMatrices, MatrixError> {
        if !self.is_complete() {
            return Err(MatrixError::IncompleteMatrix {
                missing: self.missing_bins(),
            });
        }

        Ok(TravelMatrices {
            num_locations: self.num_coordinates(),
            durations: self.durations.into_values(),
            distances: self.distances.into_values(),
        })
    }

    /// Reopens the matrices so more bins can be merged in, keeping recorded failures.
    pub fn into_stitcher(self) -> Stitcher {
        Stitcher {
            durations: self.durations,
            distances: self.distances,
            failures: self.failures,
        }
    }
}

impl TryFrom<TravelMatrices> for StitchedMatrices {
    type Error = MatrixError;

    fn try_from(matrices: TravelMatrices) -> Result<Self, Self::Error> {
        if !matrices.is_consistent() {
            return Err(MatrixError::Configuration(format!(
                "matrices for {0} locations must hold {0}x{0} cells",
                matrices.num_locations
            )));
        }

        Ok(StitchedMatrices {
            durations: Matrix::from_values(matrices.num_locations, matrices.durations),
            distances: Matrix::from_values(matrices.num_locations, matrices.distances),
            failures: Vec::new(),
        })
    }
}

/// Assembles per-bin partial matrices into the global matrices.
pub struct Stitcher {
    durations: Matrix,
    distances: Matrix,
    failures: Vec<BinFailure>,
}

impl Stitcher {
    pub fn new(num_coordinates: usize) -> Self {
        Self {
            durations: Matrix::new(num_coordinates),
            distances: Matrix::new(num_coordinates),
            failures: Vec::new(),
        }
    }

    pub fn num_coordinates(&self) -> usize {
        self.durations.size()
    }

    /// Copies the local matrices of `bin` to their global position.
    ///
    /// Nothing is written when the response does not match the bin or when any
    /// cell of the bin was already stitched.
    pub fn merge(&mut self, bin: &Bin, response: &TableResponse) -> Result<(), MatrixError> {
        bin.validate(self.num_coordinates())?;

        if let Err(OracleError::MalformedResponse { expected, actual }) =
            response.check_shape(bin.shape())
        {
            return Err(MatrixError::MalformedPartial {
                bin: bin.clone(),
                expected,
                actual,
            });
        }

        if bin
            .cells()
            .any(|(source, dest)| self.durations.is_written(source, dest))
        {
            return Err(MatrixError::OverlappingBin(bin.clone()));
        }

        let min_source = bin.sources.start;
        let min_dest = bin.destinations.start;

        for (source, dest) in bin.cells() {
            let (row, column) = (source - min_source, dest - min_dest);
            self.durations.set(source, dest, response.durations[row][column]);
            self.distances.set(source, dest, response.distances[row][column]);
        }

        self.failures.retain(|failure| failure.bin != *bin);

        debug!("Stitched bin {}", bin);

        Ok(())
    }

    pub fn record_failure(&mut self, bin: Bin, error: OracleError) {
        warn!("Bin {} failed: {}", bin, error);

        self.failures.retain(|failure| failure.bin != bin);
        self.failures.push(BinFailure { bin, error });
    }

    pub fn apply(&mut self, outcome: BinOutcome) -> Result<(), MatrixError> {
        match outcome.result {
            Ok(response) => self.merge(&outcome.bin, &response),
            Err(error) => {
                self.record_failure(outcome.bin, error);
                Ok(())
            }
        }
    }

    pub fn finish(self) -> StitchedMatrices {
        StitchedMatrices {
            durations: self.durations,
            distances: self.distances,
            failures: self.failures,
        }
    }
}

/// Stitches a set of successful partial results, order does not matter.
pub fn stitch<I>(num_coordinates: usize, partials: I) -> Result<StitchedMatrices, MatrixError>
where
    I: IntoIterator<Item = (Bin, TableResponse)>,
{
    let mut stitcher = Stitcher::new(num_coordinates);

    for (bin, response) in partials {
        stitcher.merge(&bin, &response)?;
    }

    Ok(stitcher.finish())
}
