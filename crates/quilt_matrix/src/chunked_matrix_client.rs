use std::{pin::pin, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    bin::{Bin, tile},
    coordinate::Coordinate,
    dispatcher::{BinOutcome, DispatchParams, call_oracle, dispatch_stream, next_or_cancelled},
    error::MatrixError,
    oracle::{MatrixOracle, TableRequest},
    stitcher::{StitchedMatrices, Stitcher},
    travel_matrices::TravelMatrices,
};

/// Called with `(completed bins, total bins)` every time a bin settles.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Clone, Debug)]
pub struct ChunkedMatrixParams {
    /// Side length of the square bins requested from the oracle
    pub chunk_size: usize,
    pub parallelism: usize,
    pub call_timeout: Option<Duration>,
}

impl Default for ChunkedMatrixParams {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            parallelism: 4,
            call_timeout: None,
        }
    }
}

impl ChunkedMatrixParams {
    pub fn dispatch_params(&self) -> DispatchParams {
        DispatchParams {
            parallelism: self.parallelism,
            call_timeout: self.call_timeout,
        }
    }
}

/// Computes full matrices by tiling the coordinates, querying the oracle bin by bin
/// and stitching the partial results as they arrive.
pub struct ChunkedMatrixClient<O> {
    oracle: O,
    params: ChunkedMatrixParams,
    on_progress: Option<ProgressCallback>,
}

impl<O> ChunkedMatrixClient<O>
where
    O: MatrixOracle,
{
    pub fn new(oracle: O, params: ChunkedMatrixParams) -> Self {
        Self {
            oracle,
            params,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn params(&self) -> &ChunkedMatrixParams {
        &self.params
    }

    pub async fn compute(
        &self,
        coordinates: &[Coordinate],
    ) -> Result<StitchedMatrices, MatrixError> {
        self.compute_with_cancel(coordinates, &CancellationToken::new()).await
    }

    #[instrument(skip_all, fields(num_coordinates = coordinates.len()))]
    pub async fn compute_with_cancel(
        &self,
        coordinates: &[Coordinate],
        cancel: &CancellationToken,
    ) -> Result<StitchedMatrices, MatrixError> {
        let bins = tile(coordinates.len(), self.params.chunk_size)?;

        info!(
            "Computing {}x{} matrices in {} bins (chunk_size={}, parallelism={})",
            coordinates.len(),
            coordinates.len(),
            bins.len(),
            self.params.chunk_size,
            self.params.parallelism
        );

        self.run(coordinates, &bins, Stitcher::new(coordinates.len()), cancel)
            .await
    }

    /// Computes and requires every cell to be present.
    pub async fn compute_complete(
        &self,
        coordinates: &[Coordinate],
    ) -> Result<TravelMatrices, MatrixError> {
        self.compute(coordinates).await?.into_travel_matrices()
    }

    /// Asks the oracle for the whole matrix in a single call, without tiling.
    pub async fn compute_single_shot(
        &self,
        coordinates: &[Coordinate],
    ) -> Result<StitchedMatrices, MatrixError> {
        self.compute_single_shot_with_cancel(coordinates, &CancellationToken::new()).await
    }

    #[instrument(skip_all, fields(num_coordinates = coordinates.len()))]
    pub async fn compute_single_shot_with_cancel(
        &self,
        coordinates: &[Coordinate],
        cancel: &CancellationToken,
    ) -> Result<StitchedMatrices, MatrixError> {
        if coordinates.is_empty() {
            return Err(MatrixError::EmptyCoordinates);
        }
        self.params.dispatch_params().validate()?;

        let start = std::time::Instant::now();
        let call = call_oracle(
            &self.oracle,
            TableRequest::full(coordinates),
            self.params.call_timeout,
        );
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MatrixError::Cancelled),
            result = call => result,
        };

        let mut stitcher = Stitcher::new(coordinates.len());
        stitcher.apply(BinOutcome {
            bin: Bin::full(coordinates.len()),
            result,
        })?;

        info!("Single table request done in {:?}", start.elapsed());

        Ok(stitcher.finish())
    }

    /// Requests again only the bins that failed in `matrices` and merges the
    /// successful ones. Bins failing again stay recorded as failures.
    #[instrument(skip_all, fields(failures = matrices.failures.len()))]
    pub async fn retry_failed(
        &self,
        coordinates: &[Coordinate],
        matrices: StitchedMatrices,
        cancel: &CancellationToken,
    ) -> Result<StitchedMatrices, MatrixError> {
        if matrices.num_coordinates() != coordinates.len() {
            return Err(MatrixError::Configuration(format!(
                "matrices were computed for {} coordinates, got {}",
                matrices.num_coordinates(),
                coordinates.len()
            )));
        }

        let bins = matrices.missing_bins();
        if bins.is_empty() {
            return Ok(matrices);
        }

        info!("Retrying {} failed bins", bins.len());

        self.run(coordinates, &bins, matrices.into_stitcher(), cancel).await
    }

    async fn run(
        &self,
        coordinates: &[Coordinate],
        bins: &[Bin],
        mut stitcher: Stitcher,
        cancel: &CancellationToken,
    ) -> Result<StitchedMatrices, MatrixError> {
        let start = std::time::Instant::now();
        let total = bins.len();
        let mut completed = 0;

        let mut stream = pin!(dispatch_stream(
            &self.oracle,
            coordinates,
            bins,
            self.params.dispatch_params()
        )?);

        while let Some((_, outcome)) = next_or_cancelled(&mut stream, cancel).await? {
            stitcher.apply(outcome)?;

            completed += 1;
            if let Some(on_progress) = &self.on_progress {
                on_progress(completed, total);
            }
        }

        let stitched = stitcher.finish();

        if stitched.failures.is_empty() {
            info!("Stitched {} bins in {:?}", total, start.elapsed());
        } else {
            warn!(
                "Stitched {} bins in {:?}, {} failed",
                total,
                start.elapsed(),
                stitched.failures.len()
            );
        }

        Ok(stitched)
    }
}
