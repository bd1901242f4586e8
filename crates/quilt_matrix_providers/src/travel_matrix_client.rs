use std::borrow::Cow;

use anyhow::Context;
use quilt_matrix::{
    chunked_matrix_client::{ChunkedMatrixClient, ChunkedMatrixParams, ProgressCallback},
    coordinate::Coordinate,
    error::MatrixError,
    oracle::MatrixOracle,
    stitcher::StitchedMatrices,
    travel_matrices::TravelMatrices,
};
use quilt_osrm::client::{OsrmMatrixClient, OsrmMatrixClientParams};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    as_the_crow_flies::AsTheCrowFliesOracle,
    cache::MatricesCache,
    custom_matrices::CustomMatricesOracle,
    graphhopper_api::{GraphHopperMatrixClient, GraphhopperMatrixClientParams},
    travel_matrix_provider::TravelMatrixProvider,
};

const GRAPHHOPPER_API_KEY_ENV_VAR: &str = "GRAPHHOPPER_API_KEY";
const OSRM_URL_ENV_VAR: &str = "OSRM_URL";

/// Fetches matrices from any provider, going through the cache first.
pub struct TravelMatrixClient<C> {
    cache: C,
    params: ChunkedMatrixParams,
    single_shot: bool,
    max_retries: usize,
    graphhopper_api_key: Option<String>,
    osrm_url: String,
    on_progress: Option<ProgressCallback>,
}

impl<C> TravelMatrixClient<C>
where
    C: MatricesCache,
{
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            params: ChunkedMatrixParams::default(),
            single_shot: false,
            max_retries: 0,
            graphhopper_api_key: std::env::var(GRAPHHOPPER_API_KEY_ENV_VAR).ok(),
            osrm_url: std::env::var(OSRM_URL_ENV_VAR)
                .unwrap_or_else(|_| OsrmMatrixClientParams::default().osrm_url),
            on_progress: None,
        }
    }

    pub fn with_params(mut self, params: ChunkedMatrixParams) -> Self {
        self.params = params;
        self
    }

    /// Requests the whole matrix in one oracle call instead of tiling it.
    pub fn with_single_shot(mut self, single_shot: bool) -> Self {
        self.single_shot = single_shot;
        self
    }

    /// How many times failed bins are requested again before giving up.
    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn with_graphhopper_api_key(mut self, api_key: String) -> Self {
        self.graphhopper_api_key = Some(api_key);
        self
    }

    pub fn with_osrm_url(mut self, osrm_url: String) -> Self {
        self.osrm_url = osrm_url;
        self
    }

    pub fn params(&self) -> &ChunkedMatrixParams {
        &self.params
    }

    /// Fills in the server an OSRM provider without `url` is sent to, so cache
    /// entries of different servers do not collide.
    fn resolve_provider<'a>(
        &self,
        provider: &'a TravelMatrixProvider,
    ) -> Cow<'a, TravelMatrixProvider> {
        match provider {
            TravelMatrixProvider::Osrm { url: None, profile } => {
                Cow::Owned(TravelMatrixProvider::Osrm {
                    url: Some(self.osrm_url.clone()),
                    profile: profile.clone(),
                })
            }
            _ => Cow::Borrowed(provider),
        }
    }

    /// Fetches matrices and fails unless every cell could be computed.
    pub async fn fetch_matrix<P>(
        &self,
        points: &[P],
        provider: &TravelMatrixProvider,
    ) -> anyhow::Result<TravelMatrices>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let matrices = self
            .fetch_partial(points, provider, &CancellationToken::new())
            .await?;

        Ok(matrices.into_travel_matrices()?)
    }

    /// Fetches matrices, keeping the regions of failed bins flagged as missing.
    /// Only complete matrices are written to the cache.
    #[instrument(skip_all, fields(provider = %provider, num_points = points.len()))]
    pub async fn fetch_partial<P>(
        &self,
        points: &[P],
        provider: &TravelMatrixProvider,
        cancel: &CancellationToken,
    ) -> anyhow::Result<StitchedMatrices>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let provider = self.resolve_provider(provider);
        let provider = provider.as_ref();

        match self.cache.get_cached(provider, points) {
            Ok(Some(matrices)) => {
                info!("Using cached matrices for {} points", points.len());
                return Ok(StitchedMatrices::try_from(matrices)?);
            }
            Ok(None) => {}
            Err(error) => warn!("Matrices cache lookup failed: {error:#}"),
        }

        let coordinates: Vec<Coordinate> = points
            .iter()
            .map(|p| {
                let point: geo_types::Point = p.into();
                Coordinate::new(point.x(), point.y())
            })
            .collect();

        let stitched = match provider {
            TravelMatrixProvider::Osrm { url, profile } => {
                let oracle = OsrmMatrixClient::new(OsrmMatrixClientParams {
                    osrm_url: url.clone().unwrap_or_else(|| self.osrm_url.clone()),
                    profile: profile.clone(),
                });
                self.compute(oracle, &coordinates, cancel).await?
            }
            TravelMatrixProvider::GraphHopperApi { gh_profile } => {
                let api_key = self
                    .graphhopper_api_key
                    .clone()
                    .with_context(|| format!("{GRAPHHOPPER_API_KEY_ENV_VAR} is not set"))?;
                let oracle = GraphHopperMatrixClient::new(GraphhopperMatrixClientParams::new(
                    api_key,
                    *gh_profile,
                ));
                self.compute(oracle, &coordinates, cancel).await?
            }
            TravelMatrixProvider::AsTheCrowFlies { speed_kmh } => {
                anyhow::ensure!(
                    speed_kmh.is_finite() && *speed_kmh > 0.0,
                    "speed_kmh must be positive, got {speed_kmh}"
                );
                let oracle = AsTheCrowFliesOracle::new(*speed_kmh);
                self.compute(oracle, &coordinates, cancel).await?
            }
            TravelMatrixProvider::Custom { matrices } => {
                let oracle = CustomMatricesOracle::new(matrices);
                oracle.validate(coordinates.len())?;
                self.compute(oracle, &coordinates, cancel).await?
            }
        };

        if !stitched.is_complete() {
            return Ok(stitched);
        }

        let matrices = stitched.into_travel_matrices()?;
        if let Err(error) = self.cache.cache(provider, points, &matrices) {
            warn!("Could not cache matrices: {error:#}");
        }

        Ok(StitchedMatrices::try_from(matrices)?)
    }

    async fn compute<O>(
        &self,
        oracle: O,
        coordinates: &[Coordinate],
        cancel: &CancellationToken,
    ) -> Result<StitchedMatrices, MatrixError>
    where
        O: MatrixOracle,
    {
        let mut client = ChunkedMatrixClient::new(oracle, self.params.clone());
        if let Some(on_progress) = &self.on_progress {
            client = client.with_progress(on_progress.clone());
        }

        let mut matrices = if self.single_shot {
            client
                .compute_single_shot_with_cancel(coordinates, cancel)
                .await?
        } else {
            client.compute_with_cancel(coordinates, cancel).await?
        };

        for attempt in 1..=self.max_retries {
            if matrices.is_complete() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(MatrixError::Cancelled);
            }

            warn!(
                "Retry {}/{}: {} bins failed",
                attempt,
                self.max_retries,
                matrices.failures.len()
            );
            matrices = client.retry_failed(coordinates, matrices, cancel).await?;
        }

        Ok(matrices)
    }
}
