use std::ops::Range;

use quilt_matrix::{
    error::OracleError,
    oracle::{LocalMatrix, MatrixOracle, TableRequest, TableResponse},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OsrmError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OSRM error: {code} - {message}")]
    Api { code: String, message: String },

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Incomplete response")]
    IncompleteResponse,
}

/// Codes OSRM uses when the request itself is at fault, retrying won't help.
const REJECTION_CODES: [&str; 4] = ["InvalidQuery", "InvalidOptions", "InvalidValue", "TooBig"];

impl From<OsrmError> for OracleError {
    fn from(error: OsrmError) -> Self {
        match error {
            OsrmError::Api { code, message } if REJECTION_CODES.contains(&code.as_str()) => {
                OracleError::Rejected(format!("{code}: {message}"))
            }
            other => OracleError::Provider(anyhow::Error::new(other)),
        }
    }
}

#[derive(Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    /// Travel times in seconds
    durations: Option<LocalMatrix>,
    /// Distances in meters
    distances: Option<LocalMatrix>,
}

pub struct OsrmMatrixClientParams {
    pub osrm_url: String,
    pub profile: String,
}

impl Default for OsrmMatrixClientParams {
    fn default() -> Self {
        Self {
            osrm_url: String::from("http://localhost:5000"),
            profile: String::from("driving"),
        }
    }
}

pub const OSRM_TABLE_API_PATH: &str = "/table/v1/";

pub struct OsrmMatrixClient {
    params: OsrmMatrixClientParams,
    client: reqwest::Client,
}

fn join_indices(range: &Range<usize>) -> String {
    range
        .clone()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

impl OsrmMatrixClient {
    pub fn new(params: OsrmMatrixClientParams) -> Self {
        Self {
            params,
            client: reqwest::Client::new(),
        }
    }

    /// Builds the table URL, the whole coordinate list is always sent and the
    /// optional ranges restrict which rows and columns get computed.
    pub fn table_url<P>(
        &self,
        points: &[P],
        sources: Option<&Range<usize>>,
        destinations: Option<&Range<usize>>,
    ) -> String
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let mut url = self.params.osrm_url.trim_end_matches('/').to_string();
        url.push_str(OSRM_TABLE_API_PATH);
        url.push_str(&self.params.profile);
        url.push('/');

        let coordinates = points
            .iter()
            .map(|point| {
                let point: geo_types::Point = point.into();
                format!("{},{}", point.x(), point.y())
            })
            .collect::<Vec<_>>()
            .join(";");
        url.push_str(&coordinates);

        url.push_str("?annotations=duration,distance");

        if let Some(sources) = sources {
            url.push_str("&sources=");
            url.push_str(&join_indices(sources));
        }

        if let Some(destinations) = destinations {
            url.push_str("&destinations=");
            url.push_str(&join_indices(destinations));
        }

        url
    }

    pub async fn fetch_table<P>(
        &self,
        points: &[P],
        sources: Option<&Range<usize>>,
        destinations: Option<&Range<usize>>,
    ) -> Result<TableResponse, OsrmError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let url = self.table_url(points, sources, destinations);

        debug!(
            "OSRM: table request for {} points, sources={:?} destinations={:?}",
            points.len(),
            sources,
            destinations
        );

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let table: OsrmTableResponse = match serde_json::from_str(&body) {
            Ok(table) => table,
            Err(_) if !status.is_success() => {
                return Err(OsrmError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(_) => return Err(OsrmError::IncompleteResponse),
        };

        if table.code != "Ok" {
            return Err(OsrmError::Api {
                code: table.code,
                message: table.message.unwrap_or_default(),
            });
        }

        let durations = table.durations.ok_or(OsrmError::IncompleteResponse)?;
        let distances = table.distances.ok_or(OsrmError::IncompleteResponse)?;

        Ok(TableResponse {
            durations,
            distances,
        })
    }
}

impl MatrixOracle for OsrmMatrixClient {
    async fn table(&self, request: TableRequest<'_>) -> Result<TableResponse, OracleError> {
        let response = self
            .fetch_table(request.coordinates, request.sources, request.destinations)
            .await?;

        Ok(response)
    }
}
