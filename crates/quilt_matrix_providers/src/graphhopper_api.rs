use std::{fmt::Display, ops::Range, time::Duration};

use quilt_matrix::{
    error::OracleError,
    oracle::{LocalMatrix, MatrixOracle, TableRequest, TableResponse},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub type GHPoint = [f64; 2];

#[derive(Deserialize, Serialize, JsonSchema, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GraphHopperProfile {
    Car,
    Bike,
    Foot,
    SmallTruck,
    Truck,
}

impl Display for GraphHopperProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                GraphHopperProfile::Car => "car",
                GraphHopperProfile::Bike => "bike",
                GraphHopperProfile::Foot => "foot",
                GraphHopperProfile::SmallTruck => "small_truck",
                GraphHopperProfile::Truck => "truck",
            }
        )
    }
}

#[derive(Debug, Error)]
pub enum GraphHopperError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Job failed with status: {0}")]
    JobFailed(String),

    #[error("Polling timeout after {0} attempts")]
    Timeout(u32),

    #[error("Point range {range:?} out of bounds for {num_points} points")]
    OutOfBounds {
        range: Range<usize>,
        num_points: usize,
    },
}

impl From<GraphHopperError> for OracleError {
    fn from(error: GraphHopperError) -> Self {
        match error {
            // 429 means the quota is exhausted for now, any other 4xx is on the request
            GraphHopperError::Api { status, message }
                if (400..500).contains(&status) && status != 429 =>
            {
                OracleError::Rejected(format!("{status}: {message}"))
            }
            other @ GraphHopperError::OutOfBounds { .. } => {
                OracleError::Rejected(other.to_string())
            }
            other => OracleError::Provider(anyhow::Error::new(other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixRequestBody {
    /// Points for symmetric matrix (all-to-all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<GHPoint>>,

    /// Source points, rows of the returned arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_points: Option<Vec<GHPoint>>,

    /// Destination points, columns of the returned arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_points: Option<Vec<GHPoint>>,

    /// Which arrays to return: "weights", "times", "distances"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_arrays: Option<Vec<String>>,

    /// Routing profile (e.g., "car", "bike", "foot")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Fail fast on unreachable points, otherwise unreachable cells are null
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,
}

impl MatrixRequestBody {
    /// Number of rows and columns the solution arrays will have.
    pub fn shape(&self) -> (usize, usize) {
        match &self.points {
            Some(points) => (points.len(), points.len()),
            None => (
                self.from_points.as_ref().map_or(0, Vec::len),
                self.to_points.as_ref().map_or(0, Vec::len),
            ),
        }
    }
}

#[derive(Deserialize)]
struct MatrixSolution {
    /// Travel times in seconds
    pub times: LocalMatrix,

    /// Distances in meters
    pub distances: LocalMatrix,
}

#[derive(Deserialize)]
struct AsyncMatrixJobResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct AsyncMatrixResponse {
    status: String,
    solution: Option<MatrixSolution>,
}

pub struct GraphhopperMatrixClientParams {
    pub api_key: String,
    pub api_url: String,
    pub profile: GraphHopperProfile,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl GraphhopperMatrixClientParams {
    pub fn new(api_key: String, profile: GraphHopperProfile) -> Self {
        Self {
            api_key,
            api_url: String::from(GRAPHHOPPER_API_URL),
            profile,
            max_poll_attempts: 40, // max 20s, already really long time
            poll_interval: Duration::from_millis(500),
        }
    }
}

pub const GRAPHHOPPER_API_URL: &str = "https://graphhopper.com/api/1";

/// Requests with fewer points on both sides use the synchronous endpoint.
const SYNC_MAX_POINTS: usize = 25;

pub struct GraphHopperMatrixClient {
    params: GraphhopperMatrixClientParams,
    client: reqwest::Client,
}

fn to_gh_points<P>(points: &[P]) -> Vec<GHPoint>
where
    for<'a> &'a P: Into<geo_types::Point>,
{
    points
        .iter()
        .map(|p| {
            let point: geo_types::Point = p.into();
            [point.x(), point.y()]
        })
        .collect()
}

impl GraphHopperMatrixClient {
    pub fn new(params: GraphhopperMatrixClientParams) -> Self {
        Self {
            params,
            client: reqwest::Client::new(),
        }
    }

    pub fn request_body<P>(
        &self,
        points: &[P],
        sources: Option<&Range<usize>>,
        destinations: Option<&Range<usize>>,
    ) -> Result<MatrixRequestBody, GraphHopperError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let gh_points = to_gh_points(points);
        let subset = |range: Option<&Range<usize>>| match range {
            Some(range) => gh_points
                .get(range.clone())
                .map(<[GHPoint]>::to_vec)
                .ok_or(GraphHopperError::OutOfBounds {
                    range: range.clone(),
                    num_points: points.len(),
                }),
            None => Ok(gh_points.clone()),
        };

        let (all_points, from_points, to_points) = if sources.is_none() && destinations.is_none()
        {
            (Some(gh_points.clone()), None, None)
        } else {
            (None, Some(subset(sources)?), Some(subset(destinations)?))
        };

        Ok(MatrixRequestBody {
            points: all_points,
            from_points,
            to_points,
            out_arrays: Some(vec!["times".to_string(), "distances".to_string()]),
            profile: Some(self.params.profile.to_string()),
            fail_fast: Some(false),
        })
    }

    pub async fn fetch_table<P>(
        &self,
        points: &[P],
        sources: Option<&Range<usize>>,
        destinations: Option<&Range<usize>>,
    ) -> Result<TableResponse, GraphHopperError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let body = self.request_body(points, sources, destinations)?;
        let (rows, columns) = body.shape();

        let solution = if rows.max(columns) < SYNC_MAX_POINTS {
            self.sync_matrix_request(&body).await?
        } else {
            self.async_matrix_request(&body).await?
        };

        Ok(TableResponse {
            durations: solution.times,
            distances: solution.distances,
        })
    }

    async fn sync_matrix_request(
        &self,
        body: &MatrixRequestBody,
    ) -> Result<MatrixSolution, GraphHopperError> {
        let response = self
            .client
            .post(format!("{}/matrix", self.params.api_url))
            .query(&[("key", &self.params.api_key)])
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn async_matrix_request(
        &self,
        body: &MatrixRequestBody,
    ) -> Result<MatrixSolution, GraphHopperError> {
        let post_response = self
            .client
            .post(format!("{}/matrix/calculate", self.params.api_url))
            .query(&[("key", &self.params.api_key)])
            .json(body)
            .send()
            .await?;

        if !post_response.status().is_success() {
            let status = post_response.status().as_u16();
            let message = post_response.text().await.unwrap_or_default();
            return Err(GraphHopperError::Api { status, message });
        }

        let job_response: AsyncMatrixJobResponse = post_response.json().await?;

        debug!("GraphHopperApi: Posted matrix job {}", job_response.job_id);

        self.poll_until_completed(&job_response.job_id).await
    }

    async fn get_solution(&self, job_id: &str) -> Result<Option<MatrixSolution>, GraphHopperError> {
        let url = format!("{}/matrix/solution/{}", self.params.api_url, job_id);
        let poll_response = self
            .client
            .get(url)
            .query(&[("key", &self.params.api_key)])
            .send()
            .await?;

        if !poll_response.status().is_success() {
            let status = poll_response.status().as_u16();
            let message = poll_response.text().await.unwrap_or_default();
            return Err(GraphHopperError::Api { status, message });
        }

        let async_response: AsyncMatrixResponse = poll_response.json().await?;

        match async_response.status.as_str() {
            "finished" => Ok(async_response.solution),
            "waiting" | "processing" => Ok(None),
            other => Err(GraphHopperError::JobFailed(other.to_string())),
        }
    }

    async fn poll_until_completed(&self, job_id: &str) -> Result<MatrixSolution, GraphHopperError> {
        for attempt in 1..=self.params.max_poll_attempts {
            debug!(
                "GraphHopperApi: Polling for job completion {}/{}",
                attempt, self.params.max_poll_attempts
            );
            if let Some(solution) = self.get_solution(job_id).await? {
                return Ok(solution);
            }

            tokio::time::sleep(self.params.poll_interval).await;
        }

        Err(GraphHopperError::Timeout(self.params.max_poll_attempts))
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<MatrixSolution, GraphHopperError> {
        if response.status().is_success() {
            let matrix_solution: MatrixSolution = response.json().await?;
            Ok(matrix_solution)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(GraphHopperError::Api { status, message })
        }
    }
}

impl MatrixOracle for GraphHopperMatrixClient {
    async fn table(&self, request: TableRequest<'_>) -> Result<TableResponse, OracleError> {
        let response = self
            .fetch_table(request.coordinates, request.sources, request.destinations)
            .await?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use quilt_matrix::coordinate::Coordinate;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path, query_param},
    };

    use super::*;

    fn create_client(api_url: String) -> GraphHopperMatrixClient {
        let mut params = GraphhopperMatrixClientParams::new(
            String::from("test-key"),
            GraphHopperProfile::SmallTruck,
        );
        params.api_url = api_url;
        params.poll_interval = Duration::from_millis(1);
        params.max_poll_attempts = 3;

        GraphHopperMatrixClient::new(params)
    }

    fn create_points(count: usize) -> Vec<Coordinate> {
        (0..count)
            .map(|i| Coordinate::new(13.0 + i as f64 * 0.25, 52.0))
            .collect()
    }

    #[test]
    fn test_request_body() {
        let client = create_client(String::from(GRAPHHOPPER_API_URL));
        let points = create_points(3);

        let full = client.request_body(&points, None, None).unwrap();
        assert_eq!(full.shape(), (3, 3));
        assert_eq!(
            serde_json::to_value(&full).unwrap(),
            json!({
                "points": [[13.0, 52.0], [13.25, 52.0], [13.5, 52.0]],
                "out_arrays": ["times", "distances"],
                "profile": "small_truck",
                "fail_fast": false,
            })
        );

        let subset = client
            .request_body(&points, Some(&(2..3)), Some(&(0..2)))
            .unwrap();
        assert_eq!(subset.shape(), (1, 2));
        assert_eq!(
            serde_json::to_value(&subset).unwrap(),
            json!({
                "from_points": [[13.5, 52.0]],
                "to_points": [[13.0, 52.0], [13.25, 52.0]],
                "out_arrays": ["times", "distances"],
                "profile": "small_truck",
                "fail_fast": false,
            })
        );

        assert!(matches!(
            client.request_body(&points, Some(&(2..4)), None),
            Err(GraphHopperError::OutOfBounds { num_points: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_sync_matrix_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/matrix"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "from_points": [[13.0, 52.0]],
                "to_points": [[13.25, 52.0], [13.5, 52.0]],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "times": [[1200.0, null]],
                "distances": [[17000.0, null]],
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_client(mock_server.uri());
        let response = client
            .fetch_table(&create_points(3), Some(&(0..1)), Some(&(1..3)))
            .await
            .unwrap();

        assert_eq!(response.durations, vec![vec![Some(1200.0), None]]);
        assert_eq!(response.distances, vec![vec![Some(17000.0), None]]);
    }

    #[tokio::test]
    async fn test_async_matrix_request_polls_until_finished() {
        let mock_server = MockServer::start().await;
        let times = vec![vec![60.0]; 30];
        let distances = vec![vec![500.0]; 30];

        Mock::given(method("POST"))
            .and(path("/matrix/calculate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "job-1" })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/matrix/solution/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/matrix/solution/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "finished",
                "solution": {
                    "times": times,
                    "distances": distances,
                },
            })))
            .mount(&mock_server)
            .await;

        let client = create_client(mock_server.uri());
        let response = client
            .fetch_table(&create_points(31), Some(&(0..30)), Some(&(30..31)))
            .await
            .unwrap();

        assert_eq!(response.durations.len(), 30);
        assert_eq!(response.distances[29], vec![Some(500.0)]);
    }

    #[tokio::test]
    async fn test_async_job_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/matrix/calculate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "job-2" })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/matrix/solution/job-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "failed" })))
            .mount(&mock_server)
            .await;

        let client = create_client(mock_server.uri());
        let error = client
            .fetch_table(&create_points(30), None, None)
            .await
            .unwrap_err();

        assert!(matches!(&error, GraphHopperError::JobFailed(status) if status == "failed"));
        assert!(matches!(OracleError::from(error), OracleError::Provider(_)));
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/matrix"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Wrong credentials" })),
            )
            .mount(&mock_server)
            .await;

        let client = create_client(mock_server.uri());
        let error = client
            .fetch_table(&create_points(2), None, None)
            .await
            .unwrap_err();

        assert!(matches!(error, GraphHopperError::Api { status: 401, .. }));
        assert!(matches!(
            OracleError::from(error),
            OracleError::Rejected(_)
        ));
    }
}
