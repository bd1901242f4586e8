use quilt_matrix::{bin::Bin, coordinate::Coordinate, stitcher::StitchedMatrices};
use quilt_matrix_providers::travel_matrix_provider::TravelMatrixProvider;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

/// Input of `quilt matrix`.
#[derive(Deserialize, Serialize, JsonSchema)]
pub struct MatrixRequestFile {
    /// `[longitude, latitude]` pairs, matrix rows and columns follow this order
    pub coordinates: Vec<Coordinate>,
    pub provider: TravelMatrixProvider,
    /// Overrides the bin side length for this file
    pub chunk_size: Option<usize>,
    /// Overrides the number of concurrent provider calls for this file
    pub parallelism: Option<usize>,
}

pub fn generate_json_schema() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schema_for!(MatrixRequestFile))
}

/// Output of `quilt matrix`. Cells of `missing` bins are null and must not be
/// read as unroutable.
#[derive(Serialize)]
pub struct MatrixOutputFile {
    pub num_locations: usize,
    pub durations: Vec<Option<f64>>,
    pub distances: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<Bin>,
}

impl From<&StitchedMatrices> for MatrixOutputFile {
    fn from(matrices: &StitchedMatrices) -> Self {
        MatrixOutputFile {
            num_locations: matrices.num_coordinates(),
            durations: matrices.durations.rows().into_iter().flatten().collect(),
            distances: matrices.distances.rows().into_iter().flatten().collect(),
            missing: matrices.missing_bins(),
        }
    }
}

#[cfg(test)]
mod tests {
    use quilt_matrix::{error::OracleError, oracle::TableResponse, stitcher::Stitcher};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_request_file() {
        let request: MatrixRequestFile = serde_json::from_value(json!({
            "coordinates": [[13.38886, 52.517037], [13.397634, 52.529407]],
            "provider": { "AsTheCrowFlies": { "speed_kmh": 30.0 } },
            "chunk_size": 100,
        }))
        .unwrap();

        assert_eq!(request.coordinates.len(), 2);
        assert_eq!(request.coordinates[1].lat(), 52.529407);
        assert_eq!(request.chunk_size, Some(100));
        assert_eq!(request.parallelism, None);
    }

    #[test]
    fn test_output_flags_missing_bins() {
        let mut stitcher = Stitcher::new(2);
        stitcher
            .merge(
                &Bin::new(0..1, 0..2),
                &TableResponse {
                    durations: vec![vec![Some(0.0), Some(4.0)]],
                    distances: vec![vec![Some(0.0), Some(40.0)]],
                },
            )
            .unwrap();
        stitcher.record_failure(Bin::new(1..2, 0..2), OracleError::Cancelled);

        let output = MatrixOutputFile::from(&stitcher.finish());

        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({
                "num_locations": 2,
                "durations": [0.0, 4.0, null, null],
                "distances": [0.0, 40.0, null, null],
                "missing": [{ "sources": { "start": 1, "end": 2 }, "destinations": { "start": 0, "end": 2 } }],
            })
        );
    }

    #[test]
    fn test_json_schema_names_request_fields() {
        let schema = generate_json_schema().unwrap();

        assert!(schema.contains("\"coordinates\""));
        assert!(schema.contains("\"provider\""));
    }
}
