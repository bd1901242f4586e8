use geo::{Distance, Haversine, Point};
use quilt_matrix::{
    error::OracleError,
    oracle::{LocalMatrix, MatrixOracle, TableRequest, TableResponse},
};

/// Local oracle: haversine distance travelled at a constant speed.
pub struct AsTheCrowFliesOracle {
    speed_kmh: f64,
}

impl AsTheCrowFliesOracle {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    pub fn compute_table(&self, request: TableRequest<'_>) -> TableResponse {
        let speed_ms = self.speed_kmh / 3.6;

        let distances: LocalMatrix = request
            .source_coordinates()
            .iter()
            .map(|from| {
                let from: Point = from.into();
                request
                    .destination_coordinates()
                    .iter()
                    .map(|to| {
                        let to: Point = to.into();
                        Some(Haversine.distance(from, to))
                    })
                    .collect()
            })
            .collect();

        let durations = distances
            .iter()
            .map(|row| {
                row.iter()
                    .map(|distance| distance.map(|distance| distance / speed_ms))
                    .collect()
            })
            .collect();

        TableResponse {
            durations,
            distances,
        }
    }
}

impl MatrixOracle for AsTheCrowFliesOracle {
    async fn table(&self, request: TableRequest<'_>) -> Result<TableResponse, OracleError> {
        if !self.speed_kmh.is_finite() || self.speed_kmh <= 0.0 {
            return Err(OracleError::Rejected(format!(
                "speed must be positive, got {} km/h",
                self.speed_kmh
            )));
        }

        Ok(self.compute_table(request))
    }
}
