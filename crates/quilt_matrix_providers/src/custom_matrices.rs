use quilt_matrix::{
    bin::Bin,
    error::{MatrixError, OracleError},
    oracle::{MatrixOracle, TableRequest, TableResponse},
    travel_matrices::TravelMatrices,
};

/// Answers from caller supplied matrices, indexed like the request coordinates.
pub struct CustomMatricesOracle<'a> {
    matrices: &'a TravelMatrices,
}

impl<'a> CustomMatricesOracle<'a> {
    pub fn new(matrices: &'a TravelMatrices) -> Self {
        Self { matrices }
    }

    /// Checks the matrices cover `num_coordinates` locations, before any bin is requested.
    pub fn validate(&self, num_coordinates: usize) -> Result<(), MatrixError> {
        self.check(num_coordinates).map_err(MatrixError::Configuration)
    }

    fn check(&self, num_coordinates: usize) -> Result<(), String> {
        if !self.matrices.is_consistent() {
            return Err(format!(
                "custom matrices do not hold {0}x{0} cells",
                self.matrices.num_locations
            ));
        }

        if self.matrices.num_locations != num_coordinates {
            return Err(format!(
                "custom matrices cover {} locations, request has {} coordinates",
                self.matrices.num_locations, num_coordinates
            ));
        }

        Ok(())
    }
}

impl MatrixOracle for CustomMatricesOracle<'_> {
    async fn table(&self, request: TableRequest<'_>) -> Result<TableResponse, OracleError> {
        self.check(request.coordinates.len())
            .map_err(OracleError::Rejected)?;

        let bin = Bin::new(request.source_range(), request.destination_range());
        Ok(self.matrices.slice(&bin))
    }
}

#[cfg(test)]
mod tests {
    use quilt_matrix::coordinate::Coordinate;

    use super::*;

    fn create_matrices() -> TravelMatrices {
        TravelMatrices {
            num_locations: 2,
            durations: vec![Some(0.0), Some(5.0), None, Some(0.0)],
            distances: vec![Some(0.0), Some(50.0), None, Some(0.0)],
        }
    }

    #[tokio::test]
    async fn test_slices_requested_block() {
        let matrices = create_matrices();
        let coordinates = vec![Coordinate::new(13.0, 52.0), Coordinate::new(13.1, 52.1)];
        let bin = Bin::new(1..2, 0..2);

        let response = CustomMatricesOracle::new(&matrices)
            .table(TableRequest::for_bin(&coordinates, &bin))
            .await
            .unwrap();

        assert_eq!(response.durations, vec![vec![None, Some(0.0)]]);
    }

    #[tokio::test]
    async fn test_size_mismatch_is_rejected() {
        let matrices = create_matrices();
        let coordinates = vec![Coordinate::new(13.0, 52.0)];

        let result = CustomMatricesOracle::new(&matrices)
            .table(TableRequest::full(&coordinates))
            .await;

        assert!(matches!(result, Err(OracleError::Rejected(_))));
        assert!(matches!(
            CustomMatricesOracle::new(&matrices).validate(1),
            Err(MatrixError::Configuration(_))
        ));
        assert!(CustomMatricesOracle::new(&matrices).validate(2).is_ok());
    }
}
