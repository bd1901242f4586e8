use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    bin::Bin,
    oracle::{LocalMatrix, TableResponse},
};

/// TravelMatrices holds the complete duration and distance matrices.
/// Stored as flat row-major vectors, `index = from * num_locations + to`.
/// A `None` cell means the provider found no route.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct TravelMatrices {
    pub num_locations: usize,
    pub durations: Vec<Option<f64>>,
    pub distances: Vec<Option<f64>>,
}

impl TravelMatrices {
    #[inline(always)]
    fn index(&self, from: usize, to: usize) -> usize {
        from * self.num_locations + to
    }

    pub fn duration(&self, from: usize, to: usize) -> Option<f64> {
        self.durations[self.index(from, to)]
    }

    pub fn distance(&self, from: usize, to: usize) -> Option<f64> {
        self.distances[self.index(from, to)]
    }

    pub fn is_consistent(&self) -> bool {
        let len = self.num_locations * self.num_locations;
        self.durations.len() == len && self.distances.len() == len
    }

    /// Cuts the block covered by `bin` out of the full matrices.
    pub fn slice(&self, bin: &Bin) -> TableResponse {
        let block = |matrix: &[Option<f64>]| -> LocalMatrix {
            bin.sources
                .clone()
                .map(|from| {
                    let start = self.index(from, bin.destinations.start);
                    matrix[start..start + bin.num_destinations()].to_vec()
                })
                .collect()
        };

        TableResponse {
            durations: block(&self.durations),
            distances: block(&self.distances),
        }
    }
}

impl std::hash::Hash for TravelMatrices {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_usize(self.num_locations);
        for value in self.durations.iter().chain(self.distances.iter()) {
            match value {
                Some(value) => state.write_u64(value.to_bits()),
                None => state.write_u8(0),
            }
        }
    }
}
