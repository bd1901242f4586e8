use std::{fmt::Display, ops::Range};

use serde::{Deserialize, Serialize};

use crate::error::MatrixError;

/// A rectangular block of the global matrix, requested from the oracle in one call.
///
/// Both ranges are contiguous and ascending, so the first index of each range is
/// also its minimum and local indices are obtained by subtracting it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bin {
    pub sources: Range<usize>,
    pub destinations: Range<usize>,
}

impl Bin {
    pub fn new(sources: Range<usize>, destinations: Range<usize>) -> Self {
        Self {
            sources,
            destinations,
        }
    }

    /// A single bin spanning the whole `num_coordinates × num_coordinates` matrix.
    pub fn full(num_coordinates: usize) -> Self {
        Self::new(0..num_coordinates, 0..num_coordinates)
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn num_destinations(&self) -> usize {
        self.destinations.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_sources(), self.num_destinations())
    }

    pub fn num_cells(&self) -> usize {
        self.num_sources() * self.num_destinations()
    }

    pub fn contains(&self, source: usize, destination: usize) -> bool {
        self.sources.contains(&source) && self.destinations.contains(&destination)
    }

    /// Global `(source, destination)` pairs covered by this bin, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sources
            .clone()
            .flat_map(move |source| self.destinations.clone().map(move |dest| (source, dest)))
    }

    pub fn is_full(&self, num_coordinates: usize) -> bool {
        self.sources == (0..num_coordinates) && self.destinations == (0..num_coordinates)
    }

    pub fn validate(&self, num_coordinates: usize) -> Result<(), MatrixError> {
        let fits = |range: &Range<usize>| !range.is_empty() && range.end <= num_coordinates;

        if fits(&self.sources) && fits(&self.destinations) {
            Ok(())
        } else {
            Err(MatrixError::InvalidBin {
                bin: self.clone(),
                num_coordinates,
            })
        }
    }
}

impl Display for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}..{}) x [{}..{})",
            self.sources.start, self.sources.end, self.destinations.start, self.destinations.end
        )
    }
}

fn blocks(num_coordinates: usize, chunk_size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..num_coordinates)
        .step_by(chunk_size)
        .map(move |start| start..(start + chunk_size).min(num_coordinates))
}

/// Splits the `num_coordinates × num_coordinates` index space into square bins of
/// side `chunk_size`, row block by row block.
///
/// The last row and column blocks are clipped to `num_coordinates`, so the result
/// holds `ceil(n / chunk_size)^2` bins covering every cell exactly once.
pub fn tile(num_coordinates: usize, chunk_size: usize) -> Result<Vec<Bin>, MatrixError> {
    if num_coordinates == 0 {
        return Err(MatrixError::EmptyCoordinates);
    }

    if chunk_size == 0 {
        return Err(MatrixError::Configuration(String::from(
            "chunk_size must be greater than 0",
        )));
    }

    let bins = blocks(num_coordinates, chunk_size)
        .flat_map(|sources| {
            blocks(num_coordinates, chunk_size)
                .map(move |destinations| Bin::new(sources.clone(), destinations))
        })
        .collect();

    Ok(bins)
}
