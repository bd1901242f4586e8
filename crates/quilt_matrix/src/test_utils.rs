use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::anyhow;
use parking_lot::Mutex;

use crate::{
    bin::Bin,
    coordinate::Coordinate,
    error::OracleError,
    oracle::{MatrixOracle, TableRequest, TableResponse},
    travel_matrices::TravelMatrices,
};

pub fn create_coordinates(count: usize) -> Vec<Coordinate> {
    (0..count)
        .map(|i| Coordinate::new(13.3 + i as f64 * 0.001, 52.5 - i as f64 * 0.001))
        .collect()
}

/// Matrices where every cell holds its own flat index, so misplaced cells are obvious.
pub fn index_matrices(num_locations: usize) -> TravelMatrices {
    let cells = num_locations * num_locations;
    TravelMatrices {
        num_locations,
        durations: (0..cells).map(|i| Some(i as f64)).collect(),
        distances: (0..cells).map(|i| Some(i as f64 * 10.0)).collect(),
    }
}

enum Delay {
    Fixed(Duration),
    Varying,
}

/// Deterministic oracle answering from a precomputed matrix, counting calls in flight.
pub struct StubOracle {
    matrices: TravelMatrices,
    delay: Delay,
    failing: Mutex<Vec<Bin>>,
    truncating: Vec<Bin>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl StubOracle {
    pub fn new(matrices: TravelMatrices) -> Self {
        Self {
            matrices,
            delay: Delay::Fixed(Duration::ZERO),
            failing: Mutex::new(Vec::new()),
            truncating: Vec::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Delay::Fixed(delay);
        self
    }

    pub fn with_varying_delay(mut self) -> Self {
        self.delay = Delay::Varying;
        self
    }

    pub fn failing_on(self, bins: Vec<Bin>) -> Self {
        *self.failing.lock() = bins;
        self
    }

    /// Answers with one row too few for these bins.
    pub fn truncating(mut self, bins: Vec<Bin>) -> Self {
        self.truncating = bins;
        self
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    fn delay_for(&self, bin: &Bin) -> Duration {
        match self.delay {
            Delay::Fixed(delay) => delay,
            Delay::Varying => {
                let millis = (bin.sources.start * 7 + bin.destinations.start * 3) % 5;
                Duration::from_millis(millis as u64)
            }
        }
    }
}

impl MatrixOracle for StubOracle {
    async fn table(&self, request: TableRequest<'_>) -> Result<TableResponse, OracleError> {
        let bin = Bin::new(request.source_range(), request.destination_range());

        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        tokio::time::sleep(self.delay_for(&bin)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(&bin) {
            return Err(OracleError::Provider(anyhow!(
                "simulated network error for {}",
                bin
            )));
        }

        let mut response = self.matrices.slice(&bin);
        if self.truncating.contains(&bin) {
            response.durations.pop();
            response.distances.pop();
        }

        Ok(response)
    }
}
