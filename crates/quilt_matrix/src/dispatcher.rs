use std::{pin::pin, time::Duration};

use futures::{Stream, StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    bin::Bin,
    coordinate::Coordinate,
    error::{MatrixError, OracleError},
    oracle::{MatrixOracle, TableRequest, TableResponse},
};

/// What happened to one bin, the failure of a bin never aborts its siblings.
#[derive(Debug)]
pub struct BinOutcome {
    pub bin: Bin,
    pub result: Result<TableResponse, OracleError>,
}

impl BinOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DispatchParams {
    /// Maximum number of oracle calls in flight at any instant.
    pub parallelism: usize,
    pub call_timeout: Option<Duration>,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            parallelism: 4,
            call_timeout: None,
        }
    }
}

impl DispatchParams {
    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.parallelism == 0 {
            return Err(MatrixError::Configuration(String::from(
                "parallelism must be greater than 0",
            )));
        }

        if self.call_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(MatrixError::Configuration(String::from(
                "call_timeout must be greater than 0",
            )));
        }

        Ok(())
    }
}

pub(crate) async fn call_oracle<O>(
    oracle: &O,
    request: TableRequest<'_>,
    call_timeout: Option<Duration>,
) -> Result<TableResponse, OracleError>
where
    O: MatrixOracle,
{
    let expected = request.shape();

    let response = match call_timeout {
        Some(limit) => tokio::time::timeout(limit, oracle.table(request))
            .await
            .map_err(|_| OracleError::Timeout(limit))??,
        None => oracle.table(request).await?,
    };

    response.check_shape(expected)?;

    Ok(response)
}

/// Issues one oracle call per bin with at most `params.parallelism` calls in flight,
/// yielding `(bin index, outcome)` as calls settle, in completion order.
///
/// Every bin is checked against the coordinate list before anything is sent.
/// Dropping the stream cancels the calls still in flight.
pub fn dispatch_stream<'a, O>(
    oracle: &'a O,
    coordinates: &'a [Coordinate],
    bins: &'a [Bin],
    params: DispatchParams,
) -> Result<impl Stream<Item = (usize, BinOutcome)> + 'a, MatrixError>
where
    O: MatrixOracle,
{
    params.validate()?;

    for bin in bins {
        bin.validate(coordinates.len())?;
    }

    let stream = stream::iter(bins.iter().enumerate())
        .map(move |(index, bin)| async move {
            debug!("Dispatching bin #{} {}", index, bin);
            let request = TableRequest::for_bin(coordinates, bin);
            let result = call_oracle(oracle, request, params.call_timeout).await;

            (
                index,
                BinOutcome {
                    bin: bin.clone(),
                    result,
                },
            )
        })
        .buffer_unordered(params.parallelism);

    Ok(stream)
}

pub(crate) async fn next_or_cancelled<S>(
    stream: &mut S,
    cancel: &CancellationToken,
) -> Result<Option<S::Item>, MatrixError>
where
    S: Stream + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MatrixError::Cancelled),
        item = stream.next() => Ok(item),
    }
}

/// Runs every bin through the oracle and returns the outcomes in bin order.
pub async fn dispatch<O>(
    oracle: &O,
    coordinates: &[Coordinate],
    bins: &[Bin],
    params: DispatchParams,
) -> Result<Vec<BinOutcome>, MatrixError>
where
    O: MatrixOracle,
{
    dispatch_with_cancel(oracle, coordinates, bins, params, &CancellationToken::new()).await
}

/// Same as [`dispatch`], aborting with [`MatrixError::Cancelled`] as soon as `cancel`
/// fires. Calls still in flight at that point are dropped.
pub async fn dispatch_with_cancel<O>(
    oracle: &O,
    coordinates: &[Coordinate],
    bins: &[Bin],
    params: DispatchParams,
    cancel: &CancellationToken,
) -> Result<Vec<BinOutcome>, MatrixError>
where
    O: MatrixOracle,
{
    let start = std::time::Instant::now();
    let mut stream = pin!(dispatch_stream(oracle, coordinates, bins, params)?);

    let mut outcomes: Vec<Option<BinOutcome>> = Vec::with_capacity(bins.len());
    outcomes.resize_with(bins.len(), || None);

    while let Some((index, outcome)) = next_or_cancelled(&mut stream, cancel).await? {
        outcomes[index] = Some(outcome);
    }

    let outcomes: Vec<BinOutcome> = outcomes.into_iter().flatten().collect();
    let failures = outcomes.iter().filter(|outcome| !outcome.is_success()).count();

    info!(
        "Dispatched {} bins ({} failed) with parallelism {} in {:?}",
        outcomes.len(),
        failures,
        params.parallelism,
        start.elapsed()
    );

    Ok(outcomes)
}
