use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use quilt_matrix::chunked_matrix_client::ChunkedMatrixParams;
use quilt_matrix_providers::{
    cache::{FileCache, MatricesCache, NoCache},
    travel_matrix_client::TravelMatrixClient,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    file_utils::{output_path, request_files},
    matrix_request::{MatrixOutputFile, MatrixRequestFile},
    parsers,
};

#[derive(Args)]
pub struct MatrixArgs {
    /// A request file, or a folder of request files
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output folder for .matrices.json files, next to the inputs by default
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Side length of the square bins sent to the provider
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Maximum number of provider calls in flight
    #[arg(long)]
    parallelism: Option<usize>,

    /// Timeout of a single provider call (e.g., "30s", "PT1M")
    #[arg(short, long, value_parser = parsers::parse_duration)]
    timeout: Option<jiff::SignedDuration>,

    /// Ask the provider for the whole matrix in one call
    #[arg(long, conflicts_with = "chunk_size")]
    single_shot: bool,

    /// Request failed bins again, up to this many times
    #[arg(long, default_value_t = 0)]
    retries: usize,

    /// Write matrices even when some bins failed, listing them as missing
    #[arg(long)]
    allow_incomplete: bool,
}

impl MatrixArgs {
    fn params(&self, request: &MatrixRequestFile) -> anyhow::Result<ChunkedMatrixParams> {
        let defaults = ChunkedMatrixParams::default();
        let call_timeout = self
            .timeout
            .map(std::time::Duration::try_from)
            .transpose()
            .context("Timeout must be positive")?;

        Ok(ChunkedMatrixParams {
            chunk_size: self
                .chunk_size
                .or(request.chunk_size)
                .unwrap_or(defaults.chunk_size),
            parallelism: self
                .parallelism
                .or(request.parallelism)
                .unwrap_or(defaults.parallelism),
            call_timeout,
        })
    }
}

fn read_request(path: &Path) -> anyhow::Result<MatrixRequestFile> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let request = serde_json::from_reader(reader)
        .with_context(|| format!("Invalid request file {}", path.display()))?;
    Ok(request)
}

fn write_output(path: &Path, output: &MatrixOutputFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    serde_json::to_writer(&mut writer, output)?;
    writer.flush()?;

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} bins ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

async fn fetch_matrix(
    args: &MatrixArgs,
    cache: impl MatricesCache,
    path: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let request = read_request(path)?;

    let bar = progress_bar();
    let progress_bar = bar.clone();

    let client = TravelMatrixClient::new(cache)
        .with_params(args.params(&request)?)
        .with_single_shot(args.single_shot)
        .with_retries(args.retries)
        .with_progress(Arc::new(move |completed, total| {
            progress_bar.set_length(total as u64);
            progress_bar.set_position(completed as u64);
        }));

    let result = client
        .fetch_partial(&request.coordinates, &request.provider, cancel)
        .await;
    bar.finish_and_clear();
    let matrices = result?;

    for failure in &matrices.failures {
        warn!("Bin {} failed: {}", failure.bin, failure.error);
    }

    if !matrices.is_complete() && !args.allow_incomplete {
        anyhow::bail!(
            "{} bin(s) failed for {}, use --allow-incomplete to write partial matrices",
            matrices.failures.len(),
            path.display()
        );
    }

    let out = output_path(path, args.output.as_deref());
    write_output(&out, &MatrixOutputFile::from(&matrices))?;

    info!(
        "Wrote {}x{} matrices to {}",
        matrices.num_coordinates(),
        matrices.num_coordinates(),
        out.display()
    );

    Ok(())
}

pub async fn run(args: MatrixArgs) -> anyhow::Result<()> {
    let paths = request_files(&args.input)?;
    if paths.is_empty() {
        anyhow::bail!("No request files found in {}", args.input.display());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding requests");
            ctrl_c.cancel();
        }
    });

    let mut failed = 0;
    for (i, path) in paths.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, paths.len(), path.display());

        let result = match FileCache::from_env() {
            Some(cache) => {
                debug!("Using matrices cache in {}", cache.folder().display());
                fetch_matrix(&args, cache, path, &cancel).await
            }
            None => fetch_matrix(&args, NoCache, path, &cancel).await,
        };

        if let Err(err) = result {
            error!("{}: {:#}", path.display(), err);
            failed += 1;
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} request file(s) failed", paths.len());
    }

    Ok(())
}
