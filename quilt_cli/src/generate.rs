use std::path::PathBuf;

use clap::Subcommand;
use quilt_matrix::coordinate::Coordinate;
use quilt_matrix_providers::travel_matrix_provider::TravelMatrixProvider;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    matrix_request::{MatrixRequestFile, generate_json_schema},
    parsers,
};

/// Berlin, `min_lon,min_lat,max_lon,max_lat`
const DEFAULT_BBOX: [f64; 4] = [13.08835, 52.33826, 13.76116, 52.67551];

#[derive(Subcommand)]
pub enum GenerateSubcommands {
    /// JSON schema of request files
    JsonSchema {
        #[arg(long, short = 'o')]
        out: PathBuf,
    },
    /// Request file with random coordinates inside a bounding box
    Coordinates {
        #[arg(long, short = 'n')]
        count: usize,

        /// `min_lon,min_lat,max_lon,max_lat`, Berlin by default
        #[arg(long, value_parser = parsers::parse_bbox)]
        bbox: Option<[f64; 4]>,

        #[arg(long)]
        seed: Option<u64>,

        /// Speed of the as-the-crow-flies provider written into the file
        #[arg(long, default_value_t = 30.0)]
        speed_kmh: f64,

        #[arg(long, short = 'o')]
        out: PathBuf,
    },
}

pub fn random_coordinates(count: usize, bbox: [f64; 4], rng: &mut impl Rng) -> Vec<Coordinate> {
    let [min_lon, min_lat, max_lon, max_lat] = bbox;

    (0..count)
        .map(|_| {
            Coordinate::new(
                rng.random_range(min_lon..max_lon),
                rng.random_range(min_lat..max_lat),
            )
        })
        .collect()
}

fn write(out: PathBuf, content: String) -> Result<(), anyhow::Error> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(out, content)?;
    Ok(())
}

pub fn run(subcommand: GenerateSubcommands) -> Result<(), anyhow::Error> {
    match subcommand {
        GenerateSubcommands::JsonSchema { out } => {
            let schema = generate_json_schema()?;
            write(out, schema)?;
        }
        GenerateSubcommands::Coordinates {
            count,
            bbox,
            seed,
            speed_kmh,
            out,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };

            let request = MatrixRequestFile {
                coordinates: random_coordinates(count, bbox.unwrap_or(DEFAULT_BBOX), &mut rng),
                provider: TravelMatrixProvider::AsTheCrowFlies { speed_kmh },
                chunk_size: None,
                parallelism: None,
            };

            write(out, serde_json::to_string_pretty(&request)?)?;
        }
    }

    Ok(())
}
