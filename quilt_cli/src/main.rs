use clap::{Parser, Subcommand};

use mimalloc::MiMalloc;

use crate::{generate::GenerateSubcommands, matrix::MatrixArgs, tile::TileArgs};

mod file_utils;
mod generate;
mod matrix;
mod matrix_request;
mod parsers;
mod tile;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute travel matrices for request files
    #[command(visible_alias = "m")]
    Matrix {
        #[command(flatten)]
        args: MatrixArgs,
    },
    /// Print how a matrix would be split into bins
    Tile {
        #[command(flatten)]
        args: TileArgs,
    },
    #[command(visible_alias = "g")]
    Generate {
        #[command(subcommand)]
        commands: GenerateSubcommands,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::from_filename(".env.local").ok();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Some(Commands::Matrix { args }) => matrix::run(args).await?,
        Some(Commands::Tile { args }) => tile::run(args)?,
        Some(Commands::Generate { commands }) => generate::run(commands)?,
        None => {
            // Handle no command provided
        }
    }

    Ok(())
}
