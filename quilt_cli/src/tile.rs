use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use quilt_matrix::bin::{Bin, tile};

#[derive(Args)]
pub struct TileArgs {
    /// Number of coordinates
    #[arg(short = 'n', long)]
    size: usize,

    /// Side length of the square bins
    #[arg(short, long, default_value_t = 500)]
    chunk_size: usize,
}

fn tiling_table(bins: &[Bin]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "sources", "destinations", "shape", "cells"]);

    for (index, bin) in bins.iter().enumerate() {
        let (rows, columns) = bin.shape();
        table.add_row(vec![
            index.to_string(),
            format!("[{}..{})", bin.sources.start, bin.sources.end),
            format!("[{}..{})", bin.destinations.start, bin.destinations.end),
            format!("{rows}x{columns}"),
            bin.num_cells().to_string(),
        ]);
    }

    table
}

pub fn run(args: TileArgs) -> Result<(), anyhow::Error> {
    let bins = tile(args.size, args.chunk_size)?;

    println!("{}", tiling_table(&bins));
    println!(
        "{} bins, {} cells, largest call {} cells",
        bins.len(),
        bins.iter().map(Bin::num_cells).sum::<usize>(),
        bins.iter().map(Bin::num_cells).max().unwrap_or(0)
    );

    Ok(())
}
