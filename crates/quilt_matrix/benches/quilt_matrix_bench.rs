use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use quilt_matrix::{
    bin::{Bin, tile},
    stitcher::Stitcher,
    travel_matrices::TravelMatrices,
};

fn create_matrices(num_locations: usize) -> TravelMatrices {
    let cells = num_locations * num_locations;
    TravelMatrices {
        num_locations,
        durations: (0..cells).map(|i| Some(i as f64)).collect(),
        distances: (0..cells).map(|i| Some(i as f64 * 10.0)).collect(),
    }
}

fn tile_benchmark(c: &mut Criterion) {
    c.bench_function("tile 10000 / 100", |b| {
        b.iter(|| tile(black_box(10_000), black_box(100)))
    });
}

fn stitch_benchmark(c: &mut Criterion) {
    let num_locations = 1000;
    let matrices = create_matrices(num_locations);

    for chunk_size in [100, 250, 500] {
        let bins = tile(num_locations, chunk_size).unwrap();
        let partials: Vec<_> = bins.iter().map(|bin| matrices.slice(bin)).collect();

        c.bench_function(&format!("stitch 1000 / {chunk_size}"), |b| {
            b.iter(|| {
                let mut stitcher = Stitcher::new(num_locations);
                for (bin, partial) in bins.iter().zip(partials.iter()) {
                    stitcher.merge(bin, partial).unwrap();
                }
                black_box(stitcher.finish())
            })
        });
    }

    let full = Bin::full(num_locations);
    let partial = matrices.slice(&full);
    c.bench_function("stitch 1000 single bin", |b| {
        b.iter(|| {
            let mut stitcher = Stitcher::new(num_locations);
            stitcher.merge(&full, &partial).unwrap();
            black_box(stitcher.finish())
        })
    });
}

criterion_group!(benches, tile_benchmark, stitch_benchmark);
criterion_main!(benches);
