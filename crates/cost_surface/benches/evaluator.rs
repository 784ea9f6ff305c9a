mod common;

use std::hint::black_box;

use cost_surface::prelude::{
    aggregate_contour, CostEvaluator, CostOptions, GridBuilder, GridOptions, Tiler,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::DVec2;

const DEPOSIT_COUNTS: [usize; 4] = [1, 16, 256, 4096];

fn evaluate_pixel_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator/evaluate");
    for &deposit_count in &DEPOSIT_COUNTS {
        let inputs = common::territory(4, 20_000.0, deposit_count);
        let indexes = inputs.index().expect("indexes");
        let contour = aggregate_contour(inputs.regions()).expect("contour");
        let raster = GridBuilder::new(GridOptions {
            resolution: DVec2::splat(1000.0),
            ..Default::default()
        })
        .and_then(|b| b.build(&contour))
        .expect("raster");
        let evaluator = CostEvaluator::new(
            &raster.grid,
            &indexes.regions,
            &indexes.deposits,
            CostOptions::default(),
        )
        .expect("evaluator");

        group.throughput(common::elements_throughput(raster.grid.len()));
        group.bench_with_input(
            BenchmarkId::from_parameter(deposit_count),
            &deposit_count,
            |b, _| {
                b.iter(|| {
                    let mut sum = 0.0;
                    for y in 0..raster.grid.height {
                        for x in 0..raster.grid.width {
                            let value = raster.data[raster.grid.index(x, y)];
                            let ctx = evaluator.context(x, y, value);
                            sum += evaluator.evaluate(&ctx).expect("cost");
                        }
                    }
                    black_box(sum)
                });
            },
        );
    }
    group.finish();
}

fn evaluate_tile_benches(c: &mut Criterion) {
    let inputs = common::territory(4, 20_000.0, 256);
    let indexes = inputs.index().expect("indexes");
    let contour = aggregate_contour(inputs.regions()).expect("contour");
    let raster = GridBuilder::new(GridOptions::default())
        .and_then(|b| b.build(&contour))
        .expect("raster");
    let evaluator = CostEvaluator::new(
        &raster.grid,
        &indexes.regions,
        &indexes.deposits,
        CostOptions::default(),
    )
    .expect("evaluator");

    let mut group = c.benchmark_group("evaluator/evaluate_tile");
    for tile_size in [25usize, 50, 100] {
        let tiler = Tiler::new(tile_size, tile_size).expect("tiler");
        let descriptor = tiler.descriptors(&raster.grid)[0];
        group.throughput(common::elements_throughput(descriptor.len()));
        group.bench_with_input(BenchmarkId::from_parameter(tile_size), &descriptor, |b, d| {
            b.iter_batched(
                || tiler.cut(&raster, d),
                |mut tile| black_box(evaluator.evaluate_tile(&mut tile).expect("tile")),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = evaluate_pixel_benches, evaluate_tile_benches
}
criterion_main!(benches);
