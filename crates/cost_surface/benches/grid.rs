mod common;

use std::hint::black_box;

use cost_surface::prelude::{aggregate_contour, GridBuilder, GridOptions};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec2;

const RESOLUTIONS: [f64; 3] = [1000.0, 500.0, 250.0];

fn contour_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid/aggregate_contour");
    for side in [2usize, 4, 8] {
        let inputs = common::territory(side, 20_000.0, 1);
        group.throughput(common::elements_throughput(side * side));
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &inputs, |b, inputs| {
            b.iter(|| black_box(aggregate_contour(inputs.regions()).expect("contour")));
        });
    }
    group.finish();
}

fn build_benches(c: &mut Criterion) {
    let inputs = common::territory(4, 20_000.0, 1);
    let contour = aggregate_contour(inputs.regions()).expect("contour");

    let mut group = c.benchmark_group("grid/build");
    for resolution in RESOLUTIONS {
        for all_touched in [false, true] {
            let builder = GridBuilder::new(GridOptions {
                resolution: DVec2::splat(resolution),
                all_touched,
                ..Default::default()
            })
            .expect("builder");
            let grid = builder.grid_for(&contour).expect("grid");
            group.throughput(common::elements_throughput(grid.len()));

            let label = if all_touched { "all_touched" } else { "centre" };
            group.bench_with_input(
                BenchmarkId::new(label, resolution as u32),
                &builder,
                |b, builder| {
                    b.iter(|| black_box(builder.build(&contour).expect("raster")));
                },
            );
        }
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = contour_benches, build_benches
}
criterion_main!(benches);
