#![allow(dead_code)]

use std::time::Duration;

use cost_surface::prelude::{Deposit, Region, RegionPrices, SpatialInputs, Srid};
use criterion::{Criterion, Throughput};
use geo::{polygon, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

pub const SEED: u64 = 0x5eed_c057;

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

fn rand_unit(rng: &mut StdRng) -> f64 {
    (rng.next_u32() as f64) / ((u32::MAX as f64) + 1.0)
}

/// `side x side` square regions of `region_size` meters with seeded prices, plus
/// `deposit_count` deposits scattered over the whole territory.
pub fn territory(side: usize, region_size: f64, deposit_count: usize) -> SpatialInputs {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut regions = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let x0 = col as f64 * region_size;
            let y0 = row as f64 * region_size;
            let (x1, y1) = (x0 + region_size, y0 + region_size);
            regions.push(Region::new(
                format!("{row:02}{col:02}"),
                polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)],
                Srid::LAMBERT_93,
                RegionPrices::new(
                    50.0 + 20.0 * rand_unit(&mut rng),
                    80.0 + 40.0 * rand_unit(&mut rng),
                    1.0 + 2.0 * rand_unit(&mut rng),
                ),
            ));
        }
    }

    let extent = side as f64 * region_size;
    let deposits = (0..deposit_count)
        .map(|i| {
            Deposit::new(
                format!("deposit {i}"),
                Point::new(extent * rand_unit(&mut rng), extent * rand_unit(&mut rng)),
                Srid::LAMBERT_93,
            )
        })
        .collect();

    SpatialInputs::new(regions, deposits).expect("synthetic territory is valid")
}
