//! Seeded synthetic territories and RON scenario files.
use std::path::Path;

use anyhow::Context;
use cost_surface::prelude::{Deposit, Region, RegionPrices, RunConfig, SpatialInputs, Srid};
use geo::{LineString, Point, Polygon};
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Layout of a synthetic territory: a lattice of quadrilateral regions whose shared
/// vertices are jittered, plus uniformly scattered deposits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerritorySpec {
    pub columns: usize,
    pub rows: usize,
    /// Nominal region side in meters.
    pub region_size: f64,
    /// Vertex jitter as a fraction of `region_size`; keep below 0.25.
    pub jitter: f64,
    pub deposit_count: usize,
    /// Lower-left corner of the territory.
    pub origin: (f64, f64),
    pub srid: u32,
    pub seed: u64,
}

impl Default for TerritorySpec {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 3,
            region_size: 40_000.0,
            jitter: 0.15,
            deposit_count: 12,
            origin: (600_000.0, 6_500_000.0),
            srid: Srid::LAMBERT_93.0,
            seed: 7,
        }
    }
}

/// A run configuration, a territory and an output path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub run: RunConfig,
    pub territory: TerritorySpec,
    pub output: String,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            run: RunConfig::new(1000.0).with_srid(Srid::LAMBERT_93),
            territory: TerritorySpec::default(),
            output: "cost_surface.tif".into(),
        }
    }
}

pub fn load_scenario(path: impl AsRef<Path>) -> anyhow::Result<Scenario> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("reading scenario {}", path.display()))?;
    let scenario: Scenario = ron::de::from_bytes(&bytes).map_err(|e| anyhow::anyhow!(e))?;
    Ok(scenario)
}

fn rand_unit(rng: &mut StdRng) -> f64 {
    (rng.next_u32() as f64) / ((u32::MAX as f64) + 1.0)
}

fn rand_signed(rng: &mut StdRng) -> f64 {
    rand_unit(rng) * 2.0 - 1.0
}

pub fn synthetic_territory(spec: &TerritorySpec) -> anyhow::Result<SpatialInputs> {
    anyhow::ensure!(
        spec.columns > 0 && spec.rows > 0,
        "territory needs at least one region"
    );
    anyhow::ensure!(spec.deposit_count > 0, "territory needs at least one deposit");
    anyhow::ensure!(
        (0.0..0.25).contains(&spec.jitter),
        "jitter must lie in [0, 0.25)"
    );

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let srid = Srid(spec.srid);
    let origin = DVec2::new(spec.origin.0, spec.origin.1);
    let size = spec.region_size;

    // Border vertices stay on the bounding rectangle so the contour is a clean frame.
    let (nx, ny) = (spec.columns + 1, spec.rows + 1);
    let mut vertices = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let mut offset = DVec2::ZERO;
            if i > 0 && i < spec.columns {
                offset.x = rand_signed(&mut rng) * spec.jitter * size;
            }
            if j > 0 && j < spec.rows {
                offset.y = rand_signed(&mut rng) * spec.jitter * size;
            }
            vertices.push(origin + DVec2::new(i as f64, j as f64) * size + offset);
        }
    }

    let mut regions = Vec::with_capacity(spec.columns * spec.rows);
    for j in 0..spec.rows {
        for i in 0..spec.columns {
            let corners = [
                vertices[j * nx + i],
                vertices[j * nx + i + 1],
                vertices[(j + 1) * nx + i + 1],
                vertices[(j + 1) * nx + i],
            ];
            let ring: LineString<f64> = corners.iter().map(|v| (v.x, v.y)).collect();
            let prices = RegionPrices::new(
                40.0 + 30.0 * rand_unit(&mut rng),
                60.0 + 60.0 * rand_unit(&mut rng),
                0.5 + 2.5 * rand_unit(&mut rng),
            );
            regions.push(Region::new(
                format!("R{j:02}{i:02}"),
                Polygon::new(ring, vec![]),
                srid,
                prices,
            ));
        }
    }

    let extent = DVec2::new(spec.columns as f64, spec.rows as f64) * size;
    let deposits = (0..spec.deposit_count)
        .map(|k| {
            let p = origin + DVec2::new(rand_unit(&mut rng), rand_unit(&mut rng)) * extent;
            Deposit::new(format!("deposit {k}"), Point::new(p.x, p.y), srid)
        })
        .collect();

    Ok(SpatialInputs::new(regions, deposits)?)
}
