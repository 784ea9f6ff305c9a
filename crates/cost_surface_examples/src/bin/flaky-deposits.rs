use std::sync::atomic::{AtomicUsize, Ordering};

use cost_surface::prelude::*;
use cost_surface_examples::{init_tracing, log_raster_summary, synthetic_territory, TerritorySpec};
use glam::DVec2;
use tracing::info;

/// Deposit lookup that drops every `period`-th query, like an unreliable remote table.
struct Flaky<'a> {
    inner: &'a DepositIndex,
    period: usize,
    calls: AtomicUsize,
}

impl DepositLookup for Flaky<'_> {
    fn nearest_distance(&self, p: DVec2) -> Result<f64> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.period == 0 {
            return Err(Error::SpatialQuery(format!("query {n} timed out")));
        }
        self.inner.nearest_distance(p)
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let inputs = synthetic_territory(&TerritorySpec::default())?;
    let indexes = inputs.index()?;
    let flaky = Flaky {
        inner: &indexes.deposits,
        period: 20_000,
        calls: AtomicUsize::new(0),
    };

    let runner = CostSurfaceRunner::try_new(
        RunConfig::new(1000.0)
            .with_tile_size(50, 50)
            .with_max_tile_retries(3),
    )?;
    let mut sink = VecSink::only([
        CostEventKind::TileRetried,
        CostEventKind::TileFailed,
        CostEventKind::RunFinished,
    ]);

    match runner.run_with_lookups(inputs.regions(), &indexes.regions, &flaky, &mut sink) {
        Ok(result) => {
            info!(
                "Recovered from {} failed tile attempts.",
                result.stats.retries
            );
            log_raster_summary(&result.reassemble()?);
        }
        Err(e) => info!("Run failed: {}.", e),
    }
    info!(
        "Events: {} retried, {} failed.",
        sink.count(CostEventKind::TileRetried),
        sink.count(CostEventKind::TileFailed)
    );
    Ok(())
}
