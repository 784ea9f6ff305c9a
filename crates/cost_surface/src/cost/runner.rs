//! High-level runner for building a cost surface from regions and deposits.
//!
//! A run aggregates the region contour, derives its grid and evaluates the grid tile by
//! tile on a `rayon` pool. Each tile's initial pixels are burned from the contour for its
//! own window only, and finished tiles stream to the [`TileStore`] over a bounded channel,
//! so a run holds the indexes plus a few tile buffers at a time. A tile whose evaluation
//! fails is retried from a fresh copy of its initial pixels; the remaining tiles are
//! unaffected.
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::DVec2;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cost::evaluator::{CostEvaluator, CostOptions, RegionGapPolicy, TileStats};
use crate::cost::events::{CostEvent, CostEventKind, EventSink};
use crate::error::{Error, Result};
use crate::export::write_geotiff;
use crate::raster::{
    check_constraints, reassemble, Grid, GridBuilder, GridOptions, MemoryTileStore, PixelType,
    Raster, Tile, TileDescriptor, TileId, TileStore, Tiler, DEFAULT_TILE_SIZE,
};
use crate::spatial::{aggregate_contour, DepositLookup, Region, RegionLookup, SpatialInputs, Srid};

pub const DEFAULT_MAX_TILE_RETRIES: usize = 2;

/// Configuration for a cost surface run.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunConfig {
    /// Cell size `(x, y)` in CRS units.
    pub resolution: DVec2,
    /// Tile size `(width, height)` in pixels.
    pub tile_size: (usize, usize),
    /// Sentinel for pixels outside the contour.
    pub nodata: f64,
    /// Initial value of in-contour pixels.
    pub default_value: f64,
    pub pixel_type: PixelType,
    /// Expected SRID of the inputs; checked when set.
    pub srid: Option<Srid>,
    /// Include cells touched by the contour boundary.
    pub all_touched: bool,
    pub gap_policy: RegionGapPolicy,
    /// Divides deposit distances before pricing (meters to kilometers by default).
    pub distance_divisor: f64,
    /// Extra attempts granted to a failing tile.
    pub max_tile_retries: usize,
    /// Worker count for a dedicated pool; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let grid = GridOptions::default();
        let cost = CostOptions::default();
        Self {
            resolution: grid.resolution,
            tile_size: (DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE),
            nodata: grid.nodata,
            default_value: grid.default_value,
            pixel_type: grid.pixel_type,
            srid: None,
            all_touched: grid.all_touched,
            gap_policy: cost.gap_policy,
            distance_divisor: cost.distance_divisor,
            max_tile_retries: DEFAULT_MAX_TILE_RETRIES,
            threads: None,
        }
    }
}

impl RunConfig {
    /// Creates a new [`RunConfig`] with the given square cell size.
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution: DVec2::splat(resolution),
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, resolution: DVec2) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_tile_size(mut self, width: usize, height: usize) -> Self {
        self.tile_size = (width, height);
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_default_value(mut self, default_value: f64) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = pixel_type;
        self
    }

    pub fn with_srid(mut self, srid: Srid) -> Self {
        self.srid = Some(srid);
        self
    }

    pub fn with_all_touched(mut self, all_touched: bool) -> Self {
        self.all_touched = all_touched;
        self
    }

    pub fn with_gap_policy(mut self, gap_policy: RegionGapPolicy) -> Self {
        self.gap_policy = gap_policy;
        self
    }

    pub fn with_distance_divisor(mut self, distance_divisor: f64) -> Self {
        self.distance_divisor = distance_divisor;
        self
    }

    pub fn with_max_tile_retries(mut self, max_tile_retries: usize) -> Self {
        self.max_tile_retries = max_tile_retries;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            resolution: self.resolution,
            pixel_type: self.pixel_type,
            default_value: self.default_value,
            nodata: self.nodata,
            all_touched: self.all_touched,
        }
    }

    pub fn cost_options(&self) -> CostOptions {
        CostOptions {
            distance_divisor: self.distance_divisor,
            gap_policy: self.gap_policy,
        }
    }

    pub fn tiler(&self) -> Result<Tiler> {
        Tiler::new(self.tile_size.0, self.tile_size.1)
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.grid_options().validate()?;
        self.cost_options().validate()?;
        self.tiler()?;
        if self.threads == Some(0) {
            return Err(Error::InvalidConfig("threads must be > 0 when set".into()));
        }
        Ok(())
    }
}

/// Aggregated counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Tiles evaluated and stored.
    pub tiles: usize,
    /// Failed attempts that were retried successfully.
    pub retries: usize,
    /// Pixel counters summed over all tiles.
    pub pixels: TileStats,
}

/// Outcome of a run whose tiles went to a caller-provided store.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub grid: Grid,
    pub stats: RunStats,
}

/// Evaluated tiles of a run, together with the grid they belong to.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub grid: Grid,
    pub store: MemoryTileStore,
    pub stats: RunStats,
}

impl RunResult {
    fn new(summary: RunSummary, store: MemoryTileStore) -> Self {
        Self {
            grid: summary.grid,
            store,
            stats: summary.stats,
        }
    }

    /// Verifies the stored tiles against the grid and merges them into one raster.
    pub fn reassemble(mut self) -> Result<Raster> {
        check_constraints(&self.store, &self.grid)?;
        let tiles = self.store.drain();
        reassemble(&self.grid, tiles)
    }

    /// Reassembles the tiles and writes them to `path` as a GeoTIFF.
    pub fn export(self, path: impl AsRef<Path>) -> Result<Raster> {
        let raster = self.reassemble()?;
        write_geotiff(&raster, path)?;
        Ok(raster)
    }
}

pub struct CostSurfaceRunner {
    /// Run configuration applied to this runner.
    pub config: RunConfig,
}

impl CostSurfaceRunner {
    pub fn try_new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn new(config: RunConfig) -> Self {
        debug_assert!(
            config.resolution.x > 0.0 && config.resolution.y > 0.0,
            "resolution must be > 0 in both components"
        );
        debug_assert!(
            config.tile_size.0 > 0 && config.tile_size.1 > 0,
            "tile_size must be > 0 in both components"
        );
        debug_assert!(
            config.default_value != config.nodata,
            "default_value must differ from nodata"
        );
        debug_assert!(config.distance_divisor > 0.0, "distance_divisor must be > 0");

        Self { config }
    }

    /// Indexes `inputs` and runs the whole pipeline up to the tile store.
    pub fn run(&self, inputs: &SpatialInputs) -> Result<RunResult> {
        self.run_with_events(inputs, &mut ())
    }

    pub fn run_with_events(
        &self,
        inputs: &SpatialInputs,
        sink: &mut dyn EventSink,
    ) -> Result<RunResult> {
        let mut store = MemoryTileStore::new();
        let summary = self.run_into(inputs, &mut store, sink)?;
        Ok(RunResult::new(summary, store))
    }

    /// Runs the pipeline, putting each tile into `store` as soon as it is evaluated.
    ///
    /// On failure, tiles stored before the error stay in `store`.
    pub fn run_into(
        &self,
        inputs: &SpatialInputs,
        store: &mut dyn TileStore,
        sink: &mut dyn EventSink,
    ) -> Result<RunSummary> {
        self.check_srid(inputs.srid())?;
        if sink.wants(CostEventKind::RunStarted) {
            sink.send(CostEvent::RunStarted {
                config: self.config.clone(),
                region_count: inputs.regions().len(),
                deposit_count: Some(inputs.deposits().len()),
            });
        }
        let indexes = inputs.index()?;
        run_tiles(
            &self.config,
            inputs.regions(),
            &indexes.regions,
            &indexes.deposits,
            store,
            sink,
        )
    }

    /// Runs the pipeline with caller-provided lookups instead of the in-memory indexes.
    ///
    /// `regions` still defines the contour; the lookups answer the per-pixel queries.
    pub fn run_with_lookups(
        &self,
        regions: &[Region],
        region_lookup: &dyn RegionLookup,
        deposit_lookup: &dyn DepositLookup,
        sink: &mut dyn EventSink,
    ) -> Result<RunResult> {
        let mut store = MemoryTileStore::new();
        let summary =
            self.run_with_lookups_into(regions, region_lookup, deposit_lookup, &mut store, sink)?;
        Ok(RunResult::new(summary, store))
    }

    /// [`CostSurfaceRunner::run_with_lookups`] with a caller-provided tile store.
    pub fn run_with_lookups_into(
        &self,
        regions: &[Region],
        region_lookup: &dyn RegionLookup,
        deposit_lookup: &dyn DepositLookup,
        store: &mut dyn TileStore,
        sink: &mut dyn EventSink,
    ) -> Result<RunSummary> {
        if let Some(first) = regions.first() {
            self.check_srid(first.srid)?;
        }
        if sink.wants(CostEventKind::RunStarted) {
            sink.send(CostEvent::RunStarted {
                config: self.config.clone(),
                region_count: regions.len(),
                deposit_count: None,
            });
        }
        run_tiles(
            &self.config,
            regions,
            region_lookup,
            deposit_lookup,
            store,
            sink,
        )
    }

    fn check_srid(&self, actual: Srid) -> Result<()> {
        match self.config.srid {
            Some(expected) if expected != actual => Err(Error::InvalidConfig(format!(
                "run expects {expected} but inputs use {actual}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Outcome of running one unit of work with retries.
#[derive(Debug)]
pub(crate) struct Retried<T> {
    /// Attempts made, including the last one.
    pub attempts: usize,
    /// Messages of the failed attempts, in order.
    pub failures: Vec<String>,
    /// Value of the successful attempt, if any.
    pub value: Option<T>,
}

/// Calls `attempt` with 1-based attempt numbers until it succeeds or
/// `max_retries + 1` attempts have failed.
pub(crate) fn with_retry<T>(
    max_retries: usize,
    mut attempt: impl FnMut(usize) -> Result<T>,
) -> Retried<T> {
    let mut failures = Vec::new();
    for n in 1..=max_retries + 1 {
        match attempt(n) {
            Ok(value) => {
                return Retried {
                    attempts: n,
                    failures,
                    value: Some(value),
                }
            }
            Err(e) => failures.push(e.to_string()),
        }
    }
    Retried {
        attempts: max_retries + 1,
        failures,
        value: None,
    }
}

type TileOutcome = (TileId, Retried<(Tile, TileStats)>);

fn run_tiles(
    config: &RunConfig,
    regions: &[Region],
    region_lookup: &dyn RegionLookup,
    deposit_lookup: &dyn DepositLookup,
    store: &mut dyn TileStore,
    sink: &mut dyn EventSink,
) -> Result<RunSummary> {
    let contour = aggregate_contour(regions)?;
    let coverage = GridBuilder::new(config.grid_options())?.coverage(&contour)?;
    let grid = coverage.grid().clone();
    let tiler = config.tiler()?;
    let descriptors = tiler.descriptors(&grid);
    if sink.wants(CostEventKind::GridBuilt) {
        sink.send(CostEvent::GridBuilt {
            grid: grid.clone(),
            tiles: descriptors.len(),
        });
    }

    let evaluator = CostEvaluator::new(&grid, region_lookup, deposit_lookup, config.cost_options())?;
    let (rows, cols) = tiler.layout(&grid);
    info!(
        "Evaluating {} tiles ({} x {}) of {}x{} pixels.",
        descriptors.len(),
        rows,
        cols,
        config.tile_size.0,
        config.tile_size.1
    );

    let pool = match config.threads {
        Some(threads) => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::Other(format!("failed to build worker pool: {e}")))?,
        ),
        None => None,
    };
    let workers = pool
        .as_ref()
        .map_or_else(rayon::current_num_threads, |p| p.current_num_threads());

    let evaluate = |d: &TileDescriptor| -> TileOutcome {
        let outcome = with_retry(config.max_tile_retries, |attempt| {
            let mut tile = coverage.initial_tile(d);
            let stats = evaluator.evaluate_tile(&mut tile).inspect_err(|e| {
                warn!("Tile {:?} attempt {} failed: {}.", d.id, attempt, e);
            })?;
            debug!(
                "Tile {:?} evaluated: {} costs, {} nodata.",
                d.id, stats.evaluated, stats.nodata
            );
            Ok((tile, stats))
        });
        (d.id, outcome)
    };

    // Workers block once the channel is full, so at most `2 * workers` finished tiles
    // wait for the store besides the ones being evaluated.
    let (tx, rx) = crossbeam_channel::bounded::<TileOutcome>(2 * workers.max(1));
    let cancelled = AtomicBool::new(false);
    let mut tally = Tally::default();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let produce = || {
                descriptors.par_iter().for_each_with(tx, |tx, d| {
                    if cancelled.load(Ordering::Relaxed) {
                        return;
                    }
                    if tx.send(evaluate(d)).is_err() {
                        cancelled.store(true, Ordering::Relaxed);
                    }
                });
            };
            match &pool {
                Some(pool) => pool.install(produce),
                None => produce(),
            }
        });

        let mut stored = Ok(());
        for (id, outcome) in rx.iter() {
            if let Err(e) = tally.record(id, outcome, store, sink) {
                cancelled.store(true, Ordering::Relaxed);
                stored = Err(e);
                break;
            }
        }
        // Disconnects any worker still blocked on a full channel.
        drop(rx);
        stored
    })?;

    let stats = tally.finish(config.max_tile_retries, sink)?;
    Ok(RunSummary { grid, stats })
}

/// Running totals of the tiles received from the workers.
#[derive(Default)]
struct Tally {
    stats: RunStats,
    failed: Vec<TileId>,
    last_error: String,
}

impl Tally {
    fn record(
        &mut self,
        id: TileId,
        outcome: Retried<(Tile, TileStats)>,
        store: &mut dyn TileStore,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let retried = if outcome.value.is_some() {
            outcome.failures.len()
        } else {
            outcome.failures.len().saturating_sub(1)
        };
        if sink.wants(CostEventKind::TileRetried) {
            for (i, error) in outcome.failures.iter().take(retried).enumerate() {
                sink.send(CostEvent::TileRetried {
                    id,
                    attempt: i + 1,
                    error: error.clone(),
                });
            }
        }

        match outcome.value {
            Some((tile, tile_stats)) => {
                store.put(tile)?;
                self.stats.tiles += 1;
                self.stats.retries += retried;
                self.stats.pixels += tile_stats;
                if sink.wants(CostEventKind::TileEvaluated) {
                    sink.send(CostEvent::TileEvaluated {
                        id,
                        attempts: outcome.attempts,
                        stats: tile_stats,
                    });
                }
            }
            None => {
                let error = outcome.failures.last().cloned().unwrap_or_default();
                warn!(
                    "Tile {:?} failed after {} attempts: {}.",
                    id, outcome.attempts, error
                );
                if sink.wants(CostEventKind::TileFailed) {
                    sink.send(CostEvent::TileFailed {
                        id,
                        attempts: outcome.attempts,
                        error: error.clone(),
                    });
                }
                self.failed.push(id);
                self.last_error = error;
            }
        }
        Ok(())
    }

    fn finish(mut self, max_tile_retries: usize, sink: &mut dyn EventSink) -> Result<RunStats> {
        let stats = self.stats;
        if !self.failed.is_empty() {
            self.failed.sort();
            return Err(Error::Export(format!(
                "{} tile(s) failed after {} attempts: {:?}; last error: {}",
                self.failed.len(),
                max_tile_retries + 1,
                self.failed,
                self.last_error
            )));
        }

        if stats.pixels.region_gaps > 0 {
            warn!(
                "{} in-contour pixels lie in no region and were set to nodata.",
                stats.pixels.region_gaps
            );
            if sink.wants(CostEventKind::Warning) {
                sink.send(CostEvent::Warning {
                    context: "evaluation".into(),
                    message: format!(
                        "{} in-contour pixels lie in no region",
                        stats.pixels.region_gaps
                    ),
                });
            }
        }

        info!(
            "Run finished: {} tiles, {} costs, {} retries.",
            stats.tiles, stats.pixels.evaluated, stats.retries
        );
        if sink.wants(CostEventKind::RunFinished) {
            sink.send(CostEvent::RunFinished { stats });
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RunConfig::default();
        assert_eq!(config.resolution, DVec2::splat(500.0));
        assert_eq!(config.tile_size, (100, 100));
        assert_eq!(config.nodata, 2_147_483_647.0);
        assert_eq!(config.default_value, 0.0);
        assert_eq!(config.pixel_type, PixelType::U32);
        assert_eq!(config.srid, None);
        assert!(!config.all_touched);
        assert_eq!(config.gap_policy, RegionGapPolicy::Nodata);
        assert_eq!(config.distance_divisor, 1000.0);
        assert_eq!(config.max_tile_retries, 2);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad = [
            RunConfig::new(0.0),
            RunConfig::default().with_tile_size(0, 10),
            RunConfig::default().with_threads(0),
            RunConfig::default().with_default_value(2_147_483_647.0),
            RunConfig::default().with_distance_divisor(-1.0),
            RunConfig::default().with_nodata(-1.0),
        ];
        for config in bad {
            assert!(
                matches!(
                    CostSurfaceRunner::try_new(config.clone()),
                    Err(Error::InvalidConfig(_))
                ),
                "{config:?}"
            );
        }
    }

    #[test]
    fn retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let outcome = with_retry(2, |attempt| {
            calls.set(calls.get() + 1);
            if attempt < 3 {
                Err(Error::SpatialQuery(format!("transient {attempt}")))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(outcome.value, Some(3));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_gives_up_after_bound() {
        let outcome: Retried<()> = with_retry(1, |_| Err(Error::Other("down".into())));
        assert!(outcome.value.is_none());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.failures, vec!["down".to_string(), "down".to_string()]);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let outcome = with_retry(0, |attempt| Ok::<_, Error>(attempt));
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.failures.is_empty());
    }
}
