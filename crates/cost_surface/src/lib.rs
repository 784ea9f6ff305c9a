#![forbid(unsafe_code)]
//! cost_surface: Raster cost surfaces for siting industrial facilities.
//!
//! Every in-contour pixel of a regular grid receives the cost of supplying it: the
//! electricity and material prices of the region it lies in, plus a transport price
//! scaled by the distance to the nearest raw-material deposit.
//!
//! Modules:
//! - spatial: regions, deposits, contour aggregation and the R-tree lookups
//! - raster: grid construction, contour coverage, tiling, tile storage and reassembly
//! - cost: per-pixel evaluation, the parallel tile runner with retries, events
//! - export: GeoTIFF output
pub mod cost;
pub mod error;
pub mod export;
pub mod raster;
pub mod spatial;

/// Convenient re-exports for common types. Import with `use cost_surface::prelude::*;`.
pub mod prelude {
    pub use crate::cost::{
        AsEventSink, CostEvaluator, CostEvent, CostEventKind, CostOptions, CostSurfaceRunner,
        EventSink, FnSink, MultiSink, PixelContext, RegionGapPolicy, RunConfig, RunResult,
        RunStats, RunSummary, TileStats, VecSink,
    };
    pub use crate::error::{Error, Result};
    pub use crate::export::{encode_geotiff, write_geotiff};
    pub use crate::raster::{
        reassemble, Grid, GridBuilder, GridCoverage, GridOptions, MemoryTileStore, PixelType,
        Raster, Tile, TileId, TileStore, Tiler,
    };
    pub use crate::spatial::{
        aggregate_contour, Contour, Deposit, DepositIndex, DepositLookup, Region, RegionIndex,
        RegionLookup, RegionPrices, SpatialInputs, Srid,
    };
}
