//! Per-pixel cost evaluation.
//!
//! This module turns a pixel into a cost score using the region containing its world
//! coordinate and the distance to the nearest deposit:
//!
//! `cost = transport_price * distance / distance_divisor + mats_price + elec_price`
//!
//! Evaluation is pure: it only reads the [`Grid`] and the two lookups, so tiles can be
//! evaluated in any order, concurrently, and re-evaluated after a failure.
use std::ops::AddAssign;

use glam::DVec2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::raster::{Grid, Tile};
use crate::spatial::{DepositLookup, RegionLookup, RegionPrices};

/// Converts the CRS linear unit (meters) to kilometers.
pub const DEFAULT_DISTANCE_DIVISOR: f64 = 1000.0;

/// What to do with an in-contour pixel whose coordinate lies in no region
/// (slivers between neighbouring boundaries, or a shared border).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegionGapPolicy {
    /// The pixel becomes nodata and is counted in [`TileStats::region_gaps`].
    #[default]
    Nodata,
    /// The pixel fails its tile with [`Error::Evaluation`].
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CostOptions {
    pub distance_divisor: f64,
    pub gap_policy: RegionGapPolicy,
}

impl Default for CostOptions {
    fn default() -> Self {
        Self {
            distance_divisor: DEFAULT_DISTANCE_DIVISOR,
            gap_policy: RegionGapPolicy::Nodata,
        }
    }
}

impl CostOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.distance_divisor.is_finite() || self.distance_divisor <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "distance_divisor must be finite and > 0, got {}",
                self.distance_divisor
            )));
        }
        Ok(())
    }
}

/// Everything the evaluator needs to know about one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelContext {
    /// Grid pixel indices `(x, y)`.
    pub pixel: (usize, usize),
    /// World coordinate of the pixel's upper-left corner.
    pub world: DVec2,
    /// Current buffer value; nodata marks a pixel outside the contour.
    pub value: f64,
}

/// Outcome of evaluating one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PixelEvaluation {
    /// The pixel was nodata on input; no lookup was made.
    Nodata,
    /// No region contains the pixel and the gap policy turned it into nodata.
    RegionGap,
    /// Encoded cost; `clamped` is set when the raw cost did not fit the pixel type.
    Cost { value: f64, clamped: bool },
}

impl PixelEvaluation {
    /// Buffer value to store for this outcome.
    pub fn value(&self, nodata: f64) -> f64 {
        match self {
            PixelEvaluation::Nodata | PixelEvaluation::RegionGap => nodata,
            PixelEvaluation::Cost { value, .. } => *value,
        }
    }
}

/// Per-tile counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileStats {
    /// Pixels that received a cost.
    pub evaluated: usize,
    /// Pixels skipped because they were nodata.
    pub nodata: usize,
    /// In-contour pixels without a containing region.
    pub region_gaps: usize,
    /// Costs saturated to the pixel type's range.
    pub clamped: usize,
}

impl AddAssign for TileStats {
    fn add_assign(&mut self, rhs: Self) {
        self.evaluated += rhs.evaluated;
        self.nodata += rhs.nodata;
        self.region_gaps += rhs.region_gaps;
        self.clamped += rhs.clamped;
    }
}

/// Raw (unencoded) cost for a region's prices at `distance`.
#[inline]
pub fn raw_cost(prices: &RegionPrices, distance: f64, distance_divisor: f64) -> f64 {
    prices.transport_price * (distance / distance_divisor) + prices.mats_price + prices.elec_price
}

/// Evaluates pixels of one grid against a region lookup and a deposit lookup.
pub struct CostEvaluator<'a> {
    grid: &'a Grid,
    regions: &'a dyn RegionLookup,
    deposits: &'a dyn DepositLookup,
    options: CostOptions,
}

impl<'a> CostEvaluator<'a> {
    pub fn new(
        grid: &'a Grid,
        regions: &'a dyn RegionLookup,
        deposits: &'a dyn DepositLookup,
        options: CostOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            grid,
            regions,
            deposits,
            options,
        })
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    pub fn options(&self) -> &CostOptions {
        &self.options
    }

    /// Builds the context for grid pixel `(x, y)` holding `value`.
    #[inline]
    pub fn context(&self, x: usize, y: usize, value: f64) -> PixelContext {
        PixelContext {
            pixel: (x, y),
            world: self.grid.pixel_to_world(x, y),
            value,
        }
    }

    /// Returns the encoded cost of a pixel, or the nodata sentinel.
    pub fn evaluate(&self, ctx: &PixelContext) -> Result<f64> {
        Ok(self.evaluate_detailed(ctx)?.value(self.grid.nodata))
    }

    /// Like [`CostEvaluator::evaluate`], reporting why a pixel ended up as nodata or clamped.
    pub fn evaluate_detailed(&self, ctx: &PixelContext) -> Result<PixelEvaluation> {
        if ctx.value == self.grid.nodata {
            return Ok(PixelEvaluation::Nodata);
        }
        let (x, y) = ctx.pixel;

        let Some(region) = self.regions.containing_region(ctx.world)? else {
            return match self.options.gap_policy {
                RegionGapPolicy::Nodata => {
                    trace!("Pixel ({}, {}) lies in no region.", x, y);
                    Ok(PixelEvaluation::RegionGap)
                }
                RegionGapPolicy::Fail => Err(Error::Evaluation {
                    x,
                    y,
                    message: format!(
                        "no region contains ({:.3}, {:.3})",
                        ctx.world.x, ctx.world.y
                    ),
                }),
            };
        };

        let distance = self.deposits.nearest_distance(ctx.world)?;
        let cost = raw_cost(&region.prices, distance, self.options.distance_divisor);
        if cost.is_nan() {
            return Err(Error::Evaluation {
                x,
                y,
                message: format!("cost is NaN in region '{}'", region.code),
            });
        }

        let pixel_type = self.grid.pixel_type;
        let quantized = pixel_type.quantize(cost);
        let mut value = quantized.value;
        if value == self.grid.nodata {
            value = pixel_type.adjacent_toward_zero(value);
        }
        Ok(PixelEvaluation::Cost {
            value,
            clamped: quantized.clamped,
        })
    }

    /// Evaluates every pixel of `tile` in place.
    pub fn evaluate_tile(&self, tile: &mut Tile) -> Result<TileStats> {
        self.grid.check_compatible(
            tile.meta.scale,
            tile.meta.srid,
            tile.meta.pixel_type,
            tile.meta.nodata,
        )?;

        let d = tile.descriptor;
        let mut stats = TileStats::default();
        for ly in 0..d.height {
            for lx in 0..d.width {
                let i = ly * d.width + lx;
                let ctx = self.context(d.x_offset + lx, d.y_offset + ly, tile.data[i]);
                let outcome = self.evaluate_detailed(&ctx)?;
                match outcome {
                    PixelEvaluation::Nodata => stats.nodata += 1,
                    PixelEvaluation::RegionGap => stats.region_gaps += 1,
                    PixelEvaluation::Cost { clamped, .. } => {
                        stats.evaluated += 1;
                        if clamped {
                            stats.clamped += 1;
                        }
                    }
                }
                tile.data[i] = outcome.value(self.grid.nodata);
            }
        }

        if stats.clamped > 0 {
            warn!(
                "Tile {:?}: {} cost(s) saturated to the {:?} range.",
                d.id, stats.clamped, self.grid.pixel_type
            );
        }
        Ok(stats)
    }
}
