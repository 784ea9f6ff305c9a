//! Grid construction from an aggregated contour.
use glam::DVec2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::buffer::Raster;
use super::coverage::CoverageBurner;
use super::grid::{Grid, PixelType};
use super::tile::{Tile, TileDescriptor, TileMeta};
use crate::error::{Error, Result};
use crate::spatial::Contour;

/// Options controlling grid geometry and pixel initialisation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridOptions {
    /// Cell size `(x, y)` in world units; both components must be positive.
    pub resolution: DVec2,
    pub pixel_type: PixelType,
    pub default_value: f64,
    pub nodata: f64,
    /// Include every cell touched by the contour boundary, not only centre-inside cells.
    pub all_touched: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            resolution: DVec2::splat(500.0),
            pixel_type: PixelType::U32,
            default_value: 0.0,
            nodata: 2_147_483_647.0,
            all_touched: false,
        }
    }
}

impl GridOptions {
    /// Validates the options, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let r = self.resolution;
        if !(r.x.is_finite() && r.y.is_finite()) || r.x <= 0.0 || r.y <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "resolution must be finite and > 0 in both components, got ({}, {})",
                r.x, r.y
            )));
        }
        if !self.pixel_type.can_represent(self.nodata) {
            return Err(Error::InvalidConfig(format!(
                "nodata {} is not representable as {:?}",
                self.nodata, self.pixel_type
            )));
        }
        if !self.pixel_type.can_represent(self.default_value) {
            return Err(Error::InvalidConfig(format!(
                "default value {} is not representable as {:?}",
                self.default_value, self.pixel_type
            )));
        }
        if self.default_value == self.nodata {
            return Err(Error::InvalidConfig(
                "default value must differ from nodata".into(),
            ));
        }
        Ok(())
    }
}

/// Derives the aligned pixel grid of a contour.
#[derive(Clone, Debug)]
pub struct GridBuilder {
    options: GridOptions,
}

impl GridBuilder {
    pub fn new(options: GridOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    /// Grid descriptor only: origin at the contour's `(xmin, ymax)` and enough cells to
    /// cover its bounding box.
    pub fn grid_for(&self, contour: &Contour) -> Result<Grid> {
        let bounds = contour.bounds()?;
        let (min, max) = (bounds.min(), bounds.max());
        let res = self.options.resolution;
        let width = (((max.x - min.x) / res.x).ceil() as usize).max(1);
        let height = (((max.y - min.y) / res.y).ceil() as usize).max(1);

        Ok(Grid {
            origin: DVec2::new(min.x, max.y),
            scale: DVec2::new(res.x, -res.y),
            width,
            height,
            srid: contour.srid,
            pixel_type: self.options.pixel_type,
            nodata: self.options.nodata,
            default_value: self.options.default_value,
        })
    }

    /// Grid descriptor plus the contour edges needed to initialise any window of it.
    pub fn coverage(&self, contour: &Contour) -> Result<GridCoverage> {
        let grid = self.grid_for(contour)?;
        let burner = CoverageBurner::new(&contour.geometry, self.options.all_touched);
        info!(
            "Grid {}x{} at ({:.3}, {:.3}), {} cells.",
            grid.width,
            grid.height,
            grid.origin.x,
            grid.origin.y,
            grid.len()
        );
        Ok(GridCoverage { grid, burner })
    }

    /// Grid plus its initialised buffer: the default value inside the contour, nodata
    /// elsewhere.
    pub fn build(&self, contour: &Contour) -> Result<Raster> {
        let coverage = self.coverage(contour)?;
        let whole = TileDescriptor::whole(&coverage.grid);
        let data = coverage.initial_values(&whole);
        let raster = Raster {
            grid: coverage.grid,
            data,
        };
        debug!(
            "{} of {} cells inside the contour.",
            raster.valid_count(),
            raster.grid.len()
        );
        Ok(raster)
    }
}

/// A grid whose pixels are initialised lazily, one window at a time.
///
/// Only the contour's edges are kept, so memory stays independent of the grid size.
#[derive(Clone, Debug)]
pub struct GridCoverage {
    grid: Grid,
    burner: CoverageBurner,
}

impl GridCoverage {
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Coverage of the pixels under `window`, row-major.
    pub fn mask(&self, window: &TileDescriptor) -> Vec<bool> {
        self.burner.burn(&self.grid, window)
    }

    /// Initial tile for `window`: the default value inside the contour, nodata elsewhere.
    pub fn initial_tile(&self, window: &TileDescriptor) -> Tile {
        Tile {
            descriptor: *window,
            meta: TileMeta::for_descriptor(&self.grid, window),
            data: self.initial_values(window),
        }
    }

    fn initial_values(&self, window: &TileDescriptor) -> Vec<f64> {
        let (inside, outside) = (self.grid.default_value, self.grid.nodata);
        self.mask(window)
            .into_iter()
            .map(|covered| if covered { inside } else { outside })
            .collect()
    }
}
