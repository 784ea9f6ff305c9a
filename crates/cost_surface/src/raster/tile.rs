//! Tiling of a grid into fixed-size, independently computable blocks.
//!
//! This module defines [`Tiler`], [`TileDescriptor`] and [`Tile`]. Tiles are laid out
//! row-major from the grid's upper-left corner; tiles on the right and bottom edges are
//! cut short instead of padded.
use glam::DVec2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::buffer::Raster;
use super::grid::{Grid, PixelType};
use crate::error::{Error, Result};
use crate::spatial::Srid;

pub const DEFAULT_TILE_SIZE: usize = 100;

/// Identifier for a tile in the tile layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileId(
    /// Tile row.
    pub usize,
    /// Tile column.
    pub usize,
);

/// Pixel window of one tile inside the full grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileDescriptor {
    pub id: TileId,
    pub x_offset: usize,
    pub y_offset: usize,
    pub width: usize,
    pub height: usize,
}

impl TileDescriptor {
    /// A single window spanning all of `grid`.
    pub fn whole(grid: &Grid) -> Self {
        Self {
            id: TileId(0, 0),
            x_offset: 0,
            y_offset: 0,
            width: grid.width,
            height: grid.height,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grid metadata a tile carries so it can be evaluated and stored on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMeta {
    /// World coordinate of the tile's upper-left corner.
    pub origin: DVec2,
    pub scale: DVec2,
    pub srid: Srid,
    pub pixel_type: PixelType,
    pub nodata: f64,
}

impl TileMeta {
    pub fn for_descriptor(grid: &Grid, descriptor: &TileDescriptor) -> Self {
        Self {
            origin: grid.pixel_to_world(descriptor.x_offset, descriptor.y_offset),
            scale: grid.scale,
            srid: grid.srid,
            pixel_type: grid.pixel_type,
            nodata: grid.nodata,
        }
    }
}

/// A rectangular block of pixels with its placement and metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub descriptor: TileDescriptor,
    pub meta: TileMeta,
    pub data: Vec<f64>,
}

impl Tile {
    pub fn id(&self) -> TileId {
        self.descriptor.id
    }

    /// Value at tile-local pixel `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.descriptor.width || y >= self.descriptor.height {
            return None;
        }
        Some(self.data[y * self.descriptor.width + x])
    }

    /// Converts tile-local pixel indices to grid pixel indices.
    pub fn to_grid_pixel(&self, x: usize, y: usize) -> (usize, usize) {
        (self.descriptor.x_offset + x, self.descriptor.y_offset + y)
    }

    /// Returns `true` when every pixel holds nodata.
    pub fn is_all_nodata(&self) -> bool {
        self.data.iter().all(|v| *v == self.meta.nodata)
    }
}

/// Partitions grids into tiles of a fixed pixel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tiler {
    tile_width: usize,
    tile_height: usize,
}

impl Default for Tiler {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
        }
    }
}

impl Tiler {
    pub fn new(tile_width: usize, tile_height: usize) -> Result<Self> {
        if tile_width == 0 || tile_height == 0 {
            return Err(Error::InvalidConfig(format!(
                "tile size must be > 0, got {tile_width}x{tile_height}"
            )));
        }
        Ok(Self {
            tile_width,
            tile_height,
        })
    }

    pub fn tile_size(&self) -> (usize, usize) {
        (self.tile_width, self.tile_height)
    }

    /// Number of tile `(rows, columns)` needed for `grid`.
    pub fn layout(&self, grid: &Grid) -> (usize, usize) {
        (
            grid.height.div_ceil(self.tile_height),
            grid.width.div_ceil(self.tile_width),
        )
    }

    /// Row-major tile descriptors covering `grid` exactly once.
    pub fn descriptors(&self, grid: &Grid) -> Vec<TileDescriptor> {
        let (rows, cols) = self.layout(grid);
        let mut out = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let y_offset = row * self.tile_height;
            let height = self.tile_height.min(grid.height - y_offset);
            for col in 0..cols {
                let x_offset = col * self.tile_width;
                out.push(TileDescriptor {
                    id: TileId(row, col),
                    x_offset,
                    y_offset,
                    width: self.tile_width.min(grid.width - x_offset),
                    height,
                });
            }
        }
        out
    }

    /// Copies the pixels under `descriptor` out of `raster`.
    pub fn cut(&self, raster: &Raster, descriptor: &TileDescriptor) -> Tile {
        let mut data = Vec::with_capacity(descriptor.len());
        for y in descriptor.y_offset..descriptor.y_offset + descriptor.height {
            let start = raster.grid.index(descriptor.x_offset, y);
            data.extend_from_slice(&raster.data[start..start + descriptor.width]);
        }
        Tile {
            descriptor: *descriptor,
            meta: TileMeta::for_descriptor(&raster.grid, descriptor),
            data,
        }
    }

    /// Splits `raster` into all of its tiles.
    pub fn split(&self, raster: &Raster) -> Vec<Tile> {
        self.descriptors(&raster.grid)
            .iter()
            .map(|d| self.cut(raster, d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: usize, height: usize) -> Grid {
        Grid {
            origin: DVec2::new(0.0, 1000.0),
            scale: DVec2::new(10.0, -10.0),
            width,
            height,
            srid: Srid::LAMBERT_93,
            pixel_type: PixelType::U32,
            nodata: 7.0,
            default_value: 0.0,
        }
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(matches!(Tiler::new(0, 10), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn default_tile_is_100_square() {
        assert_eq!(Tiler::default().tile_size(), (100, 100));
    }

    #[test]
    fn descriptors_cover_grid_without_overlap() {
        let g = grid(23, 17);
        let tiler = Tiler::new(5, 4).expect("tiler");
        assert_eq!(tiler.layout(&g), (5, 5));

        let mut hits = vec![0u8; g.len()];
        for d in tiler.descriptors(&g) {
            for y in d.y_offset..d.y_offset + d.height {
                for x in d.x_offset..d.x_offset + d.width {
                    hits[g.index(x, y)] += 1;
                }
            }
        }
        assert!(hits.iter().all(|h| *h == 1));
    }

    #[test]
    fn edge_tiles_are_cut_short() {
        let g = grid(23, 17);
        let tiler = Tiler::new(5, 4).expect("tiler");
        let last = *tiler.descriptors(&g).last().expect("tiles");
        assert_eq!(last.id, TileId(4, 4));
        assert_eq!((last.width, last.height), (3, 1));
    }

    #[test]
    fn cut_carries_offset_origin() {
        let g = grid(10, 10);
        let mut raster = Raster::filled(g, 0.0);
        raster.set(6, 3, 42.0);
        let tiler = Tiler::new(4, 4).expect("tiler");
        let d = tiler.descriptors(&raster.grid)[1];
        let tile = tiler.cut(&raster, &d);

        assert_eq!(tile.meta.origin, DVec2::new(40.0, 1000.0));
        assert_eq!(tile.get(2, 3), Some(42.0));
        assert_eq!(tile.to_grid_pixel(2, 3), (6, 3));
        assert!(!tile.is_all_nodata());
    }
}
