//! Tiled storage of evaluated cost rasters.
//!
//! A [`TileStore`] holds each tile of a run once, keyed by [`TileId`]. Before the tiles
//! are reassembled, [`check_constraints`] verifies they all share the grid's metadata and
//! sit at their grid-aligned origin.
use std::collections::BTreeMap;

use super::grid::Grid;
use super::tile::{Tile, TileId};
use crate::error::{Error, Result};

/// Keyed storage for evaluated tiles.
pub trait TileStore {
    /// Stores a tile. A tile id can only be stored once.
    fn put(&mut self, tile: Tile) -> Result<()>;

    fn get(&self, id: TileId) -> Option<&Tile>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates stored tiles in id order.
    fn iter(&self) -> Box<dyn Iterator<Item = &Tile> + '_>;

    /// Removes and returns every stored tile in id order.
    fn drain(&mut self) -> Vec<Tile>;
}

/// In-memory [`TileStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryTileStore {
    tiles: BTreeMap<TileId, Tile>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self {
            tiles: BTreeMap::new(),
        }
    }
}

impl TileStore for MemoryTileStore {
    fn put(&mut self, tile: Tile) -> Result<()> {
        let id = tile.id();
        if self.tiles.contains_key(&id) {
            return Err(Error::InvalidConfig(format!(
                "tile {id:?} is already stored"
            )));
        }
        self.tiles.insert(id, tile);
        Ok(())
    }

    fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    fn len(&self) -> usize {
        self.tiles.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Tile> + '_> {
        Box::new(self.tiles.values())
    }

    fn drain(&mut self) -> Vec<Tile> {
        std::mem::take(&mut self.tiles).into_values().collect()
    }
}

/// Checks that a tile matches `grid`: same scale, SRID, pixel type and nodata, a buffer of
/// the right length, a window inside the grid, and an origin aligned to its offset.
pub fn check_tile(grid: &Grid, tile: &Tile) -> Result<()> {
    let d = &tile.descriptor;
    grid.check_compatible(
        tile.meta.scale,
        tile.meta.srid,
        tile.meta.pixel_type,
        tile.meta.nodata,
    )
    .map_err(|e| Error::InvalidConfig(format!("tile {:?}: {e}", d.id)))?;

    if tile.data.len() != d.len() {
        return Err(Error::InvalidConfig(format!(
            "tile {:?} holds {} pixels, expected {}",
            d.id,
            tile.data.len(),
            d.len()
        )));
    }
    if d.x_offset + d.width > grid.width || d.y_offset + d.height > grid.height {
        return Err(Error::InvalidConfig(format!(
            "tile {:?} at ({}, {}) size {}x{} exceeds grid {}x{}",
            d.id, d.x_offset, d.y_offset, d.width, d.height, grid.width, grid.height
        )));
    }

    let expected = grid.pixel_to_world(d.x_offset, d.y_offset);
    let tolerance = 1e-6 * grid.scale.abs().max_element();
    if (tile.meta.origin - expected).abs().max_element() > tolerance {
        return Err(Error::InvalidConfig(format!(
            "tile {:?} origin {:?} is not aligned to grid position {:?}",
            d.id, tile.meta.origin, expected
        )));
    }
    Ok(())
}

/// Runs [`check_tile`] over every tile in `store`.
pub fn check_constraints(store: &dyn TileStore, grid: &Grid) -> Result<()> {
    for tile in store.iter() {
        check_tile(grid, tile)?;
    }
    Ok(())
}
