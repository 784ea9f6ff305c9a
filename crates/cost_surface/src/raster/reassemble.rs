//! Merging evaluated tiles back into one full-resolution raster.
use tracing::debug;

use super::buffer::Raster;
use super::grid::Grid;
use super::store::check_tile;
use super::tile::Tile;
use crate::error::{Error, Result};

/// Places every tile at its grid offset and returns the merged raster.
///
/// Fails with [`Error::Export`] when `tiles` is empty or leaves pixels uncovered, and with
/// [`Error::InvalidConfig`] when a tile's metadata or placement disagrees with `grid` or two
/// tiles overlap.
pub fn reassemble(grid: &Grid, tiles: impl IntoIterator<Item = Tile>) -> Result<Raster> {
    let mut raster = Raster::nodata(grid.clone());
    let mut covered = vec![false; grid.len()];
    let mut tile_count = 0usize;

    for tile in tiles {
        check_tile(grid, &tile)?;
        let d = tile.descriptor;
        for row in 0..d.height {
            let start = grid.index(d.x_offset, d.y_offset + row);
            let span = start..start + d.width;
            if covered[span.clone()].iter().any(|c| *c) {
                return Err(Error::InvalidConfig(format!(
                    "tile {:?} overlaps a previously placed tile",
                    d.id
                )));
            }
            covered[span.clone()].fill(true);
            raster.data[span].copy_from_slice(&tile.data[row * d.width..(row + 1) * d.width]);
        }
        tile_count += 1;
    }

    if tile_count == 0 {
        return Err(Error::Export("no tiles available to reassemble".into()));
    }
    let missing = covered.iter().filter(|c| !**c).count();
    if missing > 0 {
        return Err(Error::Export(format!(
            "{missing} of {} pixels are not covered by any tile",
            grid.len()
        )));
    }

    debug!(
        "Reassembled {} tiles into a {}x{} raster.",
        tile_count, grid.width, grid.height
    );
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::raster::{PixelType, Tiler};
    use crate::spatial::Srid;

    fn numbered_raster(width: usize, height: usize) -> Raster {
        let grid = Grid {
            origin: DVec2::new(650_000.0, 7_100_000.0),
            scale: DVec2::new(500.0, -500.0),
            width,
            height,
            srid: Srid::LAMBERT_93,
            pixel_type: PixelType::U32,
            nodata: 2_147_483_647.0,
            default_value: 0.0,
        };
        let mut raster = Raster::nodata(grid);
        for (i, v) in raster.data.iter_mut().enumerate() {
            if i % 7 != 0 {
                *v = i as f64;
            }
        }
        raster
    }

    #[test]
    fn split_then_reassemble_round_trips() {
        let raster = numbered_raster(37, 23);
        for (tw, th) in [(1, 1), (5, 4), (10, 10), (37, 23), (100, 100)] {
            let tiler = Tiler::new(tw, th).expect("tiler");
            let mut tiles = tiler.split(&raster);
            tiles.reverse();
            let merged = reassemble(&raster.grid, tiles).expect("reassemble");
            assert_eq!(merged, raster, "tile size {tw}x{th}");
        }
    }

    #[test]
    fn zero_tiles_is_an_export_error() {
        let raster = numbered_raster(4, 4);
        assert!(matches!(
            reassemble(&raster.grid, Vec::new()),
            Err(Error::Export(_))
        ));
    }

    #[test]
    fn missing_tile_is_an_export_error() {
        let raster = numbered_raster(8, 8);
        let mut tiles = Tiler::new(4, 4).expect("tiler").split(&raster);
        tiles.pop();
        assert!(matches!(
            reassemble(&raster.grid, tiles),
            Err(Error::Export(_))
        ));
    }

    #[test]
    fn overlapping_tiles_are_rejected() {
        let raster = numbered_raster(8, 8);
        let mut tiles = Tiler::new(4, 4).expect("tiler").split(&raster);
        let duplicate = tiles[0].clone();
        tiles.push(duplicate);
        assert!(matches!(
            reassemble(&raster.grid, tiles),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn inconsistent_scale_is_a_configuration_error() {
        let raster = numbered_raster(8, 8);
        let mut tiles = Tiler::new(4, 4).expect("tiler").split(&raster);
        tiles[2].meta.scale = DVec2::new(250.0, -250.0);
        assert!(matches!(
            reassemble(&raster.grid, tiles),
            Err(Error::InvalidConfig(_))
        ));
    }
}
