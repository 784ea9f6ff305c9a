//! Raster side of the pipeline: grid descriptors, contour burning, pixel buffers,
//! tiling, tile storage and reassembly.
pub mod buffer;
pub mod builder;
pub mod coverage;
pub mod grid;
pub mod reassemble;
pub mod store;
pub mod tile;

pub use buffer::Raster;
pub use builder::{GridBuilder, GridCoverage, GridOptions};
pub use grid::{Grid, PixelType, Quantized};
pub use reassemble::reassemble;
pub use store::{check_constraints, MemoryTileStore, TileStore};
pub use tile::{Tile, TileDescriptor, TileId, TileMeta, Tiler, DEFAULT_TILE_SIZE};
