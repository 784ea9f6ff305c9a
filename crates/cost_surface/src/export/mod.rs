//! Serialization of reassembled rasters into portable geo-referenced files.
pub mod geotiff;

pub use geotiff::{encode_geotiff, write_geotiff};
