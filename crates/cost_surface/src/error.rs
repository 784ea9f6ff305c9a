//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration, spatial query and index failures, per-pixel evaluation
//! failures, export failures, IO, and generic errors.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Empty inputs, SRID mismatches, invalid resolution or tile metadata.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed geometry or a failed index construction/lookup.
    #[error("spatial query error: {0}")]
    SpatialQuery(String),

    /// A valid pixel could not be turned into a cost value.
    #[error("evaluation failed at pixel ({x}, {y}): {message}")]
    Evaluation { x: usize, y: usize, message: String },

    /// Missing tiles or a failed raster serialization.
    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
