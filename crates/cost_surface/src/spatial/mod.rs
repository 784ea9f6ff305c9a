//! Vector side of the pipeline: input features, the aggregated contour, and the
//! read-only spatial indexes queried during evaluation.
pub mod contour;
pub mod index;
pub mod inputs;
pub mod region;

pub use contour::{aggregate_contour, Contour};
pub use index::{DepositIndex, DepositLookup, RegionIndex, RegionLookup};
pub use inputs::{Indexes, SpatialInputs};
pub use region::{Deposit, Region, RegionPrices, Srid};
