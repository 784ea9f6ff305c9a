//! Loaded input datasets and the explicit index-build stage that follows them.
use tracing::info;

use crate::error::{Error, Result};
use crate::spatial::index::{DepositIndex, RegionIndex};
use crate::spatial::region::common_srid;
use crate::spatial::{Deposit, Region, Srid};

/// Region and deposit datasets for one run, validated to share a single SRID.
#[derive(Clone, Debug)]
pub struct SpatialInputs {
    regions: Vec<Region>,
    deposits: Vec<Deposit>,
    srid: Srid,
}

impl SpatialInputs {
    pub fn new(regions: Vec<Region>, deposits: Vec<Deposit>) -> Result<Self> {
        let region_srid = common_srid("region", regions.iter().map(|r| r.srid))?;
        let deposit_srid = common_srid("deposit", deposits.iter().map(|d| d.srid))?;
        if region_srid != deposit_srid {
            return Err(Error::InvalidConfig(format!(
                "regions use {region_srid} but deposits use {deposit_srid}"
            )));
        }
        Ok(Self {
            regions,
            deposits,
            srid: region_srid,
        })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn deposits(&self) -> &[Deposit] {
        &self.deposits
    }

    pub fn srid(&self) -> Srid {
        self.srid
    }

    /// Builds both spatial indexes. Runs once, after loading and before any evaluation.
    pub fn index(&self) -> Result<Indexes> {
        let regions = RegionIndex::build(self.regions.clone())?;
        let deposits = DepositIndex::build(self.deposits.clone())?;
        info!(
            "Indexed {} regions and {} deposits.",
            regions.len(),
            deposits.len()
        );
        Ok(Indexes { regions, deposits })
    }
}

/// The two read-only indexes shared by every tile evaluation.
pub struct Indexes {
    pub regions: RegionIndex,
    pub deposits: DepositIndex,
}
