//! Input features: priced administrative regions and resource deposits.
//!
//! Every feature carries the [`Srid`] it is expressed in; the pipeline refuses to mix
//! reference systems.
use std::fmt;

use geo::{Area, Point, Polygon};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// EPSG spatial reference identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Srid(pub u32);

impl Srid {
    /// RGF93 / Lambert-93, the projected metric CRS used for mainland France.
    pub const LAMBERT_93: Srid = Srid(2154);

    /// Returns `true` for codes in the EPSG geographic 2D range (4000..=4999).
    pub fn is_geographic(self) -> bool {
        (4000..=4999).contains(&self.0)
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Per-region price attributes entering the cost formula.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionPrices {
    /// Electricity price, added as-is.
    pub elec_price: f64,
    /// Materials price, added as-is.
    pub mats_price: f64,
    /// Transport price per distance unit (kilometers by default).
    pub transport_price: f64,
}

impl RegionPrices {
    pub fn new(elec_price: f64, mats_price: f64, transport_price: f64) -> Self {
        Self {
            elec_price,
            mats_price,
            transport_price,
        }
    }

    fn validate(&self, code: &str) -> Result<()> {
        let all_finite = [self.elec_price, self.mats_price, self.transport_price]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidConfig(format!(
                "region '{code}' has non-finite prices"
            )));
        }
        Ok(())
    }
}

/// An administrative polygon with its price attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub code: String,
    pub geometry: Polygon<f64>,
    pub srid: Srid,
    pub prices: RegionPrices,
}

impl Region {
    pub fn new(
        code: impl Into<String>,
        geometry: Polygon<f64>,
        srid: Srid,
        prices: RegionPrices,
    ) -> Self {
        Self {
            code: code.into(),
            geometry,
            srid,
            prices,
        }
    }

    /// Checks that the geometry is well formed and the prices are usable.
    pub fn validate(&self) -> Result<()> {
        validate_polygon(&self.code, &self.geometry)?;
        self.prices.validate(&self.code)
    }
}

/// A resource site used for proximity costing.
#[derive(Clone, Debug, PartialEq)]
pub struct Deposit {
    pub description: String,
    pub location: Point<f64>,
    pub srid: Srid,
}

impl Deposit {
    pub fn new(description: impl Into<String>, location: Point<f64>, srid: Srid) -> Self {
        Self {
            description: description.into(),
            location,
            srid,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.location.x().is_finite() || !self.location.y().is_finite() {
            return Err(Error::SpatialQuery(format!(
                "deposit '{}' has a non-finite location",
                self.description
            )));
        }
        Ok(())
    }
}

/// Rejects polygons that no spatial predicate can give a meaningful answer for.
pub(crate) fn validate_polygon(code: &str, polygon: &Polygon<f64>) -> Result<()> {
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    for ring in rings {
        if ring.0.len() < 4 {
            return Err(Error::SpatialQuery(format!(
                "region '{code}' has a ring with {} positions (need at least 4)",
                ring.0.len()
            )));
        }
        if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::SpatialQuery(format!(
                "region '{code}' has non-finite coordinates"
            )));
        }
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err(Error::SpatialQuery(format!(
            "region '{code}' has a degenerate (zero-area) geometry"
        )));
    }
    Ok(())
}

/// Returns the shared SRID of `srids`, or an error naming the first mismatch.
pub(crate) fn common_srid(what: &str, mut srids: impl Iterator<Item = Srid>) -> Result<Srid> {
    let Some(first) = srids.next() else {
        return Err(Error::InvalidConfig(format!("{what} set is empty")));
    };
    if let Some(other) = srids.find(|s| *s != first) {
        return Err(Error::InvalidConfig(format!(
            "{what} SRID mismatch: {first} vs {other}"
        )));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use geo::{polygon, Point};

    use super::*;

    fn square(code: &str) -> Region {
        Region::new(
            code,
            polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            Srid::LAMBERT_93,
            RegionPrices::new(1.0, 2.0, 3.0),
        )
    }

    #[test]
    fn srid_displays_as_epsg_code() {
        assert_eq!(Srid(2154).to_string(), "EPSG:2154");
        assert!(Srid(4326).is_geographic());
        assert!(!Srid::LAMBERT_93.is_geographic());
    }

    #[test]
    fn valid_region_passes() {
        square("75").validate().expect("valid region");
    }

    #[test]
    fn zero_area_region_is_rejected() {
        let region = Region::new(
            "flat",
            polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 10.0, y: 0.0)],
            Srid::LAMBERT_93,
            RegionPrices::new(1.0, 1.0, 1.0),
        );
        assert!(matches!(region.validate(), Err(Error::SpatialQuery(_))));
    }

    #[test]
    fn non_finite_price_is_a_configuration_error() {
        let mut region = square("nan");
        region.prices.transport_price = f64::NAN;
        assert!(matches!(region.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn non_finite_deposit_is_rejected() {
        let deposit = Deposit::new("bad", Point::new(f64::INFINITY, 0.0), Srid::LAMBERT_93);
        assert!(matches!(deposit.validate(), Err(Error::SpatialQuery(_))));
    }

    #[test]
    fn common_srid_reports_mismatch() {
        let srids = [Srid(2154), Srid(2154), Srid(4326)];
        let err = common_srid("region", srids.into_iter()).unwrap_err();
        assert!(err.to_string().contains("EPSG:4326"));
        assert!(matches!(
            common_srid("region", std::iter::empty()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
