//! Boundary aggregation: the union of all region polygons.
use geo::{Area, BooleanOps, BoundingRect, Contains, MultiPolygon, Point, Rect};
use glam::DVec2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::spatial::region::{common_srid, Region};
use crate::spatial::Srid;

/// The evaluable area of a run: the union of all region polygons.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    pub geometry: MultiPolygon<f64>,
    pub srid: Srid,
}

impl Contour {
    /// Bounding rectangle of the contour.
    pub fn bounds(&self) -> Result<Rect<f64>> {
        self.geometry
            .bounding_rect()
            .ok_or_else(|| Error::SpatialQuery("contour is empty".into()))
    }

    /// Strict interior test.
    pub fn contains(&self, p: DVec2) -> bool {
        self.geometry.contains(&Point::new(p.x, p.y))
    }

    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// Number of disjoint parts after the union.
    pub fn part_count(&self) -> usize {
        self.geometry.0.len()
    }
}

/// Merges all region polygons into a single [`Contour`].
///
/// Fails with [`Error::InvalidConfig`] when `regions` is empty or mixes SRIDs, and with
/// [`Error::SpatialQuery`] when a geometry is malformed.
pub fn aggregate_contour(regions: &[Region]) -> Result<Contour> {
    let srid = common_srid("region", regions.iter().map(|r| r.srid))?;
    for region in regions {
        region.validate()?;
    }

    let mut parts: Vec<MultiPolygon<f64>> = regions
        .iter()
        .map(|r| MultiPolygon::new(vec![r.geometry.clone()]))
        .collect();

    // Pairwise reduction keeps the operands of each union balanced in size.
    let mut rounds = 0usize;
    while parts.len() > 1 {
        parts = parts
            .par_chunks(2)
            .map(|pair| match pair {
                [a, b] => a.union(b),
                [a] => a.clone(),
                _ => MultiPolygon::new(Vec::new()),
            })
            .collect();
        rounds += 1;
    }
    debug!("Contour union finished after {} rounds.", rounds);

    let geometry = parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()));
    if geometry.0.is_empty() {
        return Err(Error::SpatialQuery(
            "union of region geometries is empty".into(),
        ));
    }

    let contour = Contour { geometry, srid };
    info!(
        "Aggregated {} regions into a contour of {} part(s) ({}).",
        regions.len(),
        contour.part_count(),
        srid
    );
    Ok(contour)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::spatial::RegionPrices;

    fn rect_region(code: &str, x0: f64, y0: f64, x1: f64, y1: f64, srid: Srid) -> Region {
        Region::new(
            code,
            polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)],
            srid,
            RegionPrices::new(1.0, 1.0, 1.0),
        )
    }

    #[test]
    fn empty_region_set_is_a_configuration_error() {
        assert!(matches!(aggregate_contour(&[]), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn srid_mismatch_is_a_configuration_error() {
        let regions = vec![
            rect_region("a", 0.0, 0.0, 1.0, 1.0, Srid(2154)),
            rect_region("b", 1.0, 0.0, 2.0, 1.0, Srid(3857)),
        ];
        assert!(matches!(
            aggregate_contour(&regions),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn adjacent_regions_merge_into_one_part() {
        let regions = vec![
            rect_region("a", 0.0, 0.0, 10.0, 10.0, Srid::LAMBERT_93),
            rect_region("b", 10.0, 0.0, 20.0, 10.0, Srid::LAMBERT_93),
            rect_region("c", 0.0, 10.0, 20.0, 15.0, Srid::LAMBERT_93),
        ];
        let contour = aggregate_contour(&regions).expect("contour");
        assert_eq!(contour.part_count(), 1);
        assert!((contour.area() - 300.0).abs() < 1e-9);

        let bounds = contour.bounds().expect("bounds");
        assert_eq!(bounds.min().x, 0.0);
        assert_eq!(bounds.max().y, 15.0);
        assert!(contour.contains(DVec2::new(10.0, 5.0)));
    }

    #[test]
    fn disjoint_regions_keep_separate_parts() {
        let regions = vec![
            rect_region("a", 0.0, 0.0, 1.0, 1.0, Srid::LAMBERT_93),
            rect_region("b", 5.0, 5.0, 6.0, 6.0, Srid::LAMBERT_93),
        ];
        let contour = aggregate_contour(&regions).expect("contour");
        assert_eq!(contour.part_count(), 2);
        assert!(!contour.contains(DVec2::new(3.0, 3.0)));
    }

    #[test]
    fn malformed_geometry_is_a_spatial_error() {
        let mut bad = rect_region("bad", 0.0, 0.0, 1.0, 1.0, Srid::LAMBERT_93);
        bad.geometry = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 1.0, y: 1.0)];
        assert!(matches!(
            aggregate_contour(&[bad]),
            Err(Error::SpatialQuery(_))
        ));
    }
}
