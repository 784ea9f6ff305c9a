//! Read-only spatial indexes over regions and deposits.
//!
//! This module defines the lookup seams used by the cost evaluator:
//! - Point-in-region queries via [`RegionLookup`], implemented by [`RegionIndex`].
//! - Nearest-deposit distance queries via [`DepositLookup`], implemented by [`DepositIndex`].
//!
//! Both indexes are built once and never mutated, so they can be shared across worker
//! threads by reference.
use geo::{BoundingRect, Contains, Point};
use glam::DVec2;
use rstar::primitives::GeomWithData;
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use crate::error::{Error, Result};
use crate::spatial::region::common_srid;
use crate::spatial::{Deposit, Region, Srid};

/// Point to containing-region lookup.
/// Implementors must be safe to query concurrently without synchronization.
pub trait RegionLookup: Send + Sync {
    fn containing_region(&self, p: DVec2) -> Result<Option<&Region>>;
}

/// Point to nearest-deposit distance lookup, in the CRS linear unit.
pub trait DepositLookup: Send + Sync {
    fn nearest_distance(&self, p: DVec2) -> Result<f64>;
}

struct RegionEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over region envelopes, refined by an exact containment test.
pub struct RegionIndex {
    regions: Vec<Region>,
    tree: RTree<RegionEntry>,
    srid: Srid,
}

impl RegionIndex {
    /// Bulk-loads the index. Fails on an empty set, mixed SRIDs or malformed geometry.
    pub fn build(regions: Vec<Region>) -> Result<Self> {
        let srid = common_srid("region", regions.iter().map(|r| r.srid))?;

        let mut entries = Vec::with_capacity(regions.len());
        for (index, region) in regions.iter().enumerate() {
            region.validate()?;
            let rect = region.geometry.bounding_rect().ok_or_else(|| {
                Error::SpatialQuery(format!("region '{}' has no extent", region.code))
            })?;
            entries.push(RegionEntry {
                index,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            });
        }

        let tree = RTree::bulk_load(entries);
        debug!("Region index built with {} entries ({}).", tree.size(), srid);
        Ok(Self {
            regions,
            tree,
            srid,
        })
    }

    pub fn srid(&self) -> Srid {
        self.srid
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Returns the region whose interior contains `p`.
    /// Points on a shared border belong to no region, like `ST_Contains`.
    pub fn region_at(&self, p: DVec2) -> Option<&Region> {
        let point = Point::new(p.x, p.y);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([p.x, p.y]))
            .map(|entry| &self.regions[entry.index])
            .find(|region| region.geometry.contains(&point))
    }
}

impl RegionLookup for RegionIndex {
    #[inline]
    fn containing_region(&self, p: DVec2) -> Result<Option<&Region>> {
        Ok(self.region_at(p))
    }
}

/// R-tree over deposit locations supporting nearest-neighbour queries.
pub struct DepositIndex {
    deposits: Vec<Deposit>,
    tree: RTree<GeomWithData<[f64; 2], usize>>,
    srid: Srid,
}

impl DepositIndex {
    /// Bulk-loads the index. Fails on an empty set, mixed SRIDs or non-finite locations.
    pub fn build(deposits: Vec<Deposit>) -> Result<Self> {
        let srid = common_srid("deposit", deposits.iter().map(|d| d.srid))?;

        let mut points = Vec::with_capacity(deposits.len());
        for (index, deposit) in deposits.iter().enumerate() {
            deposit.validate()?;
            points.push(GeomWithData::new(
                [deposit.location.x(), deposit.location.y()],
                index,
            ));
        }

        let tree = RTree::bulk_load(points);
        debug!("Deposit index built with {} entries ({}).", tree.size(), srid);
        Ok(Self {
            deposits,
            tree,
            srid,
        })
    }

    pub fn srid(&self) -> Srid {
        self.srid
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }

    pub fn deposits(&self) -> &[Deposit] {
        &self.deposits
    }

    /// Returns the nearest deposit to `p` together with its Euclidean distance.
    pub fn nearest_deposit(&self, p: DVec2) -> Option<(&Deposit, f64)> {
        self.tree.nearest_neighbor(&[p.x, p.y]).map(|nearest| {
            let [x, y] = *nearest.geom();
            let distance = DVec2::new(x, y).distance(p);
            (&self.deposits[nearest.data], distance)
        })
    }
}

impl DepositLookup for DepositIndex {
    #[inline]
    fn nearest_distance(&self, p: DVec2) -> Result<f64> {
        self.nearest_deposit(p)
            .map(|(_, distance)| distance)
            .ok_or_else(|| Error::SpatialQuery("deposit index is empty".into()))
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::spatial::RegionPrices;

    fn rect_region(code: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
        Region::new(
            code,
            polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)],
            Srid::LAMBERT_93,
            RegionPrices::new(1.0, 2.0, 3.0),
        )
    }

    fn rand_unit(rng: &mut StdRng) -> f64 {
        (rng.next_u32() as f64) / ((u32::MAX as f64) + 1.0)
    }

    #[test]
    fn region_lookup_matches_brute_force_containment() {
        let regions = vec![
            rect_region("nw", 0.0, 50.0, 50.0, 100.0),
            rect_region("ne", 50.0, 50.0, 100.0, 100.0),
            Region::new(
                "south",
                polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 50.0), (x: 50.0, y: 20.0), (x: 0.0, y: 50.0)],
                Srid::LAMBERT_93,
                RegionPrices::new(0.0, 0.0, 0.0),
            ),
        ];
        let index = RegionIndex::build(regions.clone()).expect("index");
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..2_000 {
            let p = DVec2::new(rand_unit(&mut rng) * 110.0 - 5.0, rand_unit(&mut rng) * 110.0 - 5.0);
            let expected = regions
                .iter()
                .find(|r| r.geometry.contains(&Point::new(p.x, p.y)))
                .map(|r| r.code.as_str());
            let actual = index.region_at(p).map(|r| r.code.as_str());
            assert_eq!(actual, expected, "mismatch at {p:?}");
        }
    }

    #[test]
    fn shared_border_belongs_to_no_region() {
        let index = RegionIndex::build(vec![
            rect_region("a", 0.0, 0.0, 10.0, 10.0),
            rect_region("b", 10.0, 0.0, 20.0, 10.0),
        ])
        .expect("index");
        assert!(index.region_at(DVec2::new(10.0, 5.0)).is_none());
        assert_eq!(
            index.region_at(DVec2::new(10.5, 5.0)).map(|r| r.code.as_str()),
            Some("b")
        );
    }

    #[test]
    fn nearest_distance_is_euclidean() {
        let deposits = vec![
            Deposit::new("a", Point::new(0.0, 0.0), Srid::LAMBERT_93),
            Deposit::new("b", Point::new(3_000.0, 4_000.0), Srid::LAMBERT_93),
        ];
        let index = DepositIndex::build(deposits).expect("index");

        let (deposit, distance) = index
            .nearest_deposit(DVec2::new(3_000.0, 4_100.0))
            .expect("nearest");
        assert_eq!(deposit.description, "b");
        assert!((distance - 100.0).abs() < 1e-9);

        let at_site = index
            .nearest_distance(DVec2::new(0.0, 0.0))
            .expect("distance");
        assert_eq!(at_site, 0.0);
    }

    #[test]
    fn nearest_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(5);
        let deposits: Vec<_> = (0..200)
            .map(|i| {
                Deposit::new(
                    format!("d{i}"),
                    Point::new(rand_unit(&mut rng) * 1e5, rand_unit(&mut rng) * 1e5),
                    Srid::LAMBERT_93,
                )
            })
            .collect();
        let index = DepositIndex::build(deposits.clone()).expect("index");

        for _ in 0..500 {
            let p = DVec2::new(rand_unit(&mut rng) * 1e5, rand_unit(&mut rng) * 1e5);
            let expected = deposits
                .iter()
                .map(|d| DVec2::new(d.location.x(), d.location.y()).distance(p))
                .fold(f64::INFINITY, f64::min);
            let actual = index.nearest_distance(p).expect("distance");
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_inputs_are_configuration_errors() {
        assert!(matches!(
            RegionIndex::build(Vec::new()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            DepositIndex::build(Vec::new()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn mixed_deposit_srids_are_rejected() {
        let deposits = vec![
            Deposit::new("a", Point::new(0.0, 0.0), Srid(2154)),
            Deposit::new("b", Point::new(1.0, 0.0), Srid(4326)),
        ];
        assert!(matches!(
            DepositIndex::build(deposits),
            Err(Error::InvalidConfig(_))
        ));
    }
}
