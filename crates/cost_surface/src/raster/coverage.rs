//! Burning a contour into a grid-aligned coverage mask.
//!
//! Two rules, matching the usual raster burn semantics:
//! - centre rule: a cell is covered when its centre lies inside the contour
//!   (even-odd scanline over every ring, so holes are respected);
//! - all-touched rule: additionally, every cell an edge of the contour passes through
//!   or touches is covered.
//!
//! Both rules visit each (edge, row) crossing once, so the cost scales with the
//! boundary length rather than with `cells * vertices`.
use geo::{Coord, MultiPolygon};

use super::grid::Grid;
use super::tile::TileDescriptor;

type Edge = (Coord<f64>, Coord<f64>);

/// Ring edges of a contour, ready to be burned into any window of a grid.
#[derive(Clone, Debug)]
pub struct CoverageBurner {
    edges: Vec<Edge>,
    all_touched: bool,
}

impl CoverageBurner {
    pub fn new(contour: &MultiPolygon<f64>, all_touched: bool) -> Self {
        let mut edges = Vec::new();
        for polygon in &contour.0 {
            let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
            for ring in rings {
                edges.extend(ring.lines().map(|l| (l.start, l.end)));
            }
        }
        Self { edges, all_touched }
    }

    /// Row-major coverage of the pixels under `window`.
    ///
    /// Rows and columns are resolved in grid coordinates, so a window's mask equals the
    /// matching slice of the whole-grid mask.
    pub fn burn(&self, grid: &Grid, window: &TileDescriptor) -> Vec<bool> {
        let mut mask = vec![false; window.len()];
        if window.is_empty() {
            return mask;
        }
        burn_centres(&self.edges, grid, window, &mut mask);
        if self.all_touched {
            burn_edges(&self.edges, grid, window, &mut mask);
        }
        mask
    }
}

/// Index of the first column whose centre is at or right of `x`, clamped to `[0, width]`.
fn first_centre_at_or_after(grid: &Grid, x: f64) -> usize {
    let t = ((x - grid.origin.x) / grid.scale.x - 0.5).ceil();
    t.clamp(0.0, grid.width as f64) as usize
}

fn burn_centres(edges: &[Edge], grid: &Grid, window: &TileDescriptor, mask: &mut [bool]) {
    let step = -grid.scale.y;
    let (row_lo, row_hi) = (window.y_offset, window.y_offset + window.height - 1);
    let (col_lo, col_hi) = (window.x_offset, window.x_offset + window.width);
    let mut crossings: Vec<Vec<f64>> = vec![Vec::new(); window.height];

    for &(a, b) in edges {
        if a.y == b.y {
            continue;
        }
        let (lo, hi) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
        // Rows whose centre y satisfies lo <= cy < hi, widened by one row each way;
        // the exact test below settles the boundary rows.
        let first = ((grid.origin.y - hi) / step - 0.5).floor();
        let last = ((grid.origin.y - lo) / step - 0.5).floor() + 1.0;
        if last < row_lo as f64 || first > row_hi as f64 {
            continue;
        }
        let first = (first.max(0.0) as usize).max(row_lo);
        let last = (last as usize).min(row_hi);
        for row in first..=last {
            let cy = grid.pixel_center(0, row).y;
            if (a.y > cy) == (b.y > cy) {
                continue;
            }
            crossings[row - row_lo].push(a.x + (cy - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }

    for (local_row, xs) in crossings.iter_mut().enumerate() {
        xs.sort_by(f64::total_cmp);
        let base = local_row * window.width;
        for span in xs.chunks_exact(2) {
            let start = first_centre_at_or_after(grid, span[0]).clamp(col_lo, col_hi);
            let end = first_centre_at_or_after(grid, span[1]).clamp(col_lo, col_hi);
            if end <= start {
                continue;
            }
            for covered in &mut mask[base + start - col_lo..base + end - col_lo] {
                *covered = true;
            }
        }
    }
}

fn burn_edges(edges: &[Edge], grid: &Grid, window: &TileDescriptor, mask: &mut [bool]) {
    let step = -grid.scale.y;
    let (row_lo, row_hi) = (window.y_offset as f64, (window.y_offset + window.height - 1) as f64);
    let (col_lo, col_hi) = (window.x_offset as f64, (window.x_offset + window.width - 1) as f64);

    for &(a, b) in edges {
        let (lo, hi) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
        let first = ((grid.origin.y - hi) / step - 1.0).ceil();
        let last = ((grid.origin.y - lo) / step).floor();
        if last < row_lo || first > row_hi {
            continue;
        }
        let first = first.max(row_lo) as usize;
        let last = last.min(row_hi) as usize;

        for row in first..=last {
            let top = grid.pixel_to_world(0, row).y;
            let bottom = top - step;
            // Clip the edge to the row band [bottom, top].
            let (xa, xb) = if a.y == b.y {
                (a.x.min(b.x), a.x.max(b.x))
            } else {
                let t0 = ((top - a.y) / (b.y - a.y)).clamp(0.0, 1.0);
                let t1 = ((bottom - a.y) / (b.y - a.y)).clamp(0.0, 1.0);
                let x0 = a.x + t0 * (b.x - a.x);
                let x1 = a.x + t1 * (b.x - a.x);
                (x0.min(x1), x0.max(x1))
            };
            let c0 = ((xa - grid.origin.x) / grid.scale.x - 1.0).ceil();
            let c1 = ((xb - grid.origin.x) / grid.scale.x).floor();
            if c1 < col_lo || c0 > col_hi {
                continue;
            }
            let c0 = c0.max(col_lo) as usize - window.x_offset;
            let c1 = c1.min(col_hi) as usize - window.x_offset;
            let base = (row - window.y_offset) * window.width;
            for covered in &mut mask[base + c0..=base + c1] {
                *covered = true;
            }
        }
    }
}
