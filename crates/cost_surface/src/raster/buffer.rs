//! Full-resolution pixel buffer tied to a [`Grid`].
use super::grid::Grid;

/// A row-major pixel buffer with the grid that geo-references it.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pub grid: Grid,
    pub data: Vec<f64>,
}

impl Raster {
    /// Create a raster with every pixel set to `value`.
    pub fn filled(grid: Grid, value: f64) -> Self {
        let len = grid.len();
        Self {
            grid,
            data: vec![value; len],
        }
    }

    /// Create a raster with every pixel set to the grid's nodata sentinel.
    pub fn nodata(grid: Grid) -> Self {
        let nodata = grid.nodata;
        Self::filled(grid, nodata)
    }

    /// Get the size of the raster as `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        (self.grid.width, self.grid.height)
    }

    /// Get the value at pixel `(x, y)`, or `None` out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.grid.width || y >= self.grid.height {
            return None;
        }
        Some(self.data[self.grid.index(x, y)])
    }

    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        let i = self.grid.index(x, y);
        self.data[i] = value;
    }

    /// One row of pixels.
    pub fn row(&self, y: usize) -> &[f64] {
        let start = self.grid.index(0, y);
        &self.data[start..start + self.grid.width]
    }

    pub fn is_nodata(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_none_or(|v| v == self.grid.nodata)
    }

    /// Number of pixels holding a value other than nodata.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| **v != self.grid.nodata).count()
    }
}
