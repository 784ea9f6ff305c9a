//! Grid descriptor and pixel encodings.
//!
//! A [`Grid`] is a north-up raster: `scale.x > 0`, `scale.y < 0`, and the origin is the
//! upper-left corner of pixel `(0, 0)`. Pixel `(x, y)` maps to the world coordinate
//! `origin + (x, y) * scale`.
use glam::DVec2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spatial::Srid;

/// Storage encoding of one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PixelType {
    U8,
    U16,
    #[default]
    U32,
    F32,
    F64,
}

/// A value after encoding into a [`PixelType`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantized {
    pub value: f64,
    /// Whether the input fell outside the encodable range and was saturated.
    pub clamped: bool,
}

impl PixelType {
    /// Inclusive range of encodable values.
    pub fn range(self) -> (f64, f64) {
        match self {
            PixelType::U8 => (0.0, u8::MAX as f64),
            PixelType::U16 => (0.0, u16::MAX as f64),
            PixelType::U32 => (0.0, u32::MAX as f64),
            PixelType::F32 => (f32::MIN as f64, f32::MAX as f64),
            PixelType::F64 => (f64::MIN, f64::MAX),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, PixelType::U8 | PixelType::U16 | PixelType::U32)
    }

    /// Returns `true` if `value` round-trips through this encoding unchanged.
    pub fn can_represent(self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let (lo, hi) = self.range();
        match self {
            PixelType::F32 => (value as f32) as f64 == value,
            PixelType::F64 => true,
            _ => value >= lo && value <= hi && value.trunc() == value,
        }
    }

    /// Encodes `value`: integers truncate toward zero, every type saturates at its range.
    /// NaN is passed through; callers decide how to treat it.
    pub fn quantize(self, value: f64) -> Quantized {
        let (lo, hi) = self.range();
        let v = if self.is_integer() { value.trunc() } else { value };
        let clamped = v < lo || v > hi;
        let v = v.clamp(lo, hi);
        let v = match self {
            PixelType::F32 => (v as f32) as f64,
            _ => v,
        };
        Quantized { value: v, clamped }
    }

    /// The encodable neighbour of `value` one step closer to zero (one step up from zero).
    pub fn adjacent_toward_zero(self, value: f64) -> f64 {
        match self {
            PixelType::F32 => {
                let v = value as f32;
                if v == 0.0 {
                    f32::from_bits(1) as f64
                } else {
                    f32::from_bits(v.to_bits() - 1) as f64
                }
            }
            PixelType::F64 => {
                if value == 0.0 {
                    f64::from_bits(1)
                } else {
                    f64::from_bits(value.to_bits() - 1)
                }
            }
            _ => {
                if value > 0.0 {
                    value - 1.0
                } else {
                    value + 1.0
                }
            }
        }
    }
}

/// Immutable, geo-referenced pixel grid.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid {
    /// Upper-left corner `(xmin, ymax)` in world units.
    pub origin: DVec2,
    /// Pixel size; `x` is positive, `y` is negative.
    pub scale: DVec2,
    pub width: usize,
    pub height: usize,
    pub srid: Srid,
    pub pixel_type: PixelType,
    /// Sentinel for pixels outside the contour or without a result.
    pub nodata: f64,
    /// Initial value of in-contour pixels before evaluation.
    pub default_value: f64,
}

impl Grid {
    /// Total number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major buffer index of pixel `(x, y)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// World coordinate of the upper-left corner of pixel `(x, y)`.
    #[inline]
    pub fn pixel_to_world(&self, x: usize, y: usize) -> DVec2 {
        self.origin + DVec2::new(x as f64, y as f64) * self.scale
    }

    /// World coordinate of the centre of pixel `(x, y)`.
    #[inline]
    pub fn pixel_center(&self, x: usize, y: usize) -> DVec2 {
        self.origin + (DVec2::new(x as f64, y as f64) + 0.5) * self.scale
    }

    /// Pixel containing `p`, or `None` outside the grid.
    pub fn world_to_pixel(&self, p: DVec2) -> Option<(usize, usize)> {
        let rel = (p - self.origin) / self.scale;
        let (fx, fy) = (rel.x.floor(), rel.y.floor());
        if fx < 0.0 || fy < 0.0 || fx >= self.width as f64 || fy >= self.height as f64 {
            return None;
        }
        Some((fx as usize, fy as usize))
    }

    /// GDAL-style affine transform `[x0, sx, skew_x, y0, skew_y, sy]`.
    pub fn geo_transform(&self) -> [f64; 6] {
        [
            self.origin.x,
            self.scale.x,
            0.0,
            self.origin.y,
            0.0,
            self.scale.y,
        ]
    }

    /// Returns an error unless the given metadata matches this grid exactly.
    pub fn check_compatible(
        &self,
        scale: DVec2,
        srid: Srid,
        pixel_type: PixelType,
        nodata: f64,
    ) -> Result<()> {
        if scale != self.scale {
            return Err(Error::InvalidConfig(format!(
                "scale {scale:?} does not match grid scale {:?}",
                self.scale
            )));
        }
        if srid != self.srid {
            return Err(Error::InvalidConfig(format!(
                "{srid} does not match grid {}",
                self.srid
            )));
        }
        if pixel_type != self.pixel_type {
            return Err(Error::InvalidConfig(format!(
                "pixel type {pixel_type:?} does not match grid {:?}",
                self.pixel_type
            )));
        }
        if nodata != self.nodata {
            return Err(Error::InvalidConfig(format!(
                "nodata {nodata} does not match grid nodata {}",
                self.nodata
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        Grid {
            origin: DVec2::new(100.0, 900.0),
            scale: DVec2::new(10.0, -10.0),
            width: 4,
            height: 3,
            srid: Srid::LAMBERT_93,
            pixel_type: PixelType::U32,
            nodata: 2_147_483_647.0,
            default_value: 0.0,
        }
    }

    #[test]
    fn pixel_to_world_walks_down_and_right() {
        let grid = sample_grid();
        assert_eq!(grid.pixel_to_world(0, 0), DVec2::new(100.0, 900.0));
        assert_eq!(grid.pixel_to_world(2, 1), DVec2::new(120.0, 890.0));
        assert_eq!(grid.pixel_center(0, 0), DVec2::new(105.0, 895.0));
    }

    #[test]
    fn world_to_pixel_inverts_pixel_center() {
        let grid = sample_grid();
        assert_eq!(grid.world_to_pixel(grid.pixel_center(3, 2)), Some((3, 2)));
        assert_eq!(grid.world_to_pixel(DVec2::new(99.0, 895.0)), None);
        assert_eq!(grid.world_to_pixel(DVec2::new(141.0, 895.0)), None);
    }

    #[test]
    fn geo_transform_is_gdal_ordered() {
        let grid = sample_grid();
        assert_eq!(grid.geo_transform(), [100.0, 10.0, 0.0, 900.0, 0.0, -10.0]);
    }

    #[test]
    fn integer_quantize_truncates_and_saturates() {
        let q = PixelType::U32.quantize(40.9);
        assert_eq!(q, Quantized { value: 40.0, clamped: false });

        let q = PixelType::U8.quantize(300.0);
        assert_eq!(q, Quantized { value: 255.0, clamped: true });

        let q = PixelType::U16.quantize(-3.5);
        assert_eq!(q, Quantized { value: 0.0, clamped: true });
    }

    #[test]
    fn float_quantize_keeps_fraction() {
        let q = PixelType::F64.quantize(12.25);
        assert_eq!(q.value, 12.25);
        assert!(!q.clamped);

        let q = PixelType::F32.quantize(1e300);
        assert_eq!(q.value, f32::MAX as f64);
        assert!(q.clamped);
    }

    #[test]
    fn adjacent_toward_zero_moves_one_step() {
        assert_eq!(PixelType::U32.adjacent_toward_zero(10.0), 9.0);
        assert_eq!(PixelType::U32.adjacent_toward_zero(0.0), 1.0);
        let f = PixelType::F64.adjacent_toward_zero(1.0);
        assert!(f < 1.0 && f > 0.999_999);
    }

    #[test]
    fn representability() {
        assert!(PixelType::U32.can_represent(2_147_483_647.0));
        assert!(!PixelType::U8.can_represent(256.0));
        assert!(!PixelType::U16.can_represent(1.5));
        assert!(!PixelType::F64.can_represent(f64::NAN));
        assert!(PixelType::F32.can_represent(-9999.0));
    }

    #[test]
    fn compatibility_check_flags_each_field() {
        let grid = sample_grid();
        assert!(grid
            .check_compatible(grid.scale, grid.srid, grid.pixel_type, grid.nodata)
            .is_ok());
        assert!(grid
            .check_compatible(DVec2::new(5.0, -5.0), grid.srid, grid.pixel_type, grid.nodata)
            .is_err());
        assert!(grid
            .check_compatible(grid.scale, Srid(4326), grid.pixel_type, grid.nodata)
            .is_err());
    }
}
