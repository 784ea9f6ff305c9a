//! Single-band GeoTIFF serialization of a [`Raster`].
//!
//! The file carries the affine transform (ModelPixelScale + ModelTiepoint), the CRS as an
//! EPSG code in the GeoKey directory, and the nodata sentinel in the GDAL_NODATA tag, which
//! is what standard GIS tooling reads.
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard, TiffValue};
use tiff::tags::Tag;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::raster::{PixelType, Raster};

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// GeoKey directory: header `[version, revision, minor, count]` then one
/// `[key, location, count, value]` entry per key.
#[rustfmt::skip]
fn geo_key_directory(raster: &Raster) -> Result<Vec<u16>> {
    let srid = raster.grid.srid;
    let code = u16::try_from(srid.0).map_err(|_| {
        Error::Export(format!("{srid} does not fit a GeoTIFF short key value"))
    })?;
    let (model_type, crs_key) = if srid.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, KEY_GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, KEY_PROJECTED_CS_TYPE)
    };
    Ok(vec![
        1, 1, 0, 3,
        KEY_MODEL_TYPE, 0, 1, model_type,
        KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, code,
    ])
}

/// Text form of the nodata value as GDAL expects it.
pub fn nodata_text(raster: &Raster) -> String {
    let nodata = raster.grid.nodata;
    if raster.grid.pixel_type.is_integer() {
        format!("{}", nodata as i64)
    } else {
        format!("{nodata}")
    }
}

fn write_geo_tags<W: Write + Seek>(
    dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>,
    raster: &Raster,
) -> Result<()> {
    let [x0, sx, _, y0, _, sy] = raster.grid.geo_transform();
    let pixel_scale = [sx, -sy, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, x0, y0, 0.0];
    let keys = geo_key_directory(raster)?;
    let nodata = nodata_text(raster);

    dir.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &pixel_scale[..])?;
    dir.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])?;
    dir.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &keys[..])?;
    dir.write_tag(Tag::Unknown(TAG_GDAL_NODATA), nodata.as_str())?;
    Ok(())
}

fn write_band<W, C>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster,
    data: &[C::Inner],
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let (width, height) = raster.size();
    let width = u32::try_from(width)
        .map_err(|_| Error::Export(format!("raster width {width} exceeds TIFF limits")))?;
    let height = u32::try_from(height)
        .map_err(|_| Error::Export(format!("raster height {height} exceeds TIFF limits")))?;

    let mut image = encoder.new_image::<C>(width, height)?;
    write_geo_tags(image.encoder(), raster)?;
    image.write_data(data)?;
    Ok(())
}

/// Encodes `raster` as a GeoTIFF into `writer`.
///
/// Every failure, including TIFF and IO errors from `writer`, is reported as
/// [`Error::Export`].
pub fn encode_geotiff<W: Write + Seek>(raster: &Raster, writer: W) -> Result<()> {
    encode_bands(raster, writer).map_err(|e| match e {
        Error::Export(_) => e,
        other => Error::Export(format!("encoding GeoTIFF: {other}")),
    })
}

fn encode_bands<W: Write + Seek>(raster: &Raster, writer: W) -> Result<()> {
    if raster.grid.is_empty() {
        return Err(Error::Export("cannot encode an empty raster".into()));
    }
    if raster.data.len() != raster.grid.len() {
        return Err(Error::Export(format!(
            "raster holds {} pixels, grid expects {}",
            raster.data.len(),
            raster.grid.len()
        )));
    }

    let mut encoder = TiffEncoder::new(writer)?;
    let values = &raster.data;
    match raster.grid.pixel_type {
        PixelType::U8 => {
            let data: Vec<u8> = values.iter().map(|v| *v as u8).collect();
            write_band::<_, colortype::Gray8>(&mut encoder, raster, &data)
        }
        PixelType::U16 => {
            let data: Vec<u16> = values.iter().map(|v| *v as u16).collect();
            write_band::<_, colortype::Gray16>(&mut encoder, raster, &data)
        }
        PixelType::U32 => {
            let data: Vec<u32> = values.iter().map(|v| *v as u32).collect();
            write_band::<_, colortype::Gray32>(&mut encoder, raster, &data)
        }
        PixelType::F32 => {
            let data: Vec<f32> = values.iter().map(|v| *v as f32).collect();
            write_band::<_, colortype::Gray32Float>(&mut encoder, raster, &data)
        }
        PixelType::F64 => write_band::<_, colortype::Gray64Float>(&mut encoder, raster, values),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes `raster` to `path` as a GeoTIFF.
///
/// The file is encoded next to its destination and renamed into place only once complete;
/// on failure no file is left at `path`.
pub fn write_geotiff(raster: &Raster, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let partial = partial_path(path);

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&partial)?);
        encode_geotiff(raster, &mut writer)?;
        let file = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        fs::rename(&partial, path)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            info!(
                "Wrote {}x{} GeoTIFF ({:?}, {}) to {}.",
                raster.grid.width,
                raster.grid.height,
                raster.grid.pixel_type,
                raster.grid.srid,
                path.display()
            );
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&partial) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Could not remove partial file {}: {}.",
                        partial.display(),
                        cleanup
                    );
                }
            }
            Err(match e {
                Error::Export(_) => e,
                other => Error::Export(format!("writing {}: {other}", path.display())),
            })
        }
    }
}
