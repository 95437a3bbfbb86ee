//! GeoTIFF fixture generator
//!
//! Writes small RGB8 TIFFs carrying ModelTiepoint / ModelPixelScale /
//! GeoKeyDirectory tags.

use std::fs::File;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Georeferencing written into a fixture
#[derive(Debug, Clone)]
pub struct GeoTiffSpec {
    pub width: u32,
    pub height: u32,
    /// Upper-left corner (x, y)
    pub origin: (f64, f64),
    /// Pixel size (x, y)
    pub pixel_size: (f64, f64),
    /// ProjectedCSTypeGeoKey value; `None` writes no GeoKeyDirectory
    pub epsg: Option<u16>,
}

impl Default for GeoTiffSpec {
    fn default() -> Self {
        Self {
            width: 4,
            height: 4,
            origin: (409000.0, 3660000.0),
            pixel_size: (0.5, 0.5),
            epsg: Some(32612),
        }
    }
}

fn pixels(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| [(i % 256) as u8, 128, 64])
        .collect()
}

/// Write a georeferenced RGB8 TIFF
pub fn write_geotiff(path: &Path, spec: &GeoTiffSpec) -> anyhow::Result<()> {
    let mut encoder = TiffEncoder::new(File::create(path)?)?;
    let mut image = encoder.new_image::<colortype::RGB8>(spec.width, spec.height)?;

    image.encoder().write_tag(
        Tag::ModelPixelScaleTag,
        &[spec.pixel_size.0, spec.pixel_size.1, 0.0][..],
    )?;
    image.encoder().write_tag(
        Tag::ModelTiepointTag,
        &[0.0, 0.0, 0.0, spec.origin.0, spec.origin.1, 0.0][..],
    )?;
    if let Some(epsg) = spec.epsg {
        // Header (version 1.1.0, one key) + ProjectedCSTypeGeoKey
        image.encoder().write_tag(
            Tag::GeoKeyDirectoryTag,
            &[1u16, 1, 0, 1, 3072, 0, 1, epsg][..],
        )?;
    }

    image.write_data(&pixels(spec.width, spec.height))?;
    Ok(())
}

/// Write an RGB8 TIFF without georeferencing
pub fn write_plain_tiff(path: &Path, width: u32, height: u32) -> anyhow::Result<()> {
    let mut encoder = TiffEncoder::new(File::create(path)?)?;
    encoder.write_image::<colortype::RGB8>(width, height, &pixels(width, height))?;
    Ok(())
}
