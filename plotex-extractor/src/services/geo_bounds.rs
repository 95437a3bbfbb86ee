//! Image georeferencing
//!
//! Reads the bounding rectangle and EPSG code embedded in a GeoTIFF and builds
//! the closed, clockwise boundary ring used by downstream geometry consumers.
//!
//! Bounds come from ModelTiepoint + ModelPixelScale, or from
//! ModelTransformation when no tiepoint is present. The EPSG code is the
//! ProjectedCSType key of the GeoKeyDirectory, falling back to GeographicType.
//!
//! A file without usable bounds is not an error: it simply yields no candidate.
//! A file WITH bounds but without a valid EPSG code aborts the run.

use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::error::{ExtractorError, ExtractorResult};

/// GeoKeyDirectory key holding a projected CRS code
const PROJECTED_CS_TYPE_GEO_KEY: u32 = 3072;
/// GeoKeyDirectory key holding a geographic CRS code
const GEOGRAPHIC_TYPE_GEO_KEY: u32 = 2048;
/// GeoTIFF "user-defined" marker; not an EPSG code
const USER_DEFINED: u32 = 32767;
/// Smallest code GeoTIFF reserves for EPSG definitions
const MIN_EPSG_CODE: u32 = 1024;

/// Raw axis-aligned bounds, in the order min Y, max Y, min X, max X
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub min_y: f64,
    pub max_y: f64,
    pub min_x: f64,
    pub max_x: f64,
}

impl GeoBounds {
    fn is_valid(&self) -> bool {
        [self.min_y, self.max_y, self.min_x, self.max_x]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Closed ring, clockwise from the upper-left corner
    pub fn ring(&self) -> [GeoPoint; 5] {
        let upper_left = GeoPoint::new(self.min_x, self.max_y);
        [
            upper_left,
            GeoPoint::new(self.max_x, self.max_y), // upper right
            GeoPoint::new(self.max_x, self.min_y), // lower right
            GeoPoint::new(self.min_x, self.min_y), // lower left
            upper_left,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Georeferenced image usable for extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCandidate {
    path: PathBuf,
    bounds: GeoBounds,
    ring: [GeoPoint; 5],
    epsg: u32,
}

impl ImageCandidate {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Boundary polygon; always 5 points with the first repeated last
    pub fn ring(&self) -> &[GeoPoint; 5] {
        &self.ring
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }
}

/// What a file's tags say about its placement
#[derive(Debug, Clone, Copy, PartialEq)]
struct Georeference {
    bounds: GeoBounds,
    epsg: Option<u32>,
}

/// Resolve one image into a candidate
///
/// Returns `Ok(None)` when the file carries no usable bounds, and an error when
/// bounds are present but the EPSG code is missing or invalid.
pub fn resolve(path: &Path) -> ExtractorResult<Option<ImageCandidate>> {
    let Some(georef) = read_georeference(path) else {
        tracing::info!(path = %path.display(), "No geographic boundaries found, skipping image");
        return Ok(None);
    };

    let epsg = match georef.epsg {
        Some(code) if is_valid_epsg(code) => code,
        Some(code) => {
            return Err(ExtractorError::SpatialReference {
                path: path.display().to_string(),
                reason: format!("Failed to import EPSG {}", code),
            })
        }
        None => {
            return Err(ExtractorError::SpatialReference {
                path: path.display().to_string(),
                reason: "File is missing an EPSG code".to_string(),
            })
        }
    };

    tracing::debug!(
        path = %path.display(),
        epsg,
        bounds = ?georef.bounds,
        "Image georeferenced"
    );

    Ok(Some(ImageCandidate {
        path: path.to_path_buf(),
        bounds: georef.bounds,
        ring: georef.bounds.ring(),
        epsg,
    }))
}

/// Resolve every path in order, dropping images without bounds
pub fn load_image_candidates(paths: &[PathBuf]) -> ExtractorResult<Vec<ImageCandidate>> {
    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(candidate) = resolve(path)? {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

fn is_valid_epsg(code: u32) -> bool {
    (MIN_EPSG_CODE..USER_DEFINED).contains(&code)
}

fn read_georeference(path: &Path) -> Option<Georeference> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Unable to open image: {}", e);
            return None;
        }
    };

    // Not a TIFF (e.g. JPEG): no embedded georeferencing
    let mut decoder = match Decoder::new(BufReader::new(file)) {
        Ok(decoder) => decoder,
        Err(e) => {
            tracing::debug!(path = %path.display(), "Not a readable TIFF: {}", e);
            return None;
        }
    };

    match read_tags(&mut decoder) {
        Ok(georef) => georef,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Unable to read georeferencing tags: {}", e);
            None
        }
    }
}

fn read_tags<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> TiffResult<Option<Georeference>> {
    let (width, height) = decoder.dimensions()?;

    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let transform = decoder
        .find_tag(Tag::ModelTransformationTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    let bounds = match (tiepoint, scale, transform) {
        (Some(tiepoint), Some(scale), _) => bounds_from_tiepoint(&tiepoint, &scale, width, height),
        (_, _, Some(transform)) => bounds_from_transform(&transform, width, height),
        _ => None,
    };
    let Some(bounds) = bounds.filter(GeoBounds::is_valid) else {
        return Ok(None);
    };

    let epsg = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)?
        .map(|v| v.into_u32_vec())
        .transpose()?
        .and_then(|keys| epsg_from_geokeys(&keys));

    Ok(Some(Georeference { bounds, epsg }))
}

/// Bounds from the first tiepoint `(I, J, K, X, Y, Z)` and pixel scale `(Sx, Sy, Sz)`
fn bounds_from_tiepoint(tiepoint: &[f64], scale: &[f64], width: u32, height: u32) -> Option<GeoBounds> {
    if tiepoint.len() < 6 || scale.len() < 2 {
        return None;
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let (sx, sy) = (scale[0], scale[1]);

    let min_x = x - i * sx;
    let max_y = y + j * sy;
    Some(GeoBounds {
        min_y: max_y - f64::from(height) * sy,
        max_y,
        min_x,
        max_x: min_x + f64::from(width) * sx,
    })
}

/// Bounds of the four raster corners under a row-major 4x4 model transformation
fn bounds_from_transform(matrix: &[f64], width: u32, height: u32) -> Option<GeoBounds> {
    if matrix.len() < 16 {
        return None;
    }
    let project = |i: f64, j: f64| {
        (
            matrix[0] * i + matrix[1] * j + matrix[3],
            matrix[4] * i + matrix[5] * j + matrix[7],
        )
    };
    let (w, h) = (f64::from(width), f64::from(height));
    let corners = [project(0.0, 0.0), project(w, 0.0), project(w, h), project(0.0, h)];

    let mut bounds = GeoBounds {
        min_y: f64::INFINITY,
        max_y: f64::NEG_INFINITY,
        min_x: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
    };
    for (x, y) in corners {
        bounds.min_x = bounds.min_x.min(x);
        bounds.max_x = bounds.max_x.max(x);
        bounds.min_y = bounds.min_y.min(y);
        bounds.max_y = bounds.max_y.max(y);
    }
    Some(bounds)
}

/// EPSG code from a GeoKeyDirectory (4-value header, then 4-value key entries)
///
/// Only codes stored inline (TIFFTagLocation == 0) are considered.
fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(count).collect();

    let lookup = |key_id: u32| {
        entries
            .iter()
            .find(|entry| entry[0] == key_id && entry[1] == 0)
            .map(|entry| entry[3])
    };

    lookup(PROJECTED_CS_TYPE_GEO_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bounds() -> GeoBounds {
        GeoBounds {
            min_y: 10.0,
            max_y: 20.0,
            min_x: 100.0,
            max_x: 150.0,
        }
    }

    #[test]
    fn test_ring_is_closed_and_clockwise_from_upper_left() {
        let ring = sample_bounds().ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(ring[0], GeoPoint::new(100.0, 20.0));
        assert_eq!(ring[1], GeoPoint::new(150.0, 20.0));
        assert_eq!(ring[2], GeoPoint::new(150.0, 10.0));
        assert_eq!(ring[3], GeoPoint::new(100.0, 10.0));
    }

    #[test]
    fn test_bounds_from_tiepoint() {
        let bounds =
            bounds_from_tiepoint(&[0.0, 0.0, 0.0, 409000.0, 3660000.0, 0.0], &[0.5, 0.25, 0.0], 10, 8)
                .unwrap();
        assert_eq!(bounds.min_x, 409000.0);
        assert_eq!(bounds.max_x, 409005.0);
        assert_eq!(bounds.max_y, 3660000.0);
        assert_eq!(bounds.min_y, 3659998.0);
    }

    #[test]
    fn test_bounds_from_offset_tiepoint() {
        // Tiepoint anchored at raster (2, 4) rather than the origin
        let bounds =
            bounds_from_tiepoint(&[2.0, 4.0, 0.0, 12.0, 96.0, 0.0], &[1.0, 1.0, 0.0], 10, 10).unwrap();
        assert_eq!(bounds.min_x, 10.0);
        assert_eq!(bounds.max_y, 100.0);
        assert_eq!(bounds.max_x, 20.0);
        assert_eq!(bounds.min_y, 90.0);
    }

    #[test]
    fn test_bounds_from_transform() {
        #[rustfmt::skip]
        let matrix = [
            2.0, 0.0, 0.0, 50.0,
            0.0, -2.0, 0.0, 80.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let bounds = bounds_from_transform(&matrix, 5, 5).unwrap();
        assert_eq!(bounds.min_x, 50.0);
        assert_eq!(bounds.max_x, 60.0);
        assert_eq!(bounds.min_y, 70.0);
        assert_eq!(bounds.max_y, 80.0);
    }

    #[test]
    fn test_short_tags_yield_no_bounds() {
        assert!(bounds_from_tiepoint(&[0.0, 0.0, 0.0], &[1.0, 1.0], 1, 1).is_none());
        assert!(bounds_from_transform(&[1.0; 6], 1, 1).is_none());
    }

    #[test]
    fn test_nan_bounds_invalid() {
        let bounds = GeoBounds {
            min_y: f64::NAN,
            ..sample_bounds()
        };
        assert!(!bounds.is_valid());
        assert!(sample_bounds().is_valid());
    }

    #[test]
    fn test_epsg_prefers_projected_key() {
        let keys = [
            1, 1, 0, 2, // header: 2 keys
            2048, 0, 1, 4326, // GeographicType
            3072, 0, 1, 32612, // ProjectedCSType
        ];
        assert_eq!(epsg_from_geokeys(&keys), Some(32612));
    }

    #[test]
    fn test_epsg_geographic_fallback() {
        let keys = [1, 1, 0, 1, 2048, 0, 1, 4326];
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));
    }

    #[test]
    fn test_epsg_missing() {
        let keys = [1, 1, 0, 1, 1024, 0, 1, 1];
        assert_eq!(epsg_from_geokeys(&keys), None);
        assert_eq!(epsg_from_geokeys(&[1, 1]), None);
    }

    #[test]
    fn test_epsg_validity() {
        assert!(is_valid_epsg(4326));
        assert!(is_valid_epsg(32612));
        assert!(!is_valid_epsg(0));
        assert!(!is_valid_epsg(USER_DEFINED));
        assert!(!is_valid_epsg(70000));
    }

    #[test]
    fn test_non_tiff_yields_no_candidate() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("photo.jpg");
        std::fs::write(&path, b"definitely not a tiff").unwrap();

        assert!(resolve(&path).unwrap().is_none());
    }
}
