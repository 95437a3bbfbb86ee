//! Input path discovery
//!
//! Splits the invocation's path list into image files, JSON metadata files and
//! paths that could not be accessed. Directories are walked recursively and
//! their files classified with the same rules.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filename extensions of supported image types (lowercase, no leading period)
pub const KNOWN_IMAGE_EXTENSIONS: &[&str] = &["tif", "tiif", "tiff", "jpg"];

/// Classified input paths, each list in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredInputs {
    /// Existing image files
    pub images: Vec<PathBuf>,
    /// Existing JSON metadata files
    pub metadata: Vec<PathBuf>,
    /// Image or metadata paths that do not exist
    pub unavailable: Vec<PathBuf>,
}

impl DiscoveredInputs {
    fn extend(&mut self, other: DiscoveredInputs) {
        self.images.extend(other.images);
        self.metadata.extend(other.metadata);
        self.unavailable.extend(other.unavailable);
    }
}

enum PathKind {
    Metadata,
    Image,
    Other,
}

fn classify(path: &Path) -> PathKind {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());

    match ext.as_deref() {
        Some("json") => PathKind::Metadata,
        Some(ext) if KNOWN_IMAGE_EXTENSIONS.contains(&ext) => PathKind::Image,
        _ => PathKind::Other,
    }
}

/// Classify `paths`, walking any directories
pub fn scan_inputs(paths: &[PathBuf]) -> DiscoveredInputs {
    let mut found = DiscoveredInputs::default();

    for path in paths {
        match classify(path) {
            PathKind::Metadata => {
                if path.exists() {
                    found.metadata.push(path.clone());
                } else {
                    found.unavailable.push(path.clone());
                }
            }
            PathKind::Image => {
                if path.exists() {
                    found.images.push(path.clone());
                } else {
                    found.unavailable.push(path.clone());
                }
            }
            PathKind::Other if path.is_dir() => {
                found.extend(scan_directory(path));
            }
            PathKind::Other => {
                tracing::debug!(path = %path.display(), "Ignoring unsupported input path");
            }
        }
    }

    found
}

fn scan_directory(root: &Path) -> DiscoveredInputs {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing entry under {}: {}", root.display(), e);
                // Continue scanning, don't abort
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = files.len(),
        "Directory scan complete"
    );

    scan_inputs(&files)
}
