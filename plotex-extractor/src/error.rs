//! Error types for plotex-extractor
//!
//! Only conditions that abort a run are represented here. Per-file and per-image
//! failures are logged where they happen and the run moves on.

use thiserror::Error;

use crate::services::betydb_client::UploadError;

/// Run-level error
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// Missing arguments, no image paths, or no usable image
    #[error("Invalid input: {0}")]
    FatalInput(String),

    /// Georeferenced image without a usable EPSG code
    #[error("Spatial reference error for {path}: {reason}")]
    SpatialReference { path: String, reason: String },

    /// Metadata directory could not be listed
    #[error("Unable to load metadata: {0}")]
    MetadataDirectory(String),

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// BETYdb upload failed
    #[error("BETYdb upload failed: {0}")]
    Upload(#[from] UploadError),

    /// plotex-common error
    #[error("Common error: {0}")]
    Common(#[from] plotex_common::Error),
}

/// Result type for run-level operations
pub type ExtractorResult<T> = Result<T, ExtractorError>;
