//! Test helper utilities
//!
//! Shared fixtures for plotex-extractor integration tests

#![allow(dead_code)]

pub mod geotiff;
pub mod log_capture;
pub mod mock_betydb;

pub use geotiff::{write_geotiff, write_plain_tiff, GeoTiffSpec};
pub use log_capture::LogCapture;
pub use mock_betydb::{spawn_mock_betydb, MockBetyDb};

use plotex_common::config::{ExtractorConfig, VariableNames};

/// Configuration for a "Canopy Cover" extractor with the given variable fields
pub fn test_config(variable_names: &str) -> ExtractorConfig {
    ExtractorConfig {
        extractor_name: "Canopy Cover".to_string(),
        variable_names: VariableNames::Joined(variable_names.to_string()),
        ..ExtractorConfig::default()
    }
}
