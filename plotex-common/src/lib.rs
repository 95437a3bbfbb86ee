//! # plotex Common Library
//!
//! Shared code for plot-level trait extractors including:
//! - Error types
//! - TOML configuration loading and resolution
//! - Tracing initialization
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
