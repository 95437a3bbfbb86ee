//! plotex-extractor library interface
//!
//! Plot-level trait extraction: geolocate candidate images, merge sidecar
//! metadata, run a pluggable trait algorithm, reconcile its output against the
//! BETYdb trait schema, append the row to a shared CSV file and upload it.

pub mod algorithm;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod services;

pub use crate::algorithm::{AlgorithmOutput, TraitAlgorithm};
pub use crate::context::RunContext;
pub use crate::error::{ExtractorError, ExtractorResult};
pub use crate::pipeline::{run, RunSummary};
