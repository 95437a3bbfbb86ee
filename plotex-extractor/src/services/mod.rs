//! Pipeline components
//!
//! Leaves first: input discovery, georeferencing, metadata merging, the trait
//! schema, output reconciliation, durable CSV appends and the BETYdb upload.

pub mod betydb_client;
pub mod csv_appender;
pub mod geo_bounds;
pub mod input_scanner;
pub mod metadata_merger;
pub mod result_reconciler;
pub mod trait_schema;

pub use betydb_client::{BetyDbClient, UploadError};
pub use csv_appender::{next_delay, CsvAppender, SystemDraw, UnitDraw};
pub use geo_bounds::{load_image_candidates, GeoBounds, GeoPoint, ImageCandidate};
pub use input_scanner::{scan_inputs, DiscoveredInputs};
pub use metadata_merger::{merge_metadata, MetadataBundle};
pub use result_reconciler::{reconcile, ReconcileError};
pub use trait_schema::{TraitRow, TraitSchema, TraitValue};
