//! Plot extraction pipeline
//!
//! **Flow:**
//! 1. Geolocate candidate images (a run without one is fatal)
//! 2. Merge metadata sidecars once
//! 3. Per candidate: decode pixels, run the algorithm, reconcile, build the row
//! 4. Append the row to the shared CSV and write the JSON sidecar
//! 5. Upload all rows to BETYdb in one request
//!
//! A failure inside step 3 skips that image only.

use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::algorithm::{AlgorithmOutput, TraitAlgorithm};
use crate::context::RunContext;
use crate::error::{ExtractorError, ExtractorResult};
use crate::services::betydb_client::BetyDbClient;
use crate::services::csv_appender::CsvAppender;
use crate::services::geo_bounds::{load_image_candidates, ImageCandidate};
use crate::services::input_scanner::DiscoveredInputs;
use crate::services::metadata_merger::{merge_metadata, MetadataBundle};
use crate::services::result_reconciler::{reconcile, value_text};
use crate::services::trait_schema::{TraitRow, TraitValue};

/// What a run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// CSV data lines, in processing order
    pub rows: Vec<String>,
    /// CSV files appended to
    pub csv_paths: Vec<PathBuf>,
    /// JSON sidecars written
    pub metadata_paths: Vec<PathBuf>,
    /// Images that failed processing
    pub skipped_images: Vec<PathBuf>,
    /// Trait ids assigned by BETYdb, when an upload happened
    pub uploaded_ids: Option<Vec<i64>>,
}

/// Process one plot
///
/// "Finished processing" is logged however the run ends.
pub async fn run(
    ctx: &RunContext,
    inputs: &DiscoveredInputs,
    algorithm: &dyn TraitAlgorithm,
    uploader: Option<&BetyDbClient>,
) -> ExtractorResult<RunSummary> {
    let result = process(ctx, inputs, algorithm, uploader).await;
    tracing::info!("Finished processing");
    result
}

async fn process(
    ctx: &RunContext,
    inputs: &DiscoveredInputs,
    algorithm: &dyn TraitAlgorithm,
    uploader: Option<&BetyDbClient>,
) -> ExtractorResult<RunSummary> {
    tracing::info!(
        plot = %ctx.plot_name,
        germplasm = %ctx.germplasm,
        experiment = %ctx.experiment,
        images = inputs.images.len(),
        metadata = inputs.metadata.len(),
        "Starting plot extraction"
    );

    let candidates = load_image_candidates(&inputs.images)?;
    if candidates.is_empty() {
        return Err(ExtractorError::FatalInput(
            "No georeferenced image files were found to process".to_string(),
        ));
    }

    let metadata = merge_metadata(&inputs.metadata)?;
    let header = ctx.schema.csv_header();
    let mut appender = CsvAppender::new(&ctx.csv);
    let mut summary = RunSummary::default();

    for candidate in &candidates {
        let (csv_line, output) = match process_image(ctx, algorithm, candidate) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    path = %candidate.path().display(),
                    "Error generating {} for {}",
                    ctx.extractor_name,
                    ctx.plot_name
                );
                tracing::error!("    exception: {:#}", e);
                summary.skipped_images.push(candidate.path().to_path_buf());
                continue;
            }
        };

        if ctx.write_csv || ctx.write_betydb {
            summary.rows.push(csv_line.clone());
        }

        if ctx.write_csv {
            let dir = candidate.path().parent().unwrap_or_else(|| Path::new(""));
            let out_csv = dir.join(format!("{}.csv", ctx.output_stem()));
            let metadata_file = out_csv.with_extension("json");
            tracing::info!("Writing CSV to {}", out_csv.display());
            tracing::info!("Writing metadata to {}", metadata_file.display());

            if appender.append(&out_csv, &header, &csv_line).await? {
                summary.csv_paths.push(out_csv);
            }

            let content = sidecar_content(ctx, &metadata, &output, candidate.path());
            match write_sidecar(&metadata_file, &content) {
                Ok(()) => summary.metadata_paths.push(metadata_file),
                Err(e) => tracing::warn!("Exception updating metadata: {}", e),
            }
        }

        if ctx.first_image_only && candidates.len() > 1 {
            tracing::info!("Multiple image files were found, only using first found");
            break;
        }
    }

    if ctx.write_betydb {
        if summary.rows.is_empty() {
            tracing::info!("No BETYdb data was generated to upload");
        } else if let Some(client) = uploader {
            let ids = client.upload(&header, &summary.rows).await?;
            summary.uploaded_ids = Some(ids);
        } else {
            tracing::warn!(
                rows = summary.rows.len(),
                "BETYdb output is enabled but no BETYdb endpoint is configured; rows were not uploaded"
            );
        }
    }

    tracing::info!(
        rows = summary.rows.len(),
        skipped = summary.skipped_images.len(),
        "Plot extraction complete"
    );
    Ok(summary)
}

/// Decode, calculate, reconcile; returns the CSV line and the raw output
fn process_image(
    ctx: &RunContext,
    algorithm: &dyn TraitAlgorithm,
    candidate: &ImageCandidate,
) -> anyhow::Result<(String, AlgorithmOutput)> {
    // Format from content; `.tiif` and other accepted extensions are not known to `image`
    let pixels = image::ImageReader::open(candidate.path())?
        .with_guessed_format()?
        .decode()?;
    let output = algorithm.calculate(&pixels)?;
    tracing::debug!(
        path = %candidate.path().display(),
        shape = output.shape_name(),
        "Algorithm returned"
    );

    let values = reconcile(&output, &ctx.variable_names)?;

    let mut row = TraitRow::seeded(&ctx.schema);
    row.set("species", TraitValue::text(&ctx.germplasm));
    for (name, value) in ctx.variable_names.iter().zip(&values) {
        row.set(name.clone(), TraitValue::text(value_text(value)));
    }
    row.set("site", TraitValue::text(&ctx.plot_name));
    row.set("local_datetime", TraitValue::text(&ctx.local_datetime));

    Ok((row.to_csv_line(&ctx.schema), output))
}

fn sidecar_content(
    ctx: &RunContext,
    metadata: &MetadataBundle,
    output: &AlgorithmOutput,
    image: &Path,
) -> MetadataBundle {
    let mut comment = format!("Calculated {} value", ctx.sensor_name);
    if ctx.write_csv {
        comment.push_str(", and wrote values to CSV file");
    }
    if ctx.write_betydb {
        comment.push_str(", and wrote values to BETYdb");
    }
    comment.push('.');

    let calculated_value = serde_json::to_value(output).unwrap_or(Value::Null);

    let mut content = metadata.clone();
    content.insert(
        ctx.sensor_name.clone(),
        json!({
            "comment": comment,
            "calculated_value": calculated_value,
            "timestamp": plotex_common::time::now_iso(),
            "file": image.display().to_string(),
        }),
    );
    content
}

/// Pretty-printed with a 4-space indent
fn write_sidecar(path: &Path, content: &MetadataBundle) -> plotex_common::Result<()> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    content.serialize(&mut serializer)?;
    fs::write(path, buffer)?;
    Ok(())
}
