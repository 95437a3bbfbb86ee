//! plotex-extractor - Plot-level trait extractor
//!
//! One invocation processes one plot: the images and metadata named on the
//! command line produce a trait row that is appended to a shared CSV file and
//! uploaded to BETYdb.

use anyhow::{Context, Result};
use clap::Parser;
use plotex_common::config::{load_config_with_origin, resolve_config_path, CONFIG_ENV_VAR};
use plotex_common::logging::init_tracing;
use plotex_extractor::algorithm::NotImplemented;
use plotex_extractor::services::{scan_inputs, BetyDbClient, UploadError};
use plotex_extractor::{run, ExtractorError, RunContext};
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "plotex-extractor")]
#[command(about = "Plot-level trait extractor for BETYdb")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Germplasm name (recorded as the species)
    germplasm: String,

    /// Experiment name
    experiment: String,

    /// ISO 8601 timestamp of the capture
    timestamp: String,

    /// Plot name or "By Plot" label
    plot: String,

    /// Image files, JSON metadata files, or directories containing them
    #[arg(required = true, num_args = 1..)]
    paths: Vec<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (config, config_origin) =
        load_config_with_origin(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting plotex-extractor v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_origin.log();

    let inputs = scan_inputs(&args.paths);
    if !inputs.unavailable.is_empty() {
        let names: Vec<String> = inputs
            .unavailable
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        warn!("Unable to access the following files: {}", names.join(", "));
    }
    if inputs.images.is_empty() {
        return Err(ExtractorError::FatalInput("Image files must be specified".to_string()).into());
    }

    let ctx = RunContext::new(
        &config,
        &args.germplasm,
        &args.experiment,
        &args.timestamp,
        &args.plot,
    )?;

    let client = if ctx.write_betydb {
        match BetyDbClient::from_config(&config.betydb) {
            Ok(client) => Some(client),
            Err(UploadError::NotConfigured) => None,
            Err(e) => return Err(e).context("Failed to create BETYdb client"),
        }
    } else {
        None
    };

    let summary = run(&ctx, &inputs, &NotImplemented, client.as_ref()).await?;

    info!(
        rows = summary.rows.len(),
        skipped = summary.skipped_images.len(),
        uploaded = summary.uploaded_ids.as_ref().map(|ids| ids.len()).unwrap_or(0),
        "Run complete"
    );
    Ok(())
}
