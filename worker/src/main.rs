// ==============================================================================
// main.rs - CBD Worker Process
// ==============================================================================
// Description: Worker that builds compression-based distance matrices
// Author: CBD Service Team
// Created: 2026-07-16
// Modified: 2026-08-25
// Version: 1.2.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cbd_processor::models::{BuildRequest, ScaleMode, SequenceFormat};
use cbd_processor::validator::validate_request;

mod config;
mod descriptor;
mod job_processor;
mod job_state;
mod store;

use config::WorkerConfig;
use descriptor::{CallerContext, JobDescriptor};
use job_processor::{PipelineOrchestrator, PROGRESS_STAGES};
use job_state::FileJobState;
use store::LocalBlobStore;

/// Build a compression-based distance matrix from sequence samples.
///
/// Runs either from a persisted job descriptor written at submission time
/// (`--descriptor`) or directly from local inputs given on the command line.
#[derive(Parser, Debug)]
#[command(name = "cbd-worker", version, about)]
struct Args {
    /// Run a previously submitted job from its persisted descriptor.
    #[arg(long, conflicts_with_all = ["nodes", "files"])]
    descriptor: Option<PathBuf>,

    /// Distance scale: 'std' for [0, 1] or 'inf' for [0, inf).
    #[arg(long, default_value = "std")]
    scale: ScaleMode,

    /// Input sequence format: 'fasta' or 'fastq'.
    #[arg(long, default_value = "fasta")]
    format: SequenceFormat,

    /// Trim every read to this length; shorter reads are discarded.
    #[arg(long)]
    trim_length: Option<usize>,

    /// Drop samples contributing fewer reads than this.
    #[arg(long)]
    min_reads: Option<usize>,

    /// Take at most this many reads from each sample.
    #[arg(long)]
    max_reads: Option<usize>,

    /// Run the compressor at its most aggressive effort setting.
    #[arg(long)]
    extreme: bool,

    /// Blob store ids to download as input samples.
    #[arg(long = "node")]
    nodes: Vec<String>,

    /// Blob store root directory.
    #[arg(long, env = "CBD_BLOB_ROOT")]
    blob_root: Option<PathBuf>,

    /// Also copy the finished matrix to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Local sequence files to use as input samples.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let descriptor = match &args.descriptor {
        Some(path) => JobDescriptor::load(path)?,
        None => {
            let config = WorkerConfig::from_env()?;
            let request = BuildRequest {
                scale: args.scale,
                format: args.format,
                trim_length: args.trim_length,
                min_reads: args.min_reads,
                max_reads: args.max_reads,
                node_ids: args.nodes.clone(),
                file_paths: args
                    .files
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                extreme_compression: args.extreme,
            };
            JobDescriptor::new(
                request,
                CallerContext {
                    user: std::env::var("USER").unwrap_or_else(|_| "local".to_string()),
                    token: None,
                },
                config,
            )
        }
    };

    validate_request(&descriptor.request).context("invalid build request")?;

    let blob_root = args
        .blob_root
        .clone()
        .unwrap_or_else(|| descriptor.config.work_folder.join("blobs"));
    let store = Arc::new(LocalBlobStore::new(blob_root));
    let store_root = store.root().to_path_buf();

    let state = Arc::new(FileJobState::new(descriptor.config.work_folder.join("jobs")));
    state
        .ensure_job(descriptor.job_id, "build distance matrix", PROGRESS_STAGES)
        .await?;

    let job_id = descriptor.job_id;
    info!(job_id = %job_id, samples = descriptor.request.node_ids.len() + descriptor.request.file_paths.len(), "cbd worker starting");

    let orchestrator = PipelineOrchestrator::new(descriptor, store, state);
    let results = orchestrator.run().await?;

    if let Some(output) = &args.output {
        let blob_id = results["blobs"][0]
            .as_str()
            .context("job produced no result blob")?;
        std::fs::copy(store_root.join(blob_id), output)
            .with_context(|| format!("failed to copy matrix to '{}'", output.display()))?;
        info!("distance matrix written to {}", output.display());
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
