// ==============================================================================
// job_processor.rs - Distance Matrix Build Pipeline
// ==============================================================================
// Description: Stage-sequenced, pool-bounded orchestrator for one CBD job
// Author: CBD Service Team
// Created: 2026-07-16
// Modified: 2026-08-25
// Version: 1.2.0
// ==============================================================================

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cbd_processor::combiner::{plan_merges, PairKey};
use cbd_processor::command::{compressed_output_path, run_command, CommandFailure};
use cbd_processor::distance::DistanceMatrix;
use cbd_processor::error::CbdError;
use cbd_processor::extractor::{extract_sequences, ExtractOptions};
use cbd_processor::models::SampleId;
use cbd_processor::validator::{validate_request, MIN_SAMPLES};

use crate::descriptor::JobDescriptor;
use crate::job_state::{JobStateReporter, JobStatus};
use crate::store::BlobStore;

/// Number of progress updates one job posts (one per stage).
pub const PROGRESS_STAGES: u32 = 6;

/// What a compressed artifact belongs to.
enum CompressTarget {
    Sample(SampleId),
    Pair(PairKey),
}

/// One input sample scheduled for extraction.
struct ExtractJob {
    id: SampleId,
    /// Blob to download first, None for a local path.
    remote: Option<String>,
    source: PathBuf,
    dest: PathBuf,
}

/// Drives the fixed stage sequence for one job: extract -> validate/filter
/// -> sort -> pairwise-merge -> compress -> calculate -> publish -> cleanup.
///
/// Each stage fans its tasks out onto a bounded pool and barrier-waits for
/// every result before the next stage starts; stages never overlap.
pub struct PipelineOrchestrator {
    descriptor: JobDescriptor,
    store: Arc<dyn BlobStore>,
    reporter: Arc<dyn JobStateReporter>,
}

impl PipelineOrchestrator {
    pub fn new(
        descriptor: JobDescriptor,
        store: Arc<dyn BlobStore>,
        reporter: Arc<dyn JobStateReporter>,
    ) -> Self {
        PipelineOrchestrator {
            descriptor,
            store,
            reporter,
        }
    }

    fn job_id(&self) -> Uuid {
        self.descriptor.job_id
    }

    /// Run the job to a terminal state, reporting completion on every exit
    /// path.
    pub async fn run(&self) -> Result<serde_json::Value> {
        info!(job_id = %self.job_id(), "starting distance matrix build");

        match self.build().await {
            Ok(results) => {
                info!(job_id = %self.job_id(), "distance matrix build complete");
                if let Err(e) = self
                    .reporter
                    .complete_job(self.job_id(), JobStatus::Done, None, Some(results.clone()))
                    .await
                {
                    warn!(job_id = %self.job_id(), "failed to report job completion: {:#}", e);
                }
                Ok(results)
            }
            Err(e) => {
                let detail = e.to_string();
                warn!(job_id = %self.job_id(), "distance matrix build failed: {}", detail);
                if let Err(re) = self
                    .reporter
                    .complete_job(self.job_id(), JobStatus::Error, Some(detail), None)
                    .await
                {
                    warn!(job_id = %self.job_id(), "failed to report job failure: {:#}", re);
                }
                Err(e.into())
            }
        }
    }

    /// Run all pipeline stages. Cleanup executes exactly once, on every
    /// exit path.
    pub async fn build(&self) -> Result<serde_json::Value, CbdError> {
        validate_request(&self.descriptor.request)?;

        let job_dir = self
            .descriptor
            .config
            .work_folder
            .join(self.job_id().to_string());
        std::fs::create_dir_all(&job_dir).map_err(|e| {
            CbdError::Validation(format!(
                "cannot create job directory '{}': {}",
                job_dir.display(),
                e
            ))
        })?;

        let result = self.run_stages(&job_dir).await;
        self.cleanup(&job_dir).await;
        result
    }

    async fn run_stages(&self, job_dir: &Path) -> Result<serde_json::Value, CbdError> {
        let pool = Arc::new(Semaphore::new(self.descriptor.config.pool_size));
        let request = &self.descriptor.request;

        self.report_progress("extracting sequence files").await;
        let extracted = self.extract_stage(job_dir, &pool).await?;

        let survivors = self.validation_gate(extracted)?;

        self.report_progress("sorting sequence files").await;
        let sorted = self.sort_stage(job_dir, &survivors, &pool).await?;

        self.report_progress("merging and sorting sequence files").await;
        let merged = self.merge_stage(job_dir, &sorted, &pool).await?;

        self.report_progress("compressing sequence files").await;
        let (single_sizes, pair_sizes) = self.compress_stage(&sorted, &merged, &pool).await?;

        self.report_progress("calculating distance matrix").await;
        let matrix = DistanceMatrix::from_sizes(&single_sizes, &pair_sizes, request.scale)?;
        let csv_path = job_dir.join("output.csv");
        matrix.write_csv(&csv_path)?;

        self.report_progress("storing distance matrix").await;
        let blob_id = self
            .store
            .create_from_path(&csv_path)
            .await
            .map_err(|e| CbdError::Publish(format!("{:#}", e)))?;

        Ok(json!({ "blobs": [blob_id] }))
    }

    /// Extract every input sample into a one-sequence-per-line stream.
    async fn extract_stage(
        &self,
        job_dir: &Path,
        pool: &Arc<Semaphore>,
    ) -> Result<Vec<(SampleId, PathBuf)>, CbdError> {
        let request = &self.descriptor.request;
        let mut jobs = Vec::new();

        for node_id in &request.node_ids {
            let meta = self
                .store
                .get_metadata(node_id)
                .await
                .map_err(|e| CbdError::Extract(format!("{:#}", e)))?;
            let id = SampleId::from_source_name(&meta.file_name);
            jobs.push(ExtractJob {
                source: job_dir.join(&meta.file_name),
                dest: job_dir.join(format!("{}.sequence", id)),
                remote: Some(node_id.clone()),
                id,
            });
        }

        for path in &request.file_paths {
            let source = PathBuf::from(path);
            let file_name = source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    CbdError::Validation(format!("invalid input path '{}'", path))
                })?;
            let id = SampleId::from_source_name(file_name);
            jobs.push(ExtractJob {
                dest: job_dir.join(format!("{}.sequence", id)),
                remote: None,
                source,
                id,
            });
        }

        // Sanitized identifiers must stay unique or pair keys collide
        let mut seen = std::collections::HashSet::new();
        for job in &jobs {
            if !seen.insert(job.id.clone()) {
                return Err(CbdError::Validation(format!(
                    "duplicate sample identifier '{}' after sanitization",
                    job.id
                )));
            }
        }

        let options = ExtractOptions {
            trim_length: request.trim_length,
            min_reads: request.min_reads,
            max_reads: request.max_reads,
        };
        let format = request.format;

        let mut tasks: JoinSet<Result<(SampleId, PathBuf), CbdError>> = JoinSet::new();
        for job in jobs {
            let pool = pool.clone();
            let store = self.store.clone();
            let options = options.clone();
            tasks.spawn(async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .map_err(|e| CbdError::Extract(format!("worker pool closed: {}", e)))?;

                if let Some(node_id) = &job.remote {
                    store
                        .download_to_path(node_id, &job.source)
                        .await
                        .map_err(|e| CbdError::Extract(format!("{:#}", e)))?;
                }

                let source = job.source.clone();
                let dest = job.dest.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    extract_sequences(&source, &dest, format, &options)
                })
                .await
                .map_err(|e| CbdError::Extract(format!("extraction task failed: {}", e)))??;

                debug!("extracted sample '{}': {:?}", job.id, outcome);
                Ok((job.id, job.dest))
            });
        }

        drain_stage(tasks, |detail| CbdError::Extract(detail)).await
    }

    /// Gate between extraction and the tool stages.
    ///
    /// A missing extracted stream means the sample was dropped by the
    /// min-read filter; an empty stream is a hard failure. Fewer than two
    /// survivors cannot form a pair, so that is a hard failure too.
    fn validation_gate(
        &self,
        extracted: Vec<(SampleId, PathBuf)>,
    ) -> Result<BTreeMap<SampleId, PathBuf>, CbdError> {
        let mut survivors = BTreeMap::new();

        for (id, path) in extracted {
            match std::fs::metadata(&path) {
                // Only an absent file signals the min-read drop
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    info!(
                        job_id = %self.job_id(),
                        "sample '{}' dropped by min-read filter", id
                    );
                }
                Err(e) => {
                    return Err(CbdError::Extract(format!(
                        "cannot inspect sequence file for sample '{}': {}",
                        id, e
                    )));
                }
                Ok(meta) if meta.len() == 0 => {
                    return Err(CbdError::SequenceLength(format!(
                        "sequence file for sample '{}' is empty",
                        id
                    )));
                }
                Ok(_) => {
                    survivors.insert(id, path);
                }
            }
        }

        if survivors.len() < MIN_SAMPLES {
            return Err(CbdError::SequenceLength(format!(
                "{} samples survived filtering but at least {} are required \
                 to compute a distance",
                survivors.len(),
                MIN_SAMPLES
            )));
        }

        Ok(survivors)
    }

    /// Sort every surviving sample's sequence stream.
    async fn sort_stage(
        &self,
        job_dir: &Path,
        survivors: &BTreeMap<SampleId, PathBuf>,
        pool: &Arc<Semaphore>,
    ) -> Result<BTreeMap<SampleId, PathBuf>, CbdError> {
        let tools = &self.descriptor.config.tools;

        let mut tasks: JoinSet<Result<(SampleId, PathBuf), CbdError>> = JoinSet::new();
        for (id, sequence_path) in survivors {
            let sorted_path = job_dir.join(format!("{}.sorted", id));
            let argv = tools.sort_args(sequence_path, &sorted_path);
            let pool = pool.clone();
            let id = id.clone();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.map_err(|e| {
                    CbdError::Sort(CommandFailure::new(&argv, format!("worker pool closed: {}", e)))
                })?;
                run_command(&argv).await.map_err(CbdError::Sort)?;
                Ok((id, sorted_path))
            });
        }

        let sorted = drain_stage(tasks, |detail| {
            CbdError::Sort(CommandFailure::new(&[], detail))
        })
        .await?;
        Ok(sorted.into_iter().collect())
    }

    /// Merge-sort the streams of every unordered sample pair.
    async fn merge_stage(
        &self,
        job_dir: &Path,
        sorted: &BTreeMap<SampleId, PathBuf>,
        pool: &Arc<Semaphore>,
    ) -> Result<HashMap<PairKey, PathBuf>, CbdError> {
        let tools = &self.descriptor.config.tools;
        let plans = plan_merges(sorted, job_dir);
        debug!(
            job_id = %self.job_id(),
            "merging {} pairs from {} samples", plans.len(), sorted.len()
        );

        let mut tasks: JoinSet<Result<(PairKey, PathBuf), CbdError>> = JoinSet::new();
        for plan in plans {
            let argv = tools.merge_args(&plan.left, &plan.right, &plan.output);
            let pool = pool.clone();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.map_err(|e| {
                    CbdError::Merge(CommandFailure::new(&argv, format!("worker pool closed: {}", e)))
                })?;
                run_command(&argv).await.map_err(CbdError::Merge)?;
                Ok((plan.key, plan.output))
            });
        }

        let merged = drain_stage(tasks, |detail| {
            CbdError::Merge(CommandFailure::new(&[], detail))
        })
        .await?;
        Ok(merged.into_iter().collect())
    }

    /// Compress every single and pair stream and collect artifact sizes.
    async fn compress_stage(
        &self,
        sorted: &BTreeMap<SampleId, PathBuf>,
        merged: &HashMap<PairKey, PathBuf>,
        pool: &Arc<Semaphore>,
    ) -> Result<(BTreeMap<SampleId, u64>, HashMap<PairKey, u64>), CbdError> {
        let tools = &self.descriptor.config.tools;
        let extreme = self.descriptor.request.extreme_compression;

        let mut items: Vec<(CompressTarget, PathBuf)> = Vec::new();
        for (id, path) in sorted {
            items.push((CompressTarget::Sample(id.clone()), path.clone()));
        }
        for (key, path) in merged {
            items.push((CompressTarget::Pair(key.clone()), path.clone()));
        }

        let mut tasks: JoinSet<Result<(CompressTarget, u64), CbdError>> = JoinSet::new();
        for (target, path) in items {
            let argv = tools.compress_args(&path, extreme);
            let compressed = compressed_output_path(&path);
            let pool = pool.clone();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.map_err(|e| {
                    CbdError::Compress(CommandFailure::new(
                        &argv,
                        format!("worker pool closed: {}", e),
                    ))
                })?;
                run_command(&argv).await.map_err(CbdError::Compress)?;

                let meta = tokio::fs::metadata(&compressed).await.map_err(|_| {
                    CbdError::Compress(CommandFailure::new(&argv, "produced no output file"))
                })?;
                Ok((target, meta.len()))
            });
        }

        let results = drain_stage(tasks, |detail| {
            CbdError::Compress(CommandFailure::new(&[], detail))
        })
        .await?;

        let mut single_sizes = BTreeMap::new();
        let mut pair_sizes = HashMap::new();
        for (target, size) in results {
            match target {
                CompressTarget::Sample(id) => {
                    single_sizes.insert(id, size);
                }
                CompressTarget::Pair(key) => {
                    pair_sizes.insert(key, size);
                }
            }
        }
        Ok((single_sizes, pair_sizes))
    }

    /// Post a stage progress update; failures are logged, never escalated.
    async fn report_progress(&self, message: &str) {
        let estimated = Utc::now()
            + chrono::Duration::seconds(self.descriptor.config.job_timeout_secs as i64);
        if let Err(e) = self
            .reporter
            .update_progress(self.job_id(), message, 1, Some(estimated))
            .await
        {
            warn!(job_id = %self.job_id(), "failed to update job progress: {:#}", e);
        }
        info!(job_id = %self.job_id(), "{}", message);
    }

    /// Remove uploaded inputs and the job working directory.
    ///
    /// Sub-step failures are logged individually and never block the
    /// remaining cleanup steps.
    async fn cleanup(&self, job_dir: &Path) {
        for node_id in &self.descriptor.request.node_ids {
            if let Err(e) = self.store.delete(node_id).await {
                warn!(
                    job_id = %self.job_id(),
                    "failed to delete input blob '{}': {:#}", node_id, e
                );
            }
        }

        if self.descriptor.config.retain_work_dir {
            info!(
                job_id = %self.job_id(),
                "retaining work directory {}", job_dir.display()
            );
        } else if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
            warn!(
                job_id = %self.job_id(),
                "failed to remove work directory {}: {}", job_dir.display(), e
            );
        }

        debug!(job_id = %self.job_id(), "worker pool released");
    }
}

/// Barrier-wait for all of a stage's tasks.
///
/// After a failure the remaining tasks still drain to completion so
/// in-flight external processes finish before cleanup; only the first
/// error propagates.
async fn drain_stage<T: Send + 'static>(
    mut tasks: JoinSet<Result<T, CbdError>>,
    on_join_error: impl Fn(String) -> CbdError,
) -> Result<Vec<T>, CbdError> {
    let mut items = Vec::new();
    let mut first_error: Option<CbdError> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(item)) => items.push(item),
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(on_join_error(format!("worker task failed: {}", e)));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(items),
    }
}
