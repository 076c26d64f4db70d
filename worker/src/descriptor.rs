// ==============================================================================
// descriptor.rs - Persisted Job Descriptor
// ==============================================================================
// Description: Job record written at submission and read by a detached worker
// Author: CBD Service Team
// Created: 2026-07-16
// Modified: 2026-08-21
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use cbd_processor::models::BuildRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::config::WorkerConfig;

/// Identity and context of the caller that submitted a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    pub user: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Everything a detached worker needs to run one job.
///
/// Written to disk before asynchronous execution starts; the worker reads
/// it back at run start so submission and execution can live in separate
/// processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDescriptor {
    pub job_id: Uuid,
    pub request: BuildRequest,
    pub context: CallerContext,
    pub config: WorkerConfig,
    pub created_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(request: BuildRequest, context: CallerContext, config: WorkerConfig) -> Self {
        JobDescriptor {
            job_id: Uuid::new_v4(),
            request,
            context,
            config,
            created_at: Utc::now(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write job descriptor '{}'", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job descriptor '{}'", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid job descriptor '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbd_processor::models::{ScaleMode, SequenceFormat};
    use tempfile::TempDir;

    fn sample_request() -> BuildRequest {
        BuildRequest {
            scale: ScaleMode::Standard,
            format: SequenceFormat::Fasta,
            trim_length: Some(150),
            min_reads: Some(10),
            max_reads: None,
            node_ids: vec!["node-1".to_string(), "node-2".to_string()],
            file_paths: Vec::new(),
            extreme_compression: true,
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.json");

        let descriptor = JobDescriptor::new(
            sample_request(),
            CallerContext {
                user: "researcher".to_string(),
                token: None,
            },
            WorkerConfig::default(),
        );
        descriptor.save(&path).unwrap();

        let loaded = JobDescriptor::load(&path).unwrap();
        assert_eq!(loaded.job_id, descriptor.job_id);
        assert_eq!(loaded.request.node_ids, descriptor.request.node_ids);
        assert_eq!(loaded.request.trim_length, Some(150));
        assert!(loaded.request.extreme_compression);
        assert_eq!(loaded.context.user, "researcher");
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.json");

        let descriptor = JobDescriptor::new(
            sample_request(),
            CallerContext {
                user: "researcher".to_string(),
                token: None,
            },
            WorkerConfig::default(),
        );
        let mut value = serde_json::to_value(&descriptor).unwrap();
        value["surprise"] = serde_json::json!(true);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        assert!(JobDescriptor::load(&path).is_err());
    }
}
