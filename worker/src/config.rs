// ==============================================================================
// config.rs - Worker Configuration
// ==============================================================================
// Description: Environment-resolved configuration for the build worker
// Author: CBD Service Team
// Created: 2026-07-16
// Modified: 2026-08-21
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use cbd_processor::command::ToolPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resolved worker configuration.
///
/// A snapshot of this struct is embedded in every persisted job descriptor
/// so a detached worker runs with the configuration that was current at
/// submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory that per-job working directories are created under.
    pub work_folder: PathBuf,

    /// Number of worker tasks that may run external tools concurrently.
    pub pool_size: usize,

    /// External sort and compress tool locations.
    pub tools: ToolPaths,

    /// Keep the job working directory after the job finishes (debugging).
    pub retain_work_dir: bool,

    /// Advisory per-job timeout, forwarded to the job state reporter as an
    /// estimated-completion hint. Never enforced internally.
    pub job_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            work_folder: PathBuf::from("/var/tmp/cbd"),
            pool_size: default_pool_size(),
            tools: ToolPaths::default(),
            retain_work_dir: false,
            job_timeout_secs: 3600,
        }
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl WorkerConfig {
    /// Resolve configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = WorkerConfig::default();

        if let Ok(folder) = std::env::var("CBD_WORK_FOLDER") {
            config.work_folder = PathBuf::from(folder);
        }
        if let Ok(size) = std::env::var("CBD_POOL_SIZE") {
            config.pool_size = size
                .parse()
                .context("CBD_POOL_SIZE must be a positive integer")?;
            if config.pool_size == 0 {
                anyhow::bail!("CBD_POOL_SIZE must be a positive integer");
            }
        }
        if let Ok(path) = std::env::var("CBD_SORT_PATH") {
            config.tools.sort = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CBD_COMPRESS_PATH") {
            config.tools.compress = PathBuf::from(path);
        }
        if let Ok(value) = std::env::var("CBD_RETAIN_WORK_DIR") {
            config.retain_work_dir = parse_bool(&value);
        }
        if let Ok(secs) = std::env::var("CBD_JOB_TIMEOUT_SECS") {
            config.job_timeout_secs = secs
                .parse()
                .context("CBD_JOB_TIMEOUT_SECS must be an integer")?;
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert!(config.pool_size >= 1);
        assert!(!config.retain_work_dir);
        assert_eq!(config.job_timeout_secs, 3600);
        assert_eq!(config.tools.compress, PathBuf::from("/usr/bin/xz"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool(" yes "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = WorkerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: WorkerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.pool_size, config.pool_size);
        assert_eq!(parsed.work_folder, config.work_folder);
    }
}
