// ==============================================================================
// command.rs - External Tool Runner
// ==============================================================================
// Description: Uniform wrapper for running sort/compress child processes
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-21
// Version: 1.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failure of an external tool invocation.
///
/// Launch failures, non-zero exits, and signal terminations all collapse
/// into this one shape so every stage shares the same failure contract.
/// The full argument vector is retained for diagnostics.
#[derive(Error, Debug, Clone)]
pub struct CommandFailure {
    pub argv: Vec<String>,
    pub reason: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.argv.join(" "), self.reason)
    }
}

impl CommandFailure {
    pub fn new(argv: &[String], reason: impl Into<String>) -> Self {
        CommandFailure {
            argv: argv.to_vec(),
            reason: reason.into(),
        }
    }
}

/// Run an external command to completion.
///
/// The first element of `argv` is the binary, the rest are its arguments.
pub async fn run_command(argv: &[String]) -> Result<(), CommandFailure> {
    if argv.is_empty() {
        return Err(CommandFailure::new(argv, "empty argument vector"));
    }

    debug!("running command: {}", argv.join(" "));

    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .status()
        .await
        .map_err(|e| CommandFailure::new(argv, format!("could not be launched: {}", e)))?;

    if status.success() {
        return Ok(());
    }

    match status.code() {
        Some(code) => Err(CommandFailure::new(
            argv,
            format!("failed with status {}", code),
        )),
        // No exit code means the process was terminated by a signal
        None => Err(CommandFailure::new(argv, "was terminated by a signal")),
    }
}

/// Locations of the external tools the pipeline shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Merge-sort utility (GNU sort compatible).
    pub sort: PathBuf,
    /// Compressor (xz compatible, must support --keep and -9/-9e).
    pub compress: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            sort: PathBuf::from("/usr/bin/sort"),
            compress: PathBuf::from("/usr/bin/xz"),
        }
    }
}

impl ToolPaths {
    /// Argument vector to sort one sequence file into `dest`.
    pub fn sort_args(&self, source: &Path, dest: &Path) -> Vec<String> {
        vec![
            self.sort.to_string_lossy().into_owned(),
            format!("--output={}", dest.display()),
            source.to_string_lossy().into_owned(),
        ]
    }

    /// Argument vector to merge two already-sorted files into `dest`.
    ///
    /// Uses the sort utility's merge mode, which preserves order instead
    /// of re-sorting.
    pub fn merge_args(&self, left: &Path, right: &Path, dest: &Path) -> Vec<String> {
        vec![
            self.sort.to_string_lossy().into_owned(),
            "-m".to_string(),
            format!("--output={}", dest.display()),
            left.to_string_lossy().into_owned(),
            right.to_string_lossy().into_owned(),
        ]
    }

    /// Argument vector to compress `source` in place, keeping the original.
    ///
    /// Produces `source.xz`. The extreme flag selects `-9e` over `-9`.
    pub fn compress_args(&self, source: &Path, extreme: bool) -> Vec<String> {
        vec![
            self.compress.to_string_lossy().into_owned(),
            "--keep".to_string(),
            if extreme { "-9e" } else { "-9" }.to_string(),
            source.to_string_lossy().into_owned(),
        ]
    }
}

/// Path of the compressed artifact the compressor produces for `source`.
pub fn compressed_output_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".xz");
    PathBuf::from(name)
}
