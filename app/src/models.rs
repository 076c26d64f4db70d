// ==============================================================================
// models.rs - CBD Data Models
// ==============================================================================
// Description: Sample identifiers, request parameters, and scale/format enums
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-21
// Version: 1.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::CbdError;

/// Separator used to join two sample identifiers into a pair key.
///
/// Identifiers are sanitized at ingestion so this character can never occur
/// inside a legitimate identifier, which keeps pair keys unambiguous.
pub const PAIR_SEPARATOR: char = '.';

/// Identifier for one input sequence sample.
///
/// Derived from the source file name with the extension removed and every
/// character outside `[A-Za-z0-9_-]` replaced by `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(String);

impl SampleId {
    /// Derive an identifier from a source file name.
    ///
    /// Strips the final extension (`sample1.fasta` -> `sample1`) and
    /// substitutes the pair separator and any other unsafe character with
    /// an underscore.
    pub fn from_source_name(file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());

        let sanitized: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        SampleId(sanitized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scale applied to computed distance values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Distances on [0, 1].
    Standard,
    /// Distances remapped to [0, inf) via d / (1 - d).
    Infinite,
}

impl FromStr for ScaleMode {
    type Err = CbdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "std" | "standard" => Ok(ScaleMode::Standard),
            "inf" | "infinite" => Ok(ScaleMode::Infinite),
            other => Err(CbdError::Validation(format!(
                "invalid scale '{}', expected 'std' or 'inf'",
                other
            ))),
        }
    }
}

/// Recognized input sequence formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceFormat {
    Fasta,
    Fastq,
}

impl FromStr for SequenceFormat {
    type Err = CbdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fasta" => Ok(SequenceFormat::Fasta),
            "fastq" => Ok(SequenceFormat::Fastq),
            other => Err(CbdError::Validation(format!(
                "unsupported sequence format '{}'",
                other
            ))),
        }
    }
}

/// Validated build request parameters.
///
/// Unknown fields are rejected at the deserialization boundary. Semantic
/// checks live in `validator::validate_request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildRequest {
    /// Scale for the output distance values.
    pub scale: ScaleMode,

    /// Format of the input sequence files.
    pub format: SequenceFormat,

    /// Trim every read to exactly this length; reads shorter than the trim
    /// length are discarded. None disables trimming.
    #[serde(default)]
    pub trim_length: Option<usize>,

    /// Minimum number of reads a sample must contribute. Samples below the
    /// threshold are dropped from the matrix.
    #[serde(default)]
    pub min_reads: Option<usize>,

    /// Maximum number of reads taken from each sample.
    #[serde(default)]
    pub max_reads: Option<usize>,

    /// Remote blob identifiers to download as input samples.
    #[serde(default)]
    pub node_ids: Vec<String>,

    /// Local file paths to use as input samples.
    #[serde(default)]
    pub file_paths: Vec<String>,

    /// Run the compressor at its most aggressive effort setting.
    #[serde(default)]
    pub extreme_compression: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_id_strips_extension() {
        let id = SampleId::from_source_name("sample1.fasta");
        assert_eq!(id.as_str(), "sample1");
    }

    #[test]
    fn test_sample_id_substitutes_separator() {
        // A dotted stem would collide with the pair key separator
        let id = SampleId::from_source_name("patient1.day7.fastq");
        assert_eq!(id.as_str(), "patient1_day7");
        assert!(!id.as_str().contains(PAIR_SEPARATOR));
    }

    #[test]
    fn test_sample_id_sanitizes_unsafe_characters() {
        let id = SampleId::from_source_name("my sample#2.fasta");
        assert_eq!(id.as_str(), "my_sample_2");
    }

    #[test]
    fn test_scale_mode_from_str() {
        assert_eq!(ScaleMode::from_str("std").unwrap(), ScaleMode::Standard);
        assert_eq!(ScaleMode::from_str("inf").unwrap(), ScaleMode::Infinite);
        assert_eq!(
            ScaleMode::from_str("infinite").unwrap(),
            ScaleMode::Infinite
        );
        assert!(ScaleMode::from_str("log").is_err());
    }

    #[test]
    fn test_sequence_format_from_str() {
        assert_eq!(
            SequenceFormat::from_str("fasta").unwrap(),
            SequenceFormat::Fasta
        );
        assert_eq!(
            SequenceFormat::from_str("fastq").unwrap(),
            SequenceFormat::Fastq
        );
        // Formats the service does not recognize are rejected up front
        assert!(SequenceFormat::from_str("genbank").is_err());
    }

    #[test]
    fn test_build_request_rejects_unknown_fields() {
        let json = r#"{
            "scale": "standard",
            "format": "fasta",
            "file_paths": ["a.fasta"],
            "bogus_field": 1
        }"#;
        let result: Result<BuildRequest, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_request_defaults() {
        let json = r#"{"scale": "infinite", "format": "fastq"}"#;
        let request: BuildRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.scale, ScaleMode::Infinite);
        assert!(request.trim_length.is_none());
        assert!(request.node_ids.is_empty());
        assert!(!request.extreme_compression);
    }
}
