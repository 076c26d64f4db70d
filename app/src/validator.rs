// ==============================================================================
// validator.rs - Build Request Validation
// ==============================================================================
// Description: Semantic validation for distance matrix build requests
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-18
// Version: 1.0.0
// ==============================================================================

use tracing::debug;

use crate::error::CbdError;
use crate::models::BuildRequest;

/// Minimum number of samples a distance matrix can be built from.
pub const MIN_SAMPLES: usize = 2;

/// Validate a build request before any work is scheduled.
///
/// Structural checks (unknown fields, enum spellings) happen at the
/// deserialization boundary; this covers the semantic rules.
pub fn validate_request(request: &BuildRequest) -> Result<(), CbdError> {
    let source_count = request.node_ids.len() + request.file_paths.len();
    if source_count < MIN_SAMPLES {
        return Err(CbdError::Validation(format!(
            "at least {} input sequence files are required, got {}",
            MIN_SAMPLES, source_count
        )));
    }

    if request.trim_length == Some(0) {
        return Err(CbdError::Validation(
            "trim_length must be greater than zero when set".to_string(),
        ));
    }

    if request.max_reads == Some(0) {
        return Err(CbdError::Validation(
            "max_reads must be greater than zero when set".to_string(),
        ));
    }

    if let (Some(min), Some(max)) = (request.min_reads, request.max_reads) {
        if min > max {
            return Err(CbdError::Validation(format!(
                "min_reads {} exceeds max_reads {}",
                min, max
            )));
        }
    }

    debug!(
        "request validated: {} sources, format {:?}, scale {:?}",
        source_count, request.format, request.scale
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScaleMode, SequenceFormat};

    fn request_with_paths(paths: &[&str]) -> BuildRequest {
        BuildRequest {
            scale: ScaleMode::Standard,
            format: SequenceFormat::Fasta,
            trim_length: None,
            min_reads: None,
            max_reads: None,
            node_ids: Vec::new(),
            file_paths: paths.iter().map(|s| s.to_string()).collect(),
            extreme_compression: false,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let request = request_with_paths(&["a.fasta", "b.fasta"]);
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_too_few_sources_rejected() {
        let request = request_with_paths(&["a.fasta"]);
        assert!(matches!(
            validate_request(&request),
            Err(CbdError::Validation(_))
        ));
    }

    #[test]
    fn test_remote_and_local_sources_both_count() {
        let mut request = request_with_paths(&["a.fasta"]);
        request.node_ids.push("node-1".to_string());
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_zero_trim_rejected() {
        let mut request = request_with_paths(&["a.fasta", "b.fasta"]);
        request.trim_length = Some(0);
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_min_above_max_rejected() {
        let mut request = request_with_paths(&["a.fasta", "b.fasta"]);
        request.min_reads = Some(100);
        request.max_reads = Some(10);
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_equal_min_and_max_allowed() {
        let mut request = request_with_paths(&["a.fasta", "b.fasta"]);
        request.min_reads = Some(50);
        request.max_reads = Some(50);
        assert!(validate_request(&request).is_ok());
    }
}
