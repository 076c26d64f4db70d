// ==============================================================================
// error.rs - CBD Failure Taxonomy
// ==============================================================================
// Description: Stage-level error types for the distance matrix pipeline
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-21
// Version: 1.0.0
// ==============================================================================

use thiserror::Error;

use crate::command::CommandFailure;
use crate::models::SampleId;

/// Errors raised by the distance matrix build pipeline.
///
/// Any stage failure aborts the remainder of the stage and the whole job;
/// the terminating variant becomes the job's terminal error detail.
#[derive(Error, Debug)]
pub enum CbdError {
    #[error("error extracting sequences from input sequence file: {0}")]
    Extract(String),

    #[error("error sorting sequence file: {0}")]
    Sort(#[source] CommandFailure),

    #[error("error merging sequence files: {0}")]
    Merge(#[source] CommandFailure),

    #[error("error compressing sequence file: {0}")]
    Compress(#[source] CommandFailure),

    #[error("sequence length error: {0}")]
    SequenceLength(String),

    #[error(
        "invalid distance {distance} for samples '{id1}' and '{id2}' \
         (c1={c1}, c2={c2}, c12={c12}); check that the samples have \
         consistent read lengths and counts"
    )]
    DistanceRange {
        id1: SampleId,
        id2: SampleId,
        c1: u64,
        c2: u64,
        c12: u64,
        distance: f64,
    },

    #[error("error storing result: {0}")]
    Publish(String),

    #[error("invalid request: {0}")]
    Validation(String),
}
