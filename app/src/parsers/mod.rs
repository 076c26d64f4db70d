// ==============================================================================
// mod.rs - Sequence Format Parsers
// ==============================================================================
// Description: Streaming parsers for supported sequence file formats
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-18
// Version: 1.0.0
// ==============================================================================

pub mod fasta;
pub mod fastq;

pub use fasta::FastaReader;
pub use fastq::FastqReader;

use thiserror::Error;

/// One record from a sequence file.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRecord {
    /// Record identifier from the header line.
    pub id: String,
    /// Residue string (bases, uppercase not enforced).
    pub sequence: String,
}

/// Errors that can occur while parsing a sequence file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record at line {line}: {details}")]
    Malformed { line: usize, details: String },
}
