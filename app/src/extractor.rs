// ==============================================================================
// extractor.rs - Sequence Extractor
// ==============================================================================
// Description: Converts a sequence file into a one-sequence-per-line stream
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-21
// Version: 1.1.0
// ==============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::CbdError;
use crate::models::SequenceFormat;
use crate::parsers::{FastaReader, FastqReader, ParseError, SequenceRecord};

/// Options controlling sequence extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Trim every read to exactly this length; shorter reads are discarded.
    pub trim_length: Option<usize>,
    /// Samples with fewer extracted reads than this are dropped entirely.
    pub min_reads: Option<usize>,
    /// Stop after this many reads have been written.
    pub max_reads: Option<usize>,
}

/// Result of extracting one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Destination file written with this many reads.
    Written(usize),
    /// Sample fell below the min-read threshold; the destination file has
    /// been deleted to signal the drop to the orchestrator.
    DroppedBelowMinimum,
}

/// Extract sequences from `source` into `dest`, one residue string per line.
pub fn extract_sequences(
    source: &Path,
    dest: &Path,
    format: SequenceFormat,
    options: &ExtractOptions,
) -> Result<ExtractOutcome, CbdError> {
    let file = File::open(source).map_err(|e| {
        CbdError::Extract(format!("cannot open '{}': {}", source.display(), e))
    })?;
    let reader = BufReader::new(file);

    let out = File::create(dest).map_err(|e| {
        CbdError::Extract(format!("cannot create '{}': {}", dest.display(), e))
    })?;
    let mut writer = BufWriter::new(out);

    let written = match format {
        SequenceFormat::Fasta => {
            let mut records = FastaReader::new(reader);
            write_records(|| records.next_record(), &mut writer, options)?
        }
        SequenceFormat::Fastq => {
            let mut records = FastqReader::new(reader);
            write_records(|| records.next_record(), &mut writer, options)?
        }
    };

    writer
        .flush()
        .map_err(|e| CbdError::Extract(format!("cannot write '{}': {}", dest.display(), e)))?;
    drop(writer);

    if let Some(min) = options.min_reads {
        if written < min {
            debug!(
                "sample '{}' has {} reads, below minimum {}, dropping",
                source.display(),
                written,
                min
            );
            std::fs::remove_file(dest).map_err(|e| {
                CbdError::Extract(format!("cannot remove '{}': {}", dest.display(), e))
            })?;
            return Ok(ExtractOutcome::DroppedBelowMinimum);
        }
    }

    Ok(ExtractOutcome::Written(written))
}

/// Stream records through the trim filter into the destination writer.
fn write_records<F, W>(
    mut next: F,
    writer: &mut W,
    options: &ExtractOptions,
) -> Result<usize, CbdError>
where
    F: FnMut() -> Result<Option<SequenceRecord>, ParseError>,
    W: Write,
{
    let mut written = 0usize;

    loop {
        if let Some(max) = options.max_reads {
            if written >= max {
                break;
            }
        }

        let record = match next().map_err(|e| CbdError::Extract(e.to_string()))? {
            Some(record) => record,
            None => break,
        };

        let residues = match options.trim_length {
            Some(trim) => match trim_boundary(&record.sequence, trim) {
                Some(end) => &record.sequence[..end],
                None => continue,
            },
            None => record.sequence.as_str(),
        };

        writeln!(writer, "{}", residues)
            .map_err(|e| CbdError::Extract(format!("write failed: {}", e)))?;
        written += 1;
    }

    Ok(written)
}

/// Byte offset at which to cut a sequence down to `trim` characters, or
/// None when the sequence is shorter than the trim length.
///
/// The parsers do not validate residues, so a sequence can contain
/// multi-byte characters; the boundary is counted per character.
fn trim_boundary(sequence: &str, trim: usize) -> Option<usize> {
    if sequence.is_ascii() {
        return (sequence.len() >= trim).then_some(trim);
    }
    match sequence.char_indices().nth(trim) {
        Some((offset, _)) => Some(offset),
        None => (sequence.chars().count() == trim).then_some(sequence.len()),
    }
}
