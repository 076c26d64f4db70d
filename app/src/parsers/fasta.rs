// ==============================================================================
// fasta.rs - FASTA Parser
// ==============================================================================
// Description: Streaming parser for FASTA sequence files
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-18
// Version: 1.0.0
// ==============================================================================
// Format: Header line starting with '>' followed by one or more sequence
// lines. Example:
//   >read1 some description
//   ACGTACGT
//   ACGT
//   >read2
//   TTGCA
// ==============================================================================

use std::io::BufRead;

use super::{ParseError, SequenceRecord};

/// Streaming reader for FASTA files.
///
/// Records are produced one at a time so callers can stop early once they
/// have read enough.
pub struct FastaReader<R: BufRead> {
    reader: R,
    line_number: usize,
    /// Header line carried over from the previous record.
    pending_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        FastaReader {
            reader,
            line_number: 0,
            pending_header: None,
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, ParseError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// Read the next record, or None at end of input.
    pub fn next_record(&mut self) -> Result<Option<SequenceRecord>, ParseError> {
        // Find the header for this record
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => loop {
                match self.read_line()? {
                    None => return Ok(None),
                    Some(line) if line.is_empty() => continue,
                    Some(line) if line.starts_with('>') => break line,
                    Some(_) => {
                        return Err(ParseError::Malformed {
                            line: self.line_number,
                            details: "expected '>' header line".to_string(),
                        });
                    }
                }
            },
        };

        let id = header[1..]
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();
        if id.is_empty() {
            return Err(ParseError::Malformed {
                line: self.line_number,
                details: "header line has no identifier".to_string(),
            });
        }

        // Accumulate sequence lines until the next header or end of input
        let mut sequence = String::new();
        loop {
            match self.read_line()? {
                None => break,
                Some(line) if line.starts_with('>') => {
                    self.pending_header = Some(line);
                    break;
                }
                Some(line) => sequence.push_str(line.trim()),
            }
        }

        if sequence.is_empty() {
            return Err(ParseError::Malformed {
                line: self.line_number,
                details: format!("record '{}' has no sequence data", id),
            });
        }

        Ok(Some(SequenceRecord { id, sequence }))
    }
}
