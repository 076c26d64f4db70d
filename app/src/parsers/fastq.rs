// ==============================================================================
// fastq.rs - FASTQ Parser
// ==============================================================================
// Description: Streaming parser for four-line FASTQ sequence files
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-18
// Version: 1.0.0
// ==============================================================================
// Format: Four lines per record. Example:
//   @read1
//   ACGTACGT
//   +
//   IIIIIIII
// ==============================================================================

use std::io::BufRead;

use super::{ParseError, SequenceRecord};

/// Streaming reader for FASTQ files.
pub struct FastqReader<R: BufRead> {
    reader: R,
    line_number: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        FastqReader {
            reader,
            line_number: 0,
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

    fn require_line(&mut self, what: &str) -> Result<String, ParseError> {
        self.read_line()?.ok_or_else(|| ParseError::Malformed {
            line: self.line_number + 1,
            details: format!("unexpected end of file, expected {}", what),
        })
    }

    /// Read the next record, or None at end of input.
    pub fn next_record(&mut self) -> Result<Option<SequenceRecord>, ParseError> {
        // Skip trailing blank lines
        let header = loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if line.is_empty() => continue,
                Some(line) => break line,
            }
        };

        if !header.starts_with('@') {
            return Err(ParseError::Malformed {
                line: self.line_number,
                details: "expected '@' header line".to_string(),
            });
        }

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

        let sequence = self.require_line("sequence line")?;
        let separator = self.require_line("'+' separator line")?;
        if !separator.starts_with('+') {
            return Err(ParseError::Malformed {
                line: self.line_number,
                details: "expected '+' separator line".to_string(),
            });
        }

        let quality = self.require_line("quality line")?;
        if quality.len() != sequence.len() {
            return Err(ParseError::Malformed {
                line: self.line_number,
                details: format!(
                    "quality length {} does not match sequence length {}",
                    quality.len(),
                    sequence.len()
                ),
            });
        }

        Ok(Some(SequenceRecord { id, sequence }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(contents: &str) -> Result<Vec<SequenceRecord>, ParseError> {
        let mut reader = FastqReader::new(Cursor::new(contents.to_string()));
        let mut records = Vec::new();
        while let Some(record) = reader.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    #[test]
    fn test_parse_single_record() {
        let records = read_all("@read1\nACGT\n+\nIIII\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "read1");
        assert_eq!(records[0].sequence, "ACGT");
    }

    #[test]
    fn test_parse_multiple_records() {
        let contents = "@a\nACGT\n+\nIIII\n@b\nTT\n+a comment\nII\n";
        let records = read_all(contents).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "b");
        assert_eq!(records[1].sequence, "TT");
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        let result = read_all("@a\nACGT\nIIII\n");
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_quality_length_mismatch_is_malformed() {
        let result = read_all("@a\nACGT\n+\nII\n");
        match result.unwrap_err() {
            ParseError::Malformed { details, .. } => {
                assert!(details.contains("quality length"));
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_record_is_malformed() {
        let result = read_all("@a\nACGT\n");
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_empty_input_yields_no_records() {
        assert!(read_all("").unwrap().is_empty());
    }
}
