// ==============================================================================
// distance.rs - Distance Calculator
// ==============================================================================
// Description: Reduces compressed artifact sizes into a symmetric matrix
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-25
// Version: 1.2.0
// ==============================================================================

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use crate::combiner::PairKey;
use crate::error::CbdError;
use crate::models::{SampleId, ScaleMode};

/// Square symmetric distance matrix indexed by sample identifier.
///
/// Identifiers are held in lexicographic order; the diagonal is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    ids: Vec<SampleId>,
    cells: Vec<f64>,
}

/// Compression-based distance for one pair from the three compressed sizes.
pub fn pair_distance(c1: u64, c2: u64, c12: u64) -> f64 {
    1.0 - 2.0 * (c1 as f64 + c2 as f64 - c12 as f64) / (c1 as f64 + c2 as f64)
}

impl DistanceMatrix {
    /// Build the matrix from single and pair compressed sizes.
    ///
    /// Every unordered pair of samples in `single_sizes` must appear in
    /// `pair_sizes`. A computed distance above 1.0 indicates inconsistent
    /// sample composition and fails the job; under the infinite scale a
    /// distance of exactly 1.0 is rejected the same way because the
    /// transform divides by zero there.
    pub fn from_sizes(
        single_sizes: &BTreeMap<SampleId, u64>,
        pair_sizes: &HashMap<PairKey, u64>,
        scale: ScaleMode,
    ) -> Result<Self, CbdError> {
        let ids: Vec<SampleId> = single_sizes.keys().cloned().collect();
        let n = ids.len();

        let expected_pairs = n * n.saturating_sub(1) / 2;
        if pair_sizes.len() != expected_pairs {
            return Err(CbdError::Validation(format!(
                "expected {} pair sizes for {} samples, got {}",
                expected_pairs,
                n,
                pair_sizes.len()
            )));
        }

        let index: HashMap<&SampleId, usize> =
            ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let mut cells = vec![0.0f64; n * n];

        for (key, &c12) in pair_sizes {
            let (i, j) = match (index.get(key.first()), index.get(key.second())) {
                (Some(&i), Some(&j)) => (i, j),
                _ => {
                    return Err(CbdError::Validation(format!(
                        "pair '{}' references an unknown sample",
                        key
                    )));
                }
            };
            let c1 = single_sizes[key.first()];
            let c2 = single_sizes[key.second()];

            let mut distance = pair_distance(c1, c2, c12);
            debug!(
                "pair {}: c1={} c2={} c12={} distance={}",
                key, c1, c2, c12, distance
            );

            if distance > 1.0 || (scale == ScaleMode::Infinite && distance >= 1.0) {
                return Err(CbdError::DistanceRange {
                    id1: key.first().clone(),
                    id2: key.second().clone(),
                    c1,
                    c2,
                    c12,
                    distance,
                });
            }

            if scale == ScaleMode::Infinite {
                distance /= 1.0 - distance;
            }

            // Symmetry is structural: both cells get the same value
            cells[i * n + j] = distance;
            cells[j * n + i] = distance;
        }

        Ok(DistanceMatrix { ids, cells })
    }

    pub fn ids(&self) -> &[SampleId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.cells[i * self.ids.len() + j]
    }

    /// Serialize to the CSV table format: header `ID,<sorted ids>`, one row
    /// per sample with general-numeric-formatted distances.
    pub fn to_csv(&self) -> String {
        let n = self.ids.len();
        let mut out = String::from("ID");
        for id in &self.ids {
            out.push(',');
            out.push_str(id.as_str());
        }
        out.push('\n');

        for i in 0..n {
            out.push_str(self.ids[i].as_str());
            for j in 0..n {
                out.push(',');
                out.push_str(&format_general(self.get(i, j)));
            }
            out.push('\n');
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), CbdError> {
        std::fs::write(path, self.to_csv()).map_err(|e| {
            CbdError::Publish(format!("cannot write '{}': {}", path.display(), e))
        })
    }

    /// Parse a matrix back from its CSV serialization.
    pub fn parse_csv(contents: &str) -> Result<Self, CbdError> {
        let mut lines = contents.lines();
        let header = lines
            .next()
            .ok_or_else(|| CbdError::Validation("empty matrix file".to_string()))?;

        let mut columns = header.split(',');
        if columns.next() != Some("ID") {
            return Err(CbdError::Validation(
                "matrix header must start with 'ID'".to_string(),
            ));
        }
        let ids: Vec<SampleId> = columns
            .map(|c| SampleId::from_source_name(c))
            .collect();
        let n = ids.len();

        let mut cells = vec![0.0f64; n * n];
        for (i, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            if i >= n {
                return Err(CbdError::Validation(format!(
                    "matrix has more than {} rows",
                    n
                )));
            }
            let mut fields = line.split(',');
            let row_id = fields
                .next()
                .ok_or_else(|| CbdError::Validation(format!("row {} is empty", i + 1)))?;
            if row_id != ids[i].as_str() {
                return Err(CbdError::Validation(format!(
                    "row '{}' does not match header order, expected '{}'",
                    row_id, ids[i]
                )));
            }
            for j in 0..n {
                let field = fields.next().ok_or_else(|| {
                    CbdError::Validation(format!("row '{}' has too few columns", row_id))
                })?;
                cells[i * n + j] = field.parse::<f64>().map_err(|e| {
                    CbdError::Validation(format!(
                        "invalid distance '{}' in row '{}': {}",
                        field, row_id, e
                    ))
                })?;
            }
            if fields.next().is_some() {
                return Err(CbdError::Validation(format!(
                    "row '{}' has too many columns",
                    row_id
                )));
            }
        }

        Ok(DistanceMatrix { ids, cells })
    }
}

/// Format a distance the way C's %g does: six significant digits with
/// trailing zeros trimmed, switching to exponent form outside [1e-4, 1e6).
pub fn format_general(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }

    let mut exponent = x.abs().log10().floor() as i32;

    // Rounding to six significant digits can carry the value into the
    // next power of ten (999999.5 becomes 1000000), so the form is chosen
    // from the exponent of the rounded value
    let scale = 10f64.powi(5 - exponent);
    let rounded = (x * scale).round() / scale;
    if rounded.abs() >= 10f64.powi(exponent + 1) {
        exponent += 1;
    } else if rounded.abs() < 10f64.powi(exponent) {
        exponent -= 1;
    }

    if exponent < -4 || exponent >= 6 {
        let mantissa = rounded / 10f64.powi(exponent);
        let m = trim_trailing_zeros(&format!("{:.5}", mantissa));
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", m, sign, exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_trailing_zeros(&format!("{:.*}", decimals, x))
    }
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
