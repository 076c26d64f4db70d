// ==============================================================================
// combiner.rs - Pairwise Combiner
// ==============================================================================
// Description: Enumerates unordered sample pairs and plans merge-sort runs
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-21
// Version: 1.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::{SampleId, PAIR_SEPARATOR};

/// Unordered pair of sample identifiers.
///
/// The two identifiers are stored in lexicographic order so that
/// `PairKey::new(a, b)` and `PairKey::new(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    first: SampleId,
    second: SampleId,
}

impl PairKey {
    pub fn new(a: SampleId, b: SampleId) -> Self {
        if a <= b {
            PairKey { first: a, second: b }
        } else {
            PairKey { first: b, second: a }
        }
    }

    pub fn first(&self) -> &SampleId {
        &self.first
    }

    pub fn second(&self) -> &SampleId {
        &self.second
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, PAIR_SEPARATOR, self.second)
    }
}

/// One planned merge of a pair's two sorted streams.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub key: PairKey,
    pub left: PathBuf,
    pub right: PathBuf,
    pub output: PathBuf,
}

/// Enumerate every unordered pair (i < j) of the given identifiers.
pub fn unordered_pairs(ids: &[SampleId]) -> Vec<(SampleId, SampleId)> {
    let mut pairs = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            pairs.push((ids[i].clone(), ids[j].clone()));
        }
    }
    pairs
}

/// Plan the merge of every unordered pair of sorted sample streams.
///
/// `sorted_paths` maps each surviving sample to its sorted stream. Artifact
/// locations are carried in the returned plans; the pair key only surfaces
/// in the output file name.
pub fn plan_merges(
    sorted_paths: &BTreeMap<SampleId, PathBuf>,
    job_dir: &Path,
) -> Vec<MergePlan> {
    let ids: Vec<SampleId> = sorted_paths.keys().cloned().collect();

    unordered_pairs(&ids)
        .into_iter()
        .map(|(a, b)| {
            let key = PairKey::new(a.clone(), b.clone());
            let output = job_dir.join(format!("{}.sorted", key));
            MergePlan {
                left: sorted_paths[&a].clone(),
                right: sorted_paths[&b].clone(),
                output,
                key,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> SampleId {
        SampleId::from_source_name(name)
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        let ab = PairKey::new(id("a"), id("b"));
        let ba = PairKey::new(id("b"), id("a"));
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), "a.b");
    }

    #[test]
    fn test_unordered_pairs_count() {
        // C(n,2) pairs for n samples
        for n in 2..6 {
            let ids: Vec<SampleId> = (0..n).map(|i| id(&format!("s{}", i))).collect();
            let pairs = unordered_pairs(&ids);
            assert_eq!(pairs.len(), n * (n - 1) / 2);
        }
    }

    #[test]
    fn test_unordered_pairs_are_distinct() {
        let ids = vec![id("a"), id("b"), id("c"), id("d")];
        let pairs = unordered_pairs(&ids);
        let keys: std::collections::HashSet<PairKey> = pairs
            .iter()
            .map(|(a, b)| PairKey::new(a.clone(), b.clone()))
            .collect();
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn test_plan_merges_outputs_and_inputs() {
        let mut sorted = BTreeMap::new();
        sorted.insert(id("a"), PathBuf::from("/work/a.sorted"));
        sorted.insert(id("b"), PathBuf::from("/work/b.sorted"));
        sorted.insert(id("c"), PathBuf::from("/work/c.sorted"));

        let plans = plan_merges(&sorted, Path::new("/work"));
        assert_eq!(plans.len(), 3);

        let ab = plans
            .iter()
            .find(|p| p.key == PairKey::new(id("a"), id("b")))
            .unwrap();
        assert_eq!(ab.left, PathBuf::from("/work/a.sorted"));
        assert_eq!(ab.right, PathBuf::from("/work/b.sorted"));
        assert_eq!(ab.output, PathBuf::from("/work/a.b.sorted"));
    }

    #[test]
    fn test_pair_key_round_trips_through_display() {
        // The separator cannot occur inside a sanitized identifier, so the
        // displayed key splits unambiguously
        let key = PairKey::new(id("patient1_day7"), id("patient2_day7"));
        let shown = key.to_string();
        let parts: Vec<&str> = shown.split(PAIR_SEPARATOR).collect();
        assert_eq!(parts, vec!["patient1_day7", "patient2_day7"]);
    }
}
