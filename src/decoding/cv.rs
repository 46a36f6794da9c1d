//! Cross-validation schemes and label shuffling.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How samples are partitioned into train/test folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CrossValidation {
    /// Leave one run out, runs in ascending order.
    #[default]
    Run,
    /// Leave one sample out.
    Sample,
    /// `k` contiguous folds; the first `n % k` folds get one extra sample.
    KFold(usize),
}

impl FromStr for CrossValidation {
    type Err = Error;

    /// Parse `"run"`, `"sample"` or a fold count.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "run" => Ok(CrossValidation::Run),
            "sample" => Ok(CrossValidation::Sample),
            other => other
                .parse::<usize>()
                .map(CrossValidation::KFold)
                .map_err(|_| Error::UnknownCrossValidation {
                    spec: s.to_string(),
                }),
        }
    }
}

impl fmt::Display for CrossValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossValidation::Run => f.write_str("run"),
            CrossValidation::Sample => f.write_str("sample"),
            CrossValidation::KFold(k) => write!(f, "{k}"),
        }
    }
}

/// Sample indices of one train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Training sample indices, ascending.
    pub train: Vec<usize>,
    /// Held-out sample indices, ascending.
    pub test: Vec<usize>,
}

impl Fold {
    fn from_test_mask(test_mask: &[bool]) -> Self {
        let (test, train): (Vec<usize>, Vec<usize>) =
            (0..test_mask.len()).partition(|&i| test_mask[i]);
        Self { train, test }
    }
}

impl CrossValidation {
    /// Partition `runs.len()` samples into folds.
    ///
    /// Every sample is held out exactly once and never trains the fold it is
    /// tested in.
    pub fn folds(&self, runs: &[usize]) -> Result<Vec<Fold>> {
        let n = runs.len();
        match *self {
            CrossValidation::Run => {
                let mut ids = runs.to_vec();
                ids.sort_unstable();
                ids.dedup();
                if ids.len() < 2 {
                    return Err(Error::InvalidParameter {
                        parameter: "cv",
                        reason: format!("leave-one-run-out needs at least 2 runs, got {}", ids.len()),
                    });
                }
                Ok(ids
                    .iter()
                    .map(|id| {
                        let mask: Vec<bool> = runs.iter().map(|r| r == id).collect();
                        Fold::from_test_mask(&mask)
                    })
                    .collect())
            }
            CrossValidation::Sample => {
                if n < 2 {
                    return Err(Error::InvalidParameter {
                        parameter: "cv",
                        reason: format!("leave-one-out needs at least 2 samples, got {n}"),
                    });
                }
                Ok((0..n)
                    .map(|i| {
                        let mask: Vec<bool> = (0..n).map(|j| j == i).collect();
                        Fold::from_test_mask(&mask)
                    })
                    .collect())
            }
            CrossValidation::KFold(k) => {
                if k < 2 || k > n {
                    return Err(Error::InvalidParameter {
                        parameter: "cv",
                        reason: format!("fold count must satisfy 2 <= k <= {n}, got {k}"),
                    });
                }
                let mut start = 0;
                Ok((0..k)
                    .map(|fold| {
                        let size = n / k + usize::from(fold < n % k);
                        let mask: Vec<bool> = (0..n).map(|j| j >= start && j < start + size).collect();
                        start += size;
                        Fold::from_test_mask(&mask)
                    })
                    .collect())
            }
        }
    }

    /// Shuffle labels for a permutation iteration.
    ///
    /// Under leave-one-run-out labels only move within their run, so each
    /// run keeps its label counts; otherwise they are shuffled globally.
    pub fn shuffle_labels<R: Rng + ?Sized>(&self, y: &[usize], runs: &[usize], rng: &mut R) -> Vec<usize> {
        let mut shuffled = y.to_vec();
        match self {
            CrossValidation::Run => {
                let mut ids = runs.to_vec();
                ids.sort_unstable();
                ids.dedup();
                for id in ids {
                    let positions: Vec<usize> = (0..runs.len()).filter(|&i| runs[i] == id).collect();
                    let mut labels: Vec<usize> = positions.iter().map(|&i| y[i]).collect();
                    labels.shuffle(rng);
                    for (&pos, label) in positions.iter().zip(labels) {
                        shuffled[pos] = label;
                    }
                }
            }
            _ => shuffled.shuffle(rng),
        }
        shuffled
    }
}
