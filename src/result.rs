//! Decoding result types.

use serde::{Deserialize, Serialize};

use crate::cache::Fingerprint;
use crate::types::Matrix;

/// How per-sample scores were reduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregation {
    /// Mean over samples: one column.
    Mean,
    /// Mean within each split bin: one column per bin.
    Split {
        /// Bin values in column order (sorted).
        bins: Vec<i64>,
    },
    /// No reduction: one column per sample.
    Trialwise,
}

/// Cross-validated scores of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingResult {
    /// `frames x columns` scores; column meaning given by `aggregation`.
    pub scores: Matrix,

    /// Reduction applied to the per-sample scores.
    pub aggregation: Aggregation,

    /// Fingerprint of the decoder inputs.
    pub hash: Fingerprint,
}

impl DecodingResult {
    /// Scores of one frame.
    pub fn frame(&self, frame: usize) -> Vec<f64> {
        self.scores.row(frame).iter().copied().collect()
    }

    /// Single-frame, single-column score (e.g. mean accuracy).
    pub fn scalar(&self) -> Option<f64> {
        (self.scores.shape() == (1, 1)).then(|| self.scores[(0, 0)])
    }
}

/// Observed accuracy against a label-permutation null distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationResult {
    /// Observed mean accuracy per frame.
    pub observed: Vec<f64>,

    /// Null accuracies, `frames x iterations`.
    pub null: Matrix,

    /// `(1 + #{null >= observed}) / (1 + iterations)` per frame.
    pub p_values: Vec<f64>,

    /// Fingerprint of the decoder inputs, iteration count and seed.
    pub hash: Fingerprint,
}

impl PermutationResult {
    /// Number of permutation iterations.
    pub fn n_iter(&self) -> usize {
        self.null.ncols()
    }
}

/// Weights of a model fit on a whole single-frame dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCoefficients {
    /// `rows x features`: one row per class weight vector or ensemble member.
    pub weights: Matrix,

    /// Whether the rows are ensemble members.
    pub ensemble: bool,

    /// Fingerprint of the decoder inputs.
    pub hash: Fingerprint,
}
