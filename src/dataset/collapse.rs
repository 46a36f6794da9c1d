//! Temporal compression of multi-frame datasets.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Matrix;

/// Reduce the frame dimension of a dataset to a single matrix.
///
/// Indices are positions in the dataset's frame list, not offsets relative
/// to the onsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Collapse {
    /// Keep one frame.
    Frame(usize),
    /// Average a contiguous range of frames.
    Mean(Range<usize>),
    /// Weighted average over every frame.
    Weighted(Vec<f64>),
}

impl Collapse {
    /// Apply to per-frame matrices.
    pub fn apply(&self, frames: &[Matrix]) -> Result<Matrix> {
        match self {
            Collapse::Frame(index) => frames
                .get(*index)
                .cloned()
                .ok_or_else(|| invalid(format!("frame {index} of {}", frames.len()))),
            Collapse::Mean(range) => {
                let selected = frames
                    .get(range.clone())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid(format!("range {range:?} of {} frames", frames.len())))?;
                let weights = vec![1.0; selected.len()];
                Ok(weighted_sum(selected, &weights, selected.len() as f64))
            }
            Collapse::Weighted(weights) => {
                if weights.len() != frames.len() {
                    return Err(Error::ShapeMismatch {
                        context: "collapse weights",
                        expected: frames.len(),
                        got: weights.len(),
                    });
                }
                let total: f64 = weights.iter().sum();
                if total == 0.0 || !total.is_finite() {
                    return Err(invalid(format!("weights sum to {total}")));
                }
                Ok(weighted_sum(frames, weights, total))
            }
        }
    }

    /// Short tag used in result file names.
    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Collapse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collapse::Frame(index) => write!(f, "{index}"),
            Collapse::Mean(range) => write!(f, "{}-{}", range.start, range.end),
            Collapse::Weighted(_) => f.write_str("weighted"),
        }
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidParameter {
        parameter: "collapse",
        reason,
    }
}

fn weighted_sum(frames: &[Matrix], weights: &[f64], total: f64) -> Matrix {
    let mut out = Matrix::zeros(frames[0].nrows(), frames[0].ncols());
    for (frame, &w) in frames.iter().zip(weights) {
        out += frame * w;
    }
    out / total
}
