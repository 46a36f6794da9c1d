//! Classifier contract used by the decoder, plus a baseline implementation.
//!
//! Labels are dense integers `0..n_classes`; probability matrices have one
//! column per label in that order.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signal::stack_rows;
use crate::types::{Matrix, Vector};

/// Weights learned by a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LearnedWeights {
    /// One weight vector per row, e.g. one per class.
    Single(Matrix),
    /// One weight vector per ensemble member.
    Ensemble(Vec<Vector>),
}

impl LearnedWeights {
    /// Weights as a `rows x features` matrix.
    pub fn to_matrix(&self) -> Result<Matrix> {
        match self {
            LearnedWeights::Single(m) => Ok(m.clone()),
            LearnedWeights::Ensemble(members) => {
                let n_features = members.first().map_or(0, |m| m.len());
                let rows: Vec<Matrix> = members
                    .iter()
                    .map(|m| Matrix::from_row_slice(1, m.len(), m.as_slice()))
                    .collect();
                stack_rows(&rows, n_features)
            }
        }
    }

    /// Whether the weights come from an ensemble.
    pub fn is_ensemble(&self) -> bool {
        matches!(self, LearnedWeights::Ensemble(_))
    }
}

/// A fit/predict classification model.
///
/// The decoder clones the configured (unfitted) model for every fold and
/// permutation so fitted state never leaks between them.
pub trait Classifier: Send + Sync {
    /// Stable name used in cache fingerprints and result file names.
    fn identity(&self) -> String;

    /// Fit on `samples x features` data with one label per row.
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> Result<()>;

    /// Predict a label for every row.
    fn predict(&self, x: &Matrix) -> Result<Vec<usize>>;

    /// Whether [`Classifier::predict_proba`] is implemented.
    fn supports_probabilities(&self) -> bool {
        false
    }

    /// Class probabilities, `rows x n_classes`.
    fn predict_proba(&self, _x: &Matrix) -> Result<Matrix> {
        Err(Error::MissingProbabilities {
            model: self.identity(),
        })
    }

    /// Weights of the fitted model, if it exposes any.
    fn learned_weights(&self) -> Option<LearnedWeights> {
        None
    }
}

/// Nearest class-centroid classifier.
///
/// Probabilities are a softmax over negative squared distances; the learned
/// weights are the class centroids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearestCentroid {
    centroids: Option<Matrix>,
    present: Vec<bool>,
}

impl NearestCentroid {
    /// An unfitted model.
    pub fn new() -> Self {
        Self::default()
    }

    fn fitted(&self) -> Result<&Matrix> {
        self.centroids.as_ref().ok_or_else(|| Error::Model {
            model: self.identity(),
            reason: "predict called before fit".into(),
        })
    }

    /// Squared distance of every row to every present centroid (`inf` for
    /// classes absent from training).
    fn distances(&self, x: &Matrix) -> Result<Matrix> {
        let centroids = self.fitted()?;
        if x.ncols() != centroids.ncols() {
            return Err(Error::ShapeMismatch {
                context: "classifier features",
                expected: centroids.ncols(),
                got: x.ncols(),
            });
        }
        Ok(Matrix::from_fn(x.nrows(), centroids.nrows(), |i, c| {
            if self.present[c] {
                (x.row(i) - centroids.row(c)).norm_squared()
            } else {
                f64::INFINITY
            }
        }))
    }
}

impl Classifier for NearestCentroid {
    fn identity(&self) -> String {
        "NearestCentroid".to_string()
    }

    fn fit(&mut self, x: &Matrix, y: &[usize]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch {
                context: "classifier labels",
                expected: x.nrows(),
                got: y.len(),
            });
        }
        let n_classes = y.iter().max().map_or(0, |m| m + 1);
        if n_classes == 0 {
            return Err(Error::Model {
                model: self.identity(),
                reason: "no training samples".into(),
            });
        }

        let mut sums = Matrix::zeros(n_classes, x.ncols());
        let mut counts = vec![0usize; n_classes];
        for (i, &label) in y.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += x.row(i);
            counts[label] += 1;
        }
        for (c, &count) in counts.iter().enumerate() {
            if count > 0 {
                let mut row = sums.row_mut(c);
                row /= count as f64;
            }
        }

        self.present = counts.iter().map(|&c| c > 0).collect();
        self.centroids = Some(sums);
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        let d = self.distances(x)?;
        Ok(d.row_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::INFINITY), |best, (c, &v)| if v < best.1 { (c, v) } else { best })
                    .0
            })
            .collect())
    }

    fn supports_probabilities(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: &Matrix) -> Result<Matrix> {
        let mut d = self.distances(x)?;
        for mut row in d.row_iter_mut() {
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            row.apply(|v| *v = (-(*v - min)).exp());
            let total = row.sum();
            row /= total;
        }
        Ok(d)
    }

    fn learned_weights(&self) -> Option<LearnedWeights> {
        self.centroids.clone().map(LearnedWeights::Single)
    }
}
