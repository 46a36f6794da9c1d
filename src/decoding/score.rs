//! Per-sample cross-validated scores and their aggregation.

use tracing::trace;

use super::cv::Fold;
use crate::error::{Error, Result};
use crate::model::Classifier;
use crate::result::Aggregation;
use crate::types::Matrix;

/// Probabilities are clamped to `[PROB_CLAMP, 1 - PROB_CLAMP]` before the
/// logit so scores stay finite.
pub const PROB_CLAMP: f64 = 1e-12;

/// Log-odds of a probability, clamped away from 0 and 1.
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(PROB_CLAMP, 1.0 - PROB_CLAMP);
    p.ln() - (1.0 - p).ln()
}

/// Score every sample from the fold in which it was held out.
///
/// With `logits` the score is the logit of the probability assigned to the
/// true label; otherwise 1.0 for a correct prediction and 0.0 for a wrong
/// one. Scores are indexed by original sample position.
pub fn fold_scores<M: Classifier + Clone>(
    x: &Matrix,
    y: &[usize],
    folds: &[Fold],
    model: &M,
    logits: bool,
) -> Result<Vec<f64>> {
    if x.nrows() != y.len() {
        return Err(Error::ShapeMismatch {
            context: "dataset labels",
            expected: x.nrows(),
            got: y.len(),
        });
    }

    let mut scores = vec![f64::NAN; y.len()];
    for (k, fold) in folds.iter().enumerate() {
        let mut fitted = model.clone();
        let y_train: Vec<usize> = fold.train.iter().map(|&i| y[i]).collect();
        fitted.fit(&x.select_rows(&fold.train), &y_train)?;

        let x_test = x.select_rows(&fold.test);
        if logits {
            let proba = fitted.predict_proba(&x_test)?;
            for (row, &i) in fold.test.iter().enumerate() {
                // A label never seen in training has probability 0
                let p = if y[i] < proba.ncols() { proba[(row, y[i])] } else { 0.0 };
                scores[i] = logit(p);
            }
        } else {
            let predicted = fitted.predict(&x_test)?;
            if predicted.len() != fold.test.len() {
                return Err(Error::ShapeMismatch {
                    context: "classifier predictions",
                    expected: fold.test.len(),
                    got: predicted.len(),
                });
            }
            for (&label, &i) in predicted.iter().zip(&fold.test) {
                scores[i] = if label == y[i] { 1.0 } else { 0.0 };
            }
        }
        trace!(fold = k, train = fold.train.len(), test = fold.test.len(), "scored fold");
    }
    Ok(scores)
}

/// Reduce `frames x samples` scores.
///
/// Split bins take precedence: one column per sorted unique bin value holding
/// the per-frame mean of that bin. Otherwise scores are averaged per frame
/// unless `trialwise` keeps every sample.
pub fn aggregate_scores(
    scores: Matrix,
    split_pred: Option<&[i64]>,
    trialwise: bool,
) -> Result<(Matrix, Aggregation)> {
    if let Some(split) = split_pred {
        if split.len() != scores.ncols() {
            return Err(Error::ShapeMismatch {
                context: "split labels",
                expected: scores.ncols(),
                got: split.len(),
            });
        }
        let mut bins = split.to_vec();
        bins.sort_unstable();
        bins.dedup();

        let mut out = Matrix::zeros(scores.nrows(), bins.len());
        for (col, bin) in bins.iter().enumerate() {
            let members: Vec<usize> = (0..split.len()).filter(|&i| split[i] == *bin).collect();
            for frame in 0..scores.nrows() {
                let total: f64 = members.iter().map(|&i| scores[(frame, i)]).sum();
                out[(frame, col)] = total / members.len() as f64;
            }
        }
        return Ok((out, Aggregation::Split { bins }));
    }

    if trialwise {
        return Ok((scores, Aggregation::Trialwise));
    }

    let n = scores.ncols() as f64;
    let means = Matrix::from_fn(scores.nrows(), 1, |frame, _| scores.row(frame).sum() / n);
    Ok((means, Aggregation::Mean))
}
