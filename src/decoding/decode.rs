//! Cached cross-validated decoding of subject datasets.

use tracing::{debug, info};

use super::cv::CrossValidation;
use super::score::{aggregate_scores, fold_scores};
use crate::cache::{CacheStore, Fingerprint, FingerprintBuilder};
use crate::dataset::{Dataset, Layout};
use crate::error::{Error, Result};
use crate::executor::ParallelMap;
use crate::model::Classifier;
use crate::result::DecodingResult;
use crate::types::{Matrix, PerItem};

/// Decoding configuration.
///
/// ```ignore
/// let options = DecodeOptions::new()
///     .cv("run".parse()?)
///     .logits(true);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodeOptions {
    cv: CrossValidation,
    split_pred: Option<Vec<i64>>,
    trialwise: bool,
    logits: bool,
}

impl DecodeOptions {
    /// Leave-one-run-out accuracy, averaged per frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cross-validation scheme.
    pub fn cv(mut self, cv: CrossValidation) -> Self {
        self.cv = cv;
        self
    }

    /// Average scores within bins of these per-sample values.
    pub fn split_pred(mut self, split_pred: Vec<i64>) -> Self {
        self.split_pred = Some(split_pred);
        self
    }

    /// Keep one score per sample instead of averaging.
    pub fn trialwise(mut self, trialwise: bool) -> Self {
        self.trialwise = trialwise;
        self
    }

    /// Score with the logit of the true-label probability.
    pub fn logits(mut self, logits: bool) -> Self {
        self.logits = logits;
        self
    }

    /// Cross-validation scheme.
    pub fn cv_scheme(&self) -> CrossValidation {
        self.cv
    }

    /// Split values, if binning.
    pub fn split_values(&self) -> Option<&[i64]> {
        self.split_pred.as_deref()
    }

    /// Reject contradictory settings before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.split_pred.is_some() && self.trialwise {
            return Err(Error::SplitAndTrialwise);
        }
        Ok(())
    }
}

/// Result file stem: model identity plus tags for collapse, split,
/// trialwise, logits and shuffle, joined by `_` with empty parts dropped.
pub fn results_key(
    dataset: &Dataset,
    model_identity: &str,
    split: bool,
    trialwise: bool,
    logits: bool,
    shuffle: bool,
) -> String {
    let collapse = dataset.collapse.as_ref().map(|c| c.tag()).unwrap_or_default();
    let flags = [
        (split, "split"),
        (trialwise, "trialwise"),
        (logits, "logits"),
        (shuffle, "shuffle"),
    ];

    let mut parts = vec![model_identity.to_string(), collapse];
    parts.extend(flags.iter().filter(|(on, _)| *on).map(|(_, tag)| tag.to_string()));
    parts.retain(|p| !p.is_empty());
    parts.join("_")
}

/// Fingerprint of a decoder's inputs: feature values, labels, runs, model,
/// and whichever of CV scheme, split values, iteration count and seed apply.
pub fn decoder_fingerprint(
    dataset: &Dataset,
    model_identity: &str,
    cv: Option<CrossValidation>,
    split_pred: Option<&[i64]>,
    permutations: Option<(usize, u64)>,
) -> Fingerprint {
    let mut builder = FingerprintBuilder::new("decoder");
    for frame in &dataset.x {
        builder = builder.matrix("x", frame);
    }
    let mut builder = builder
        .usizes("y", &dataset.y)
        .usizes("runs", &dataset.runs)
        .param("model", model_identity)
        .opt_param("cv", cv.map(|c| c.to_string()).as_deref());
    if let Some(split) = split_pred {
        builder = builder.ints("split_pred", split);
    }
    if let Some((n_iter, seed)) = permutations {
        builder = builder.int("n_iter", n_iter as i64).int("seed", seed as i64);
    }
    builder.finish()
}

pub(crate) fn results_store(layout: &Layout, dataset: &Dataset) -> CacheStore {
    CacheStore::new(layout.results_dir(&dataset.subject, &dataset.problem, &dataset.roi_name))
}

/// Cross-validate a model on every frame of a dataset, without caching.
pub fn cross_validate<M: Classifier + Clone>(
    dataset: &Dataset,
    model: &M,
    options: &DecodeOptions,
) -> Result<DecodingResult> {
    options.validate()?;
    let hash = decoder_fingerprint(
        dataset,
        &model.identity(),
        Some(options.cv),
        options.split_values(),
        None,
    );
    run_decoder(dataset, model, options, hash)
}

fn run_decoder<M: Classifier + Clone>(
    dataset: &Dataset,
    model: &M,
    options: &DecodeOptions,
    hash: Fingerprint,
) -> Result<DecodingResult> {
    if options.logits && !model.supports_probabilities() {
        return Err(Error::MissingProbabilities {
            model: model.identity(),
        });
    }

    let folds = options.cv.folds(&dataset.runs)?;
    let mut scores = Matrix::zeros(dataset.n_frames(), dataset.n_samples());
    for (frame, x) in dataset.x.iter().enumerate() {
        let frame_scores = fold_scores(x, &dataset.y, &folds, model, options.logits)?;
        scores.row_mut(frame).iter_mut().zip(frame_scores).for_each(|(s, v)| *s = v);
        debug!(frame, folds = folds.len(), "cross-validated frame");
    }

    let (scores, aggregation) = aggregate_scores(scores, options.split_values(), options.trialwise)?;
    Ok(DecodingResult {
        scores,
        aggregation,
        hash,
    })
}

/// Decode one dataset, serving the result from cache when inputs match.
///
/// # Errors
///
/// Split binning together with trialwise output is rejected before any
/// computation or cache access.
pub fn decode_subject<M: Classifier + Clone>(
    layout: &Layout,
    dataset: &Dataset,
    model: &M,
    options: &DecodeOptions,
) -> Result<DecodingResult> {
    options.validate()?;

    let identity = model.identity();
    let key = results_key(
        dataset,
        &identity,
        options.split_pred.is_some(),
        options.trialwise,
        options.logits,
        false,
    );
    let hash = decoder_fingerprint(dataset, &identity, Some(options.cv), options.split_values(), None);
    let store = results_store(layout, dataset);

    if let Some(result) = store.load::<DecodingResult>(&key, &hash) {
        debug!(subject = %dataset.subject, key = %key, "using cached decoding result");
        return Ok(result);
    }

    info!(subject = %dataset.subject, key = %key, cv = %options.cv, "decoding");
    let result = run_decoder(dataset, model, options, hash)?;
    store.store(&key, &result, &result.hash)?;
    Ok(result)
}

/// Decode many datasets through `executor`, results in dataset order.
///
/// `split_pred`, when given, overrides the options' split values either for
/// every dataset or per dataset.
pub fn decode_group<M, E>(
    layout: &Layout,
    datasets: &[Dataset],
    model: &M,
    options: &DecodeOptions,
    split_pred: Option<&PerItem<Vec<i64>>>,
    executor: &E,
) -> Result<Vec<DecodingResult>>
where
    M: Classifier + Clone,
    E: ParallelMap,
{
    options.validate()?;
    if let Some(split) = split_pred {
        if options.trialwise {
            return Err(Error::SplitAndTrialwise);
        }
        split.check_len(datasets.len())?;
    }

    let items: Vec<(usize, &Dataset)> = datasets.iter().enumerate().collect();
    executor.map(items, |(i, dataset)| {
        match split_pred.and_then(|s| s.get(i)) {
            Some(split) => {
                let options = options.clone().split_pred(split.clone());
                decode_subject(layout, dataset, model, &options)
            }
            None => decode_subject(layout, dataset, model, options),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Collapse;

    fn dataset() -> Dataset {
        Dataset {
            x: vec![Matrix::from_fn(4, 2, |i, j| (i * 2 + j) as f64)],
            y: vec![0, 1, 0, 1],
            runs: vec![0, 0, 1, 1],
            subject: "s1".into(),
            problem: "faces".into(),
            roi_name: "ifs".into(),
            mask_name: "ifs".into(),
            event_names: vec!["a".into(), "b".into()],
            frames: vec![0],
            confounds: vec![],
            upsample: None,
            hash: FingerprintBuilder::new("t").finish(),
            collapse: None,
        }
    }

    #[test]
    fn test_results_key() {
        let mut ds = dataset();
        assert_eq!(results_key(&ds, "Model", false, false, false, false), "Model");
        assert_eq!(results_key(&ds, "Model", true, false, true, false), "Model_split_logits");
        ds.collapse = Some(Collapse::Mean(1..3));
        assert_eq!(results_key(&ds, "Model", false, true, false, true), "Model_1-3_trialwise_shuffle");
    }

    #[test]
    fn test_fingerprint_covers_cv_and_split() {
        let ds = dataset();
        let base = decoder_fingerprint(&ds, "M", Some(CrossValidation::Run), None, None);
        assert_ne!(base, decoder_fingerprint(&ds, "M", Some(CrossValidation::Sample), None, None));
        assert_ne!(base, decoder_fingerprint(&ds, "M", Some(CrossValidation::Run), Some(&[1, 2, 1, 2][..]), None));
        assert_ne!(base, decoder_fingerprint(&ds, "N", Some(CrossValidation::Run), None, None));
        assert_ne!(base, decoder_fingerprint(&ds, "M", Some(CrossValidation::Run), None, Some((10, 0))));
        assert_eq!(base, decoder_fingerprint(&ds, "M", Some(CrossValidation::Run), None, None));
    }

    #[test]
    fn test_split_and_trialwise_rejected() {
        let options = DecodeOptions::new().split_pred(vec![0, 1, 0, 1]).trialwise(true);
        assert!(matches!(options.validate(), Err(Error::SplitAndTrialwise)));
    }
}
