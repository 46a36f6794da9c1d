//! Label-permutation tests of decoding accuracy.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info};

use super::cv::{CrossValidation, Fold};
use super::decode::{decoder_fingerprint, results_key, results_store};
use super::score::fold_scores;
use crate::cache::Fingerprint;
use crate::dataset::{Dataset, Layout};
use crate::error::{Error, Result};
use crate::executor::ParallelMap;
use crate::model::Classifier;
use crate::result::PermutationResult;
use crate::types::Matrix;

/// Counter-based RNG seed generation using SplitMix64.
///
/// Maps a base seed and an iteration counter to a well-mixed 64-bit seed, so
/// each permutation iteration gets an independent stream that does not
/// depend on which thread runs it or in what order.
///
/// # Arguments
///
/// * `base_seed` - User-provided seed
/// * `counter` - Iteration index (0, 1, 2, ...)
#[inline]
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    // SplitMix64, see https://xoshiro.di.unimi.it/splitmix64.c
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Permutation test configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationOptions {
    n_iter: usize,
    cv: CrossValidation,
    seed: u64,
}

impl Default for PermutationOptions {
    fn default() -> Self {
        Self {
            n_iter: 1000,
            cv: CrossValidation::Run,
            seed: 0,
        }
    }
}

impl PermutationOptions {
    /// 1000 iterations, leave-one-run-out, seed 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shuffled-label iterations.
    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Cross-validation scheme (also decides how labels are shuffled).
    pub fn cv(mut self, cv: CrossValidation) -> Self {
        self.cv = cv;
        self
    }

    /// Base seed of the per-iteration RNGs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_iter == 0 {
            return Err(Error::InvalidParameter {
                parameter: "n_iter",
                reason: "at least one permutation is required".into(),
            });
        }
        Ok(())
    }
}

/// Mean accuracy of every frame under `y`.
fn frame_accuracies<M: Classifier + Clone>(
    dataset: &Dataset,
    y: &[usize],
    folds: &[Fold],
    model: &M,
) -> Result<Vec<f64>> {
    dataset
        .x
        .iter()
        .map(|x| {
            let scores = fold_scores(x, y, folds, model, false)?;
            Ok(scores.iter().sum::<f64>() / scores.len() as f64)
        })
        .collect()
}

/// Run a permutation test on one dataset, without caching.
///
/// Iteration `i` shuffles labels with a Xoshiro256++ generator seeded from
/// `counter_rng_seed(seed, i)`, so results are identical for every executor.
pub fn permutation_test<M, E>(
    dataset: &Dataset,
    model: &M,
    options: &PermutationOptions,
    executor: &E,
) -> Result<PermutationResult>
where
    M: Classifier + Clone,
    E: ParallelMap,
{
    options.validate()?;
    let hash = decoder_fingerprint(
        dataset,
        &model.identity(),
        Some(options.cv),
        None,
        Some((options.n_iter, options.seed)),
    );
    run_permutations(dataset, model, options, executor, hash)
}

fn run_permutations<M, E>(
    dataset: &Dataset,
    model: &M,
    options: &PermutationOptions,
    executor: &E,
    hash: Fingerprint,
) -> Result<PermutationResult>
where
    M: Classifier + Clone,
    E: ParallelMap,
{
    let folds = options.cv.folds(&dataset.runs)?;
    let observed = frame_accuracies(dataset, &dataset.y, &folds, model)?;

    let null_columns = executor.map((0..options.n_iter as u64).collect(), |i| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(options.seed, i));
        let shuffled = options.cv.shuffle_labels(&dataset.y, &dataset.runs, &mut rng);
        frame_accuracies(dataset, &shuffled, &folds, model)
    })?;

    let n_frames = observed.len();
    let null = Matrix::from_fn(n_frames, options.n_iter, |f, i| null_columns[i][f]);
    let p_values = (0..n_frames)
        .map(|f| {
            let exceed = null.row(f).iter().filter(|&&v| v >= observed[f]).count();
            (1 + exceed) as f64 / (1 + options.n_iter) as f64
        })
        .collect();

    debug!(n_iter = options.n_iter, ?observed, "permutation test finished");
    Ok(PermutationResult {
        observed,
        null,
        p_values,
        hash,
    })
}

/// Permutation tests for many datasets, each cached in its results directory.
///
/// Datasets are processed one at a time; the iterations of each test fan out
/// through `executor`.
pub fn classifier_permutations<M, E>(
    layout: &Layout,
    datasets: &[Dataset],
    model: &M,
    options: &PermutationOptions,
    executor: &E,
) -> Result<Vec<PermutationResult>>
where
    M: Classifier + Clone,
    E: ParallelMap,
{
    options.validate()?;
    let identity = model.identity();

    datasets
        .iter()
        .map(|dataset| {
            let key = results_key(dataset, &identity, false, false, false, true);
            let hash = decoder_fingerprint(
                dataset,
                &identity,
                Some(options.cv),
                None,
                Some((options.n_iter, options.seed)),
            );
            let store = results_store(layout, dataset);
            if let Some(result) = store.load::<PermutationResult>(&key, &hash) {
                debug!(subject = %dataset.subject, key = %key, "using cached permutations");
                return Ok(result);
            }

            info!(subject = %dataset.subject, n_iter = options.n_iter, "running permutation test");
            let result = run_permutations(dataset, model, options, executor, hash)?;
            store.store(&key, &result, &result.hash)?;
            Ok(result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_seeds_differ() {
        let seeds: Vec<u64> = (0..100).map(|i| counter_rng_seed(42, i)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
        assert_eq!(counter_rng_seed(42, 7), counter_rng_seed(42, 7));
        assert_ne!(counter_rng_seed(42, 7), counter_rng_seed(43, 7));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(PermutationOptions::new().n_iter(0).validate().is_err());
    }
}
