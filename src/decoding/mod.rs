//! Cross-validated decoding, permutation tests and coefficient export.
//!
//! Results are cached per subject, problem and ROI under the configured
//! results directory, keyed by model identity and the output flags.

mod coefs;
mod cv;
mod decode;
mod permutation;
mod score;

pub use coefs::{model_coefs, unmask_weights};
pub use cv::{CrossValidation, Fold};
pub use decode::{
    cross_validate, decode_group, decode_subject, decoder_fingerprint, results_key, DecodeOptions,
};
pub use permutation::{classifier_permutations, counter_rng_seed, permutation_test, PermutationOptions};
pub use score::{aggregate_scores, fold_scores, logit, PROB_CLAMP};
