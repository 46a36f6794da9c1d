//! # neurodecode
//!
//! Event-wise fMRI deconvolution and cross-validated decoding.
//!
//! This crate turns ROI time series and event schedules into per-event
//! response estimates, and decodes condition labels from them:
//! - Per-event GLM deconvolution with canonical or FIR hemodynamic bases
//! - Frame-sampled decoding datasets, cached on input file modification times
//! - Leave-one-run-out, leave-one-out and k-fold cross-validation
//! - Label-permutation tests with per-iteration seeded RNGs
//! - Serial or thread-pool execution across subjects and iterations
//!
//! ## Caching Caveat
//!
//! Cached datasets and results are keyed on input modification times, not
//! contents. A file rewritten in place with its old mtime restored is served
//! from the stale cache entry. Delete the results directory to force a
//! recomputation.
//!
//! ## Quick Start
//!
//! ```ignore
//! use neurodecode::{
//!     decode_subject, extract_subject, Config, DatasetRequest, DecodeOptions, Layout,
//!     NearestCentroid,
//! };
//!
//! let layout = Layout::new(Config::from_json_file("study.json")?, None);
//! let request = DatasetRequest::new("faces", "ffa").frames(vec![2, 3, 4]);
//! let dataset = extract_subject(&my_source, "sub-01", &request, None)?;
//!
//! let result = decode_subject(&layout, &dataset, &NearestCentroid::new(), &DecodeOptions::new())?;
//! println!("accuracy per frame: {:?}", result.scores);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod result;
mod schedule;
mod types;

// Functional modules
pub mod cache;
pub mod dataset;
pub mod decoding;
pub mod deconvolution;
pub mod executor;
pub mod hrf;
pub mod model;
pub mod output;
pub mod signal;

// Re-exports for public API
pub use config::Config;
pub use dataset::{
    extract_group, extract_subject, Collapse, Dataset, DatasetRequest, EventTable, Layout,
    RoiMask, SubjectSource,
};
pub use decoding::{
    classifier_permutations, cross_validate, decode_group, decode_subject, model_coefs,
    permutation_test, unmask_weights, CrossValidation, DecodeOptions, PermutationOptions,
};
pub use deconvolution::{Deconvolver, EventDesigns};
pub use error::{Error, Result};
#[cfg(feature = "parallel")]
pub use executor::PoolMap;
pub use executor::{ParallelMap, SerialMap};
pub use hrf::{Basis, FrameGrid, RegressorGenerator};
pub use model::{Classifier, LearnedWeights, NearestCentroid};
pub use result::{Aggregation, DecodingResult, ModelCoefficients, PermutationResult};
pub use schedule::{MasterSchedule, ScheduledEvent};
pub use types::{Event, EventSpec, Matrix, PerItem, Vector};

/// Deconvolve one ROI time series with the default [`Deconvolver`].
///
/// `events[c]` holds the events of condition `c`; the result has one row per
/// event in onset order and one column per voxel.
///
/// # Errors
///
/// See [`Deconvolver::deconvolve`].
pub fn deconvolve(data: &Matrix, events: &[Vec<Event>]) -> Result<Matrix> {
    Deconvolver::new().deconvolve(data, events)
}
