//! Decoding datasets: frame-sampled ROI features with labels and runs.
//!
//! - [`extract_dataset`] samples one run at frames relative to event onsets
//! - [`extract_subject`] concatenates runs, regresses confounds and caches
//! - [`extract_group`] maps subject extraction through a [`ParallelMap`]
//!
//! [`ParallelMap`]: crate::executor::ParallelMap

mod collapse;
mod extract;
mod source;
mod subject;

pub use collapse::Collapse;
pub use extract::{extract_dataset, sampling_offsets};
pub use source::{condition_names, covariate_matrix, EventTable, Layout, RoiMask, SubjectSource};
pub use subject::{
    dataset_fingerprint, extract_group, extract_subject, Dataset, DatasetRequest, DATASET_KEY,
};
