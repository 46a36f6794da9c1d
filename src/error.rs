//! Error types for extraction, deconvolution and decoding.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by every fallible operation in the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The ROI mask contains values other than 0 and 1.
    #[error("Mask must be a boolean volume: found value {value} at voxel {voxel:?}")]
    NonBooleanMask {
        /// Offending voxel value
        value: f64,
        /// Voxel index (x, y, z)
        voxel: [usize; 3],
    },

    /// Cross-validation specifier was not `run`, `sample` or a fold count.
    #[error("Cross-validation argument was not understood: {spec:?}")]
    UnknownCrossValidation {
        /// The rejected specifier
        spec: String,
    },

    /// Split binning and trialwise output were both requested.
    #[error("Cannot use both `split_pred` and `trialwise`")]
    SplitAndTrialwise,

    /// A parameter is outside its valid domain.
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Reason
        reason: String,
    },

    /// Operation only defined for single-frame datasets.
    #[error("Operation requires a single-frame dataset, got {frames} frames")]
    MultiFrameDataset {
        /// Number of frames in the dataset
        frames: usize,
    },

    /// Array dimensions disagree.
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Where the mismatch was detected
        context: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// Deconvolution needs at least one event.
    #[error("Event schedule is empty")]
    EmptySchedule,

    /// An event references a condition missing from the label list.
    #[error("Condition {condition:?} is not in the event name list")]
    UnknownCondition {
        /// Condition label
        condition: String,
    },

    /// A requested sampling frame falls outside the time series.
    #[error("Frame index {index} is outside the time series ({len} samples)")]
    FrameOutOfRange {
        /// Requested index on the (possibly upsampled) grid
        index: i64,
        /// Length of the sampled series
        len: usize,
    },

    /// Cubic interpolation needs at least four time points.
    #[error("Cubic spline upsampling needs at least 4 time points, got {got}")]
    TooFewTimepoints {
        /// Time points available
        got: usize,
    },

    /// Logit scoring requested from a model without probability output.
    #[error("Model {model} does not provide class probabilities")]
    MissingProbabilities {
        /// Model identity
        model: String,
    },

    /// Coefficient export requested from a model without learned weights.
    #[error("Model {model} does not expose learned weights")]
    MissingWeights {
        /// Model identity
        model: String,
    },

    /// A confound column is absent from the event table.
    #[error("Event table has no covariate column {column:?}")]
    MissingCovariate {
        /// Column name
        column: String,
    },

    /// The classifier failed to fit or predict.
    #[error("Model {model} failed: {reason}")]
    Model {
        /// Model identity
        model: String,
        /// Reason
        reason: String,
    },

    /// One or more tasks of a parallel map failed.
    #[error("{failed} of {total} tasks failed; first error: {first}")]
    Executor {
        /// Number of failed tasks
        failed: usize,
        /// Number of dispatched tasks
        total: usize,
        /// The error of the lowest-indexed failed task
        first: Box<Error>,
    },

    /// Filesystem access failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Payload serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Attach a path to an I/O error.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a fatal configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::NonBooleanMask { .. }
                | Error::UnknownCrossValidation { .. }
                | Error::SplitAndTrialwise
                | Error::InvalidParameter { .. }
                | Error::MultiFrameDataset { .. }
        )
    }
}

/// Result type for all crate operations.
pub type Result<T> = std::result::Result<T, Error>;
