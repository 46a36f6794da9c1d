//! Cached subject datasets and group extraction.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::collapse::Collapse;
use super::extract::extract_dataset;
use super::source::{covariate_matrix, RoiMask, SubjectSource};
use crate::cache::{CacheStore, Fingerprint, FingerprintBuilder};
use crate::error::{Error, Result};
use crate::executor::ParallelMap;
use crate::signal::{residualize, stack_rows, zscore_columns};
use crate::types::{Matrix, PerItem};

/// Cache key of stored datasets inside a results directory.
pub const DATASET_KEY: &str = "dataset";

/// Features, labels and provenance of one subject's decoding problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// One `samples x features` matrix per frame (a single one once collapsed).
    pub x: Vec<Matrix>,
    /// Condition index of every sample.
    pub y: Vec<usize>,
    /// Run id of every sample.
    pub runs: Vec<usize>,
    /// Subject id.
    pub subject: String,
    /// Problem name.
    pub problem: String,
    /// ROI name (names the results directory).
    pub roi_name: String,
    /// Mask the features were drawn from.
    pub mask_name: String,
    /// Label order: `y` indexes into this list.
    pub event_names: Vec<String>,
    /// Requested frames relative to onsets.
    pub frames: Vec<i64>,
    /// Covariates regressed out of the features.
    pub confounds: Vec<String>,
    /// Upsampling factor, if any.
    pub upsample: Option<usize>,
    /// Fingerprint of the extraction inputs.
    pub hash: Fingerprint,
    /// Temporal compression applied after loading.
    pub collapse: Option<Collapse>,
}

impl Dataset {
    /// Number of frames.
    pub fn n_frames(&self) -> usize {
        self.x.len()
    }

    /// Number of samples (events).
    pub fn n_samples(&self) -> usize {
        self.y.len()
    }

    /// Number of features (voxels).
    pub fn n_features(&self) -> usize {
        self.x.first().map_or(0, |m| m.ncols())
    }

    /// Apply a temporal compression, recording it.
    pub fn collapse(mut self, collapse: Option<&Collapse>) -> Result<Self> {
        if let Some(collapse) = collapse {
            self.x = vec![collapse.apply(&self.x)?];
        }
        self.collapse = collapse.cloned();
        Ok(self)
    }
}

/// What to extract for each subject.
///
/// ```ignore
/// let request = DatasetRequest::new("faces", "ifs")
///     .frames(vec![-1, 0, 1, 2, 3])
///     .confounds(vec!["rt".into()]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRequest {
    problem: String,
    roi_name: String,
    mask_name: Option<String>,
    frames: Vec<i64>,
    upsample: Option<usize>,
    confounds: Vec<String>,
    event_names: Option<Vec<String>>,
}

impl DatasetRequest {
    /// Sample at the onset frame only, without confounds or upsampling.
    pub fn new(problem: impl Into<String>, roi_name: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            roi_name: roi_name.into(),
            mask_name: None,
            frames: vec![0],
            upsample: None,
            confounds: Vec::new(),
            event_names: None,
        }
    }

    /// Use a mask other than the one named like the ROI.
    pub fn mask_name(mut self, mask_name: impl Into<String>) -> Self {
        self.mask_name = Some(mask_name.into());
        self
    }

    /// Frames relative to each onset.
    pub fn frames(mut self, frames: Vec<i64>) -> Self {
        self.frames = frames;
        self
    }

    /// Cubic-spline upsampling factor.
    pub fn upsample(mut self, factor: usize) -> Self {
        self.upsample = Some(factor);
        self
    }

    /// Event-table covariates to regress out of the features.
    pub fn confounds(mut self, confounds: Vec<String>) -> Self {
        self.confounds = confounds;
        self
    }

    /// Fixed label order.
    pub fn event_names(mut self, names: Vec<String>) -> Self {
        self.event_names = Some(names);
        self
    }

    /// Problem name.
    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// ROI name.
    pub fn roi_name(&self) -> &str {
        &self.roi_name
    }

    /// Mask name, falling back to the ROI name.
    pub fn resolved_mask_name(&self) -> &str {
        self.mask_name.as_deref().unwrap_or(&self.roi_name)
    }

    fn validate(&self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(Error::InvalidParameter {
                parameter: "frames",
                reason: "at least one frame is required".into(),
            });
        }
        if self.upsample == Some(0) {
            return Err(Error::InvalidParameter {
                parameter: "upsample",
                reason: "factor must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Fingerprint of a subject extraction: mask name, input timestamps and every
/// parameter that shapes the stored dataset.
pub fn dataset_fingerprint<S: SubjectSource + ?Sized>(
    source: &S,
    subject: &str,
    request: &DatasetRequest,
) -> Result<Fingerprint> {
    let layout = source.layout();
    let mask_name = request.resolved_mask_name();

    let mut builder = FingerprintBuilder::new("dataset")
        .param("mask_name", mask_name)
        .mtime("mask", &layout.mask_path(subject, mask_name))?
        .mtime("events", &layout.events_path(subject, request.problem()))?;
    for run in 0..source.n_runs(subject)? {
        builder = builder.mtime("timeseries", &layout.timeseries_path(subject, run))?;
    }

    let builder = builder
        .ints("frames", &request.frames)
        .strings("confounds", &request.confounds)
        .usizes("upsample", request.upsample.as_slice())
        .float("tr", layout.tr());
    let builder = match &request.event_names {
        Some(names) => builder.strings("event_names", names),
        None => builder.opt_param("event_names", None),
    };
    Ok(builder.finish())
}

/// Build (or load from cache) one subject's dataset.
///
/// The uncollapsed dataset is cached under the subject's results directory;
/// `collapse` is applied afterwards and is not part of the cache key.
pub fn extract_subject<S: SubjectSource + ?Sized>(
    source: &S,
    subject: &str,
    request: &DatasetRequest,
    collapse: Option<&Collapse>,
) -> Result<Dataset> {
    request.validate()?;

    let layout = source.layout();
    let store = CacheStore::new(layout.results_dir(subject, request.problem(), request.roi_name()));
    let hash = dataset_fingerprint(source, subject, request)?;

    if let Some(dataset) = store.load::<Dataset>(DATASET_KEY, &hash) {
        debug!(subject, roi = request.roi_name(), "using cached dataset");
        return dataset.collapse(collapse);
    }

    info!(subject, problem = request.problem(), roi = request.roi_name(), "extracting dataset");
    let dataset = build_dataset(source, subject, request, hash)?;
    store.store(DATASET_KEY, &dataset, &dataset.hash)?;
    dataset.collapse(collapse)
}

fn build_dataset<S: SubjectSource + ?Sized>(
    source: &S,
    subject: &str,
    request: &DatasetRequest,
    hash: Fingerprint,
) -> Result<Dataset> {
    let mask_name = request.resolved_mask_name();
    let mask = RoiMask::from_volume(&source.load_mask(subject, mask_name)?)?;
    let table = source.load_events(subject, request.problem())?;
    let event_names = request
        .event_names
        .clone()
        .unwrap_or_else(|| table.condition_names());

    let mut per_run: Vec<Vec<Matrix>> = Vec::new();
    let mut y = Vec::new();
    let mut runs = Vec::new();
    for run in table.runs() {
        let rows = table.run_rows(run);
        let timeseries = source.load_timeseries(subject, run)?;
        let (x_run, y_run) = extract_dataset(
            &rows,
            &timeseries,
            &mask,
            source.layout().tr(),
            &request.frames,
            request.upsample,
            Some(event_names.as_slice()),
        )?;
        debug!(subject, run, events = rows.len(), "extracted run");
        per_run.push(x_run);
        runs.resize(runs.len() + y_run.len(), run);
        y.extend(y_run);
    }

    let n_frames = per_run.first().map_or(0, Vec::len);
    let mut x = (0..n_frames)
        .map(|f| {
            let blocks: Vec<Matrix> = per_run.iter().map(|r| r[f].clone()).collect();
            stack_rows(&blocks, mask.n_voxels())
        })
        .collect::<Result<Vec<Matrix>>>()?;

    if !request.confounds.is_empty() {
        let mut confounds = covariate_matrix(&table.grouped_rows(), &request.confounds)?;
        zscore_columns(&mut confounds);
        for frame in &mut x {
            *frame = residualize(frame, &confounds)?;
        }
    }

    Ok(Dataset {
        x,
        y,
        runs,
        subject: subject.to_string(),
        problem: request.problem().to_string(),
        roi_name: request.roi_name().to_string(),
        mask_name: mask_name.to_string(),
        event_names,
        frames: request.frames.clone(),
        confounds: request.confounds.clone(),
        upsample: request.upsample,
        hash,
        collapse: None,
    })
}

/// Extract the same problem for many subjects through `executor`.
///
/// `collapse` is either shared or given per subject (e.g. subject-specific
/// weights). Results are in subject order.
pub fn extract_group<S, E>(
    source: &S,
    subjects: &[String],
    request: &DatasetRequest,
    collapse: Option<&PerItem<Collapse>>,
    executor: &E,
) -> Result<Vec<Dataset>>
where
    S: SubjectSource + ?Sized,
    E: ParallelMap,
{
    if let Some(collapse) = collapse {
        collapse.check_len(subjects.len())?;
    }
    let items: Vec<(usize, &String)> = subjects.iter().enumerate().collect();
    executor.map(items, |(i, subject)| {
        extract_subject(source, subject, request, collapse.and_then(|c| c.get(i)))
    })
}
