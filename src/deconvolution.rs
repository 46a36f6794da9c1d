//! Event-wise deconvolution of ROI time series.
//!
//! Each event gets its own GLM: the event of interest as the first column(s)
//! and every other event folded into confound regressors. The resulting
//! coefficient is an estimate of that single event's response, adjusted for
//! the overlapping responses of its neighbours.

use tracing::debug;

use crate::error::{Error, Result};
use crate::hrf::{Basis, FrameGrid, RegressorGenerator};
use crate::schedule::{MasterSchedule, ScheduledEvent};
use crate::signal::{demean_columns, highpass_matrix, lstsq};
use crate::types::{Event, Matrix};

/// Configured event-wise deconvolution.
///
/// # Example
///
/// ```ignore
/// use neurodecode::{Deconvolver, Basis};
///
/// let coefs = Deconvolver::new()
///     .tr(2.0)
///     .hpf_cutoff(Some(128.0))
///     .basis(Basis::Fir { bins: 12 })
///     .deconvolve(&roi_data, &events_by_condition)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Deconvolver {
    tr: f64,
    hpf_cutoff: Option<f64>,
    split_confounds: bool,
    basis: Basis,
}

impl Default for Deconvolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Deconvolver {
    /// TR 2 s, 128 s high-pass, confounds split by condition, canonical basis.
    pub fn new() -> Self {
        Self {
            tr: 2.0,
            hpf_cutoff: Some(128.0),
            split_confounds: true,
            basis: Basis::Canonical,
        }
    }

    /// Set the sampling interval in seconds.
    pub fn tr(mut self, tr: f64) -> Self {
        self.tr = tr;
        self
    }

    /// Set the high-pass cutoff in seconds, or `None` to skip filtering.
    pub fn hpf_cutoff(mut self, cutoff: Option<f64>) -> Self {
        self.hpf_cutoff = cutoff;
        self
    }

    /// Use one confound regressor per condition (`true`) or a single one.
    pub fn split_confounds(mut self, split: bool) -> Self {
        self.split_confounds = split;
        self
    }

    /// Set the hemodynamic basis.
    pub fn basis(mut self, basis: Basis) -> Self {
        self.basis = basis;
        self
    }

    /// Iterate over the raw (unfiltered) design matrix of every event.
    ///
    /// Designs come in master-schedule order; the event of interest occupies
    /// the first `basis.n_columns()` columns.
    pub fn event_designs(&self, n_timepoints: usize, conditions: &[Vec<Event>]) -> Result<EventDesigns> {
        let generator = RegressorGenerator::new(FrameGrid::new(n_timepoints, self.tr), self.basis)?;
        Ok(EventDesigns {
            schedule: MasterSchedule::new(conditions),
            generator,
            split_confounds: self.split_confounds,
            next: 0,
        })
    }

    /// Design matrices exactly as the solver sees them: filtered, then
    /// column-demeaned.
    pub fn prepared_designs(&self, n_timepoints: usize, conditions: &[Vec<Event>]) -> Result<Vec<Matrix>> {
        let filter = self.filter(n_timepoints)?;
        Ok(self
            .event_designs(n_timepoints, conditions)?
            .map(|design| prepare(design, filter.as_ref()))
            .collect())
    }

    /// Estimate one coefficient (vector) per event.
    ///
    /// # Arguments
    ///
    /// * `data` - `n_timepoints x n_features` ROI data
    /// * `conditions` - One `(onset, duration, amplitude)` list per condition
    ///
    /// # Returns
    ///
    /// An `n_events x (n_features · n_bins)` matrix in onset order. Under a
    /// FIR basis each row concatenates the bins (bin-major).
    ///
    /// # Errors
    ///
    /// The schedule must contain at least one event.
    pub fn deconvolve(&self, data: &Matrix, conditions: &[Vec<Event>]) -> Result<Matrix> {
        let n_timepoints = data.nrows();
        let n_features = data.ncols();
        let n_bins = self.basis.n_columns();

        let designs = self.event_designs(n_timepoints, conditions)?;
        if designs.schedule.is_empty() {
            return Err(Error::EmptySchedule);
        }
        let n_events = designs.schedule.len();

        let filter = self.filter(n_timepoints)?;
        let data = prepare(data.clone(), filter.as_ref());

        debug!(
            n_events,
            n_timepoints,
            n_features,
            basis = ?self.basis,
            split_confounds = self.split_confounds,
            "deconvolving events"
        );

        let mut coefs = Matrix::zeros(n_events, n_features * n_bins);
        for (row, design) in designs.enumerate() {
            let design = prepare(design, filter.as_ref());
            let beta = lstsq(&design, &data)?;
            for bin in 0..n_bins {
                for feat in 0..n_features {
                    coefs[(row, bin * n_features + feat)] = beta[(bin, feat)];
                }
            }
        }

        Ok(coefs)
    }

    fn filter(&self, n_timepoints: usize) -> Result<Option<Matrix>> {
        self.hpf_cutoff
            .map(|cutoff| highpass_matrix(n_timepoints, cutoff, self.tr))
            .transpose()
    }
}

/// Apply the (optional) filter, then remove column means.
fn prepare(matrix: Matrix, filter: Option<&Matrix>) -> Matrix {
    let mut matrix = match filter {
        Some(f) => f * matrix,
        None => matrix,
    };
    demean_columns(&mut matrix);
    matrix
}

/// Iterator over per-event design matrices.
#[derive(Debug, Clone)]
pub struct EventDesigns {
    schedule: MasterSchedule,
    generator: RegressorGenerator,
    split_confounds: bool,
    next: usize,
}

impl EventDesigns {
    /// The schedule being iterated.
    pub fn schedule(&self) -> &MasterSchedule {
        &self.schedule
    }

    fn design_for(&self, target: &ScheduledEvent) -> Matrix {
        let mut blocks = vec![self.generator.regressor(&[target.event])];

        if self.split_confounds {
            for condition in 0..self.schedule.n_conditions() {
                let events = self.schedule.condition_without(condition, target);
                blocks.push(self.generator.regressor(&events));
            }
        } else {
            blocks.push(self.generator.regressor(&self.schedule.without(target)));
        }

        let n_rows = self.generator.grid().n_timepoints;
        let n_cols = blocks.iter().map(|b| b.ncols()).sum();
        let mut design = Matrix::zeros(n_rows, n_cols);
        let mut col = 0;
        for block in &blocks {
            design.columns_mut(col, block.ncols()).copy_from(block);
            col += block.ncols();
        }
        design
    }
}

impl Iterator for EventDesigns {
    type Item = Matrix;

    fn next(&mut self) -> Option<Matrix> {
        let target = *self.schedule.events().get(self.next)?;
        self.next += 1;
        Some(self.design_for(&target))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.schedule.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EventDesigns {}
