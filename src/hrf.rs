//! Hemodynamic regressors sampled on the acquisition grid.
//!
//! An event train (onset, duration, amplitude) is laid out as a boxcar on a
//! high-resolution grid (16 samples per TR, starting 24 s before the first
//! frame), convolved with a response kernel and linearly interpolated at the
//! frame times `k · tr`.
//!
//! # Bases
//!
//! - **Canonical**: Glover double gamma, peak ~5 s, undershoot ~12 s,
//!   normalized to unit sum so a sustained unit boxcar plateaus at 1.
//! - **FIR**: one TR-wide box per delay bin, delays `0, tr, …, (bins-1)·tr`.
//!
//! Because the boxcar is the running sum of a sparse impulse train, the
//! convolution is evaluated as a sum of shifted *step responses* (the
//! cumulative kernel), only at the high-resolution samples the frame
//! interpolation actually reads.

use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::error::{Error, Result};
use crate::types::{Event, Matrix};

/// High-resolution samples per TR.
pub const OVERSAMPLING: usize = 16;

/// Start of the high-resolution grid relative to the first frame (seconds).
pub const MIN_ONSET: f64 = -24.0;

/// Length of the canonical kernel in seconds.
const KERNEL_SECONDS: f64 = 32.0;

/// Hemodynamic response basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Basis {
    /// Single Glover double-gamma shape.
    #[default]
    Canonical,
    /// Finite impulse response with `bins` one-TR delay bins.
    Fir {
        /// Number of delay bins.
        bins: usize,
    },
}

impl Basis {
    /// Number of regressor columns this basis produces per event train.
    pub fn n_columns(&self) -> usize {
        match self {
            Self::Canonical => 1,
            Self::Fir { bins } => *bins,
        }
    }
}

/// Frame grid of one acquisition: `n_timepoints` frames every `tr` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGrid {
    /// Number of acquired frames.
    pub n_timepoints: usize,
    /// Sampling interval in seconds.
    pub tr: f64,
}

impl FrameGrid {
    /// Create a frame grid.
    pub fn new(n_timepoints: usize, tr: f64) -> Self {
        Self { n_timepoints, tr }
    }

    /// Acquisition time of every frame in seconds.
    pub fn frame_times(&self) -> Vec<f64> {
        (0..self.n_timepoints).map(|k| k as f64 * self.tr).collect()
    }
}

/// Glover canonical HRF sampled every `tr / oversampling` seconds over 32 s.
pub fn glover_kernel(tr: f64, oversampling: usize) -> Vec<f64> {
    let dt = tr / oversampling as f64;
    let n = ((KERNEL_SECONDS / dt) as usize).max(2);
    let step = KERNEL_SECONDS / (n - 1) as f64;
    let loc = dt / 0.9;

    let mut kernel: Vec<f64> = (0..n)
        .map(|k| {
            let t = k as f64 * step;
            gamma_pdf(t - loc, 6.0 / 0.9) - 0.35 * gamma_pdf(t - loc, 12.0 / 0.9)
        })
        .collect();

    let total: f64 = kernel.iter().sum();
    if total.abs() > 0.0 {
        kernel.iter_mut().for_each(|k| *k /= total);
    }
    kernel
}

/// FIR kernels: bin `j` is `j · oversampling` zeros followed by
/// `oversampling` ones.
pub fn fir_kernels(oversampling: usize, bins: usize) -> Vec<Vec<f64>> {
    (0..bins)
        .map(|j| {
            let mut kernel = vec![0.0; j * oversampling];
            kernel.extend(std::iter::repeat(1.0).take(oversampling));
            kernel
        })
        .collect()
}

/// Unit-scale gamma density with shape `a`.
fn gamma_pdf(x: f64, a: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    ((a - 1.0) * x.ln() - x - ln_gamma(a)).exp()
}

/// Regressor generator for a fixed frame grid and basis.
///
/// Kernels and the high-resolution grid are computed once and reused for
/// every event train, which is what the per-event deconvolution loop needs.
#[derive(Debug, Clone)]
pub struct RegressorGenerator {
    grid: FrameGrid,
    basis: Basis,
    /// Cumulative sums of each kernel.
    step_responses: Vec<Vec<f64>>,
    /// High-resolution sample times.
    hr_times: Vec<f64>,
}

impl RegressorGenerator {
    /// Prepare kernels for `grid` and `basis`.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive TR, an empty grid or a FIR basis
    /// with zero bins.
    pub fn new(grid: FrameGrid, basis: Basis) -> Result<Self> {
        if grid.tr.is_nan() || grid.tr <= 0.0 {
            return Err(Error::InvalidParameter {
                parameter: "tr",
                reason: format!("must be positive, got {}", grid.tr),
            });
        }
        if grid.n_timepoints == 0 {
            return Err(Error::InvalidParameter {
                parameter: "n_timepoints",
                reason: "frame grid is empty".into(),
            });
        }
        if basis.n_columns() == 0 {
            return Err(Error::InvalidParameter {
                parameter: "fir_bins",
                reason: "FIR basis needs at least one bin".into(),
            });
        }

        let kernels = match basis {
            Basis::Canonical => vec![glover_kernel(grid.tr, OVERSAMPLING)],
            Basis::Fir { bins } => fir_kernels(OVERSAMPLING, bins),
        };
        let step_responses = kernels
            .iter()
            .map(|k| {
                k.iter()
                    .scan(0.0, |acc, v| {
                        *acc += v;
                        Some(*acc)
                    })
                    .collect()
            })
            .collect();

        let stop = grid.n_timepoints as f64 * grid.tr;
        let n_hr = ((stop - MIN_ONSET) / grid.tr * OVERSAMPLING as f64) as usize + 1;
        let spacing = (stop - MIN_ONSET) / (n_hr - 1) as f64;
        let hr_times = (0..n_hr).map(|i| MIN_ONSET + i as f64 * spacing).collect();

        Ok(Self {
            grid,
            basis,
            step_responses,
            hr_times,
        })
    }

    /// The frame grid regressors are sampled on.
    pub fn grid(&self) -> FrameGrid {
        self.grid
    }

    /// The response basis.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Convolve an event train with the basis.
    ///
    /// # Returns
    ///
    /// An `n_timepoints x basis.n_columns()` matrix. An empty train yields
    /// zero columns of the right shape.
    pub fn regressor(&self, events: &[Event]) -> Matrix {
        let impulses = self.impulse_train(events);
        let n_hr = self.hr_times.len();
        let start = self.hr_times[0];
        let spacing = self.hr_times[1] - self.hr_times[0];

        let mut out = Matrix::zeros(self.grid.n_timepoints, self.step_responses.len());
        for (frame, t) in self.grid.frame_times().into_iter().enumerate() {
            let pos = (t - start) / spacing;
            let i0 = (pos.floor() as usize).min(n_hr - 1);
            let frac = pos - i0 as f64;

            for (col, step) in self.step_responses.iter().enumerate() {
                let lo = convolved_at(&impulses, step, i0);
                let value = if i0 + 1 < n_hr && frac > 0.0 {
                    let hi = convolved_at(&impulses, step, i0 + 1);
                    lo + (hi - lo) * frac
                } else {
                    lo
                };
                out[(frame, col)] = value;
            }
        }
        out
    }

    /// Signed impulses whose running sum is the boxcar of `events`.
    fn impulse_train(&self, events: &[Event]) -> Vec<(usize, f64)> {
        let tmax = self.hr_times.len();
        let search = |x: f64| self.hr_times.partition_point(|&t| t < x).min(tmax - 1);

        let mut impulses = Vec::with_capacity(events.len() * 2);
        for ev in events {
            let on = search(ev.onset);
            let mut off = search(ev.onset + ev.duration);
            // Zero-duration events last one high-resolution sample
            if off < tmax - 1 && off == on {
                off += 1;
            }
            impulses.push((on, ev.amplitude));
            impulses.push((off, -ev.amplitude));
        }
        impulses
    }
}

/// Value of `step-response * impulses` at high-resolution sample `i`.
fn convolved_at(impulses: &[(usize, f64)], step: &[f64], i: usize) -> f64 {
    let last = step.len() - 1;
    impulses
        .iter()
        .filter(|(at, _)| *at <= i)
        .map(|(at, amp)| amp * step[(i - at).min(last)])
        .sum()
}

/// Build the regressor(s) for one event train.
///
/// Convenience wrapper that prepares a [`RegressorGenerator`] for a single
/// call.
pub fn compute_regressor(events: &[Event], grid: FrameGrid, basis: Basis) -> Result<Matrix> {
    Ok(RegressorGenerator::new(grid, basis)?.regressor(events))
}
