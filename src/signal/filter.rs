//! FSL-style Gaussian running-line high-pass filter.
//!
//! The filter estimates the low-frequency component at every time point by a
//! Gaussian-weighted linear fit over the whole series and subtracts it. The
//! operation is linear, so it is represented as an `n x n` matrix `F` that is
//! applied identically to the data and to each design matrix.

use nalgebra::Matrix2;

use crate::error::{Error, Result};
use crate::types::Matrix;

/// Build the high-pass filter matrix `F = I - H`.
///
/// # Arguments
///
/// * `n_timepoints` - Length of the series
/// * `cutoff` - Filter cutoff in seconds
/// * `tr` - Sampling interval in seconds
///
/// # Algorithm
///
/// With `σ² = (cutoff / tr)² / 2` (in frames) the weight of frame `j` in the
/// fit centered on frame `k` is `w = exp(-(j - k)² / (2σ²))`. Row `k` of the
/// hat matrix `H` is row `k` of `X · pinv(W X) · W` for `X = [1, j]`, which
/// gives `H[k, j] = w_j² · x_kᵀ (Σ w² x xᵀ)⁻¹ x_j`.
pub fn highpass_matrix(n_timepoints: usize, cutoff: f64, tr: f64) -> Result<Matrix> {
    if cutoff.is_nan() || cutoff <= 0.0 || tr.is_nan() || tr <= 0.0 {
        return Err(Error::InvalidParameter {
            parameter: "hpf_cutoff",
            reason: format!("cutoff ({cutoff}) and tr ({tr}) must be positive"),
        });
    }

    let n = n_timepoints;
    let sig2n = (cutoff / tr).powi(2) / 2.0;
    let kernel: Vec<f64> = (0..n)
        .map(|d| (-((d * d) as f64) / (2.0 * sig2n)).exp())
        .collect();

    let mut filter = Matrix::identity(n, n);
    for k in 0..n {
        // Squared weights of the running-line fit centered on k
        let w2: Vec<f64> = (0..n).map(|j| kernel[j.abs_diff(k)].powi(2)).collect();

        let mut gram = Matrix2::<f64>::zeros();
        for (j, &w) in w2.iter().enumerate() {
            let t = j as f64;
            gram[(0, 0)] += w;
            gram[(0, 1)] += w * t;
            gram[(1, 1)] += w * t * t;
        }
        gram[(1, 0)] = gram[(0, 1)];

        // Degenerate only for n == 1, where the constant fit alone applies
        let inv = gram.try_inverse().unwrap_or_else(|| {
            let mut m = Matrix2::<f64>::zeros();
            m[(0, 0)] = 1.0 / gram[(0, 0)];
            m
        });

        let xk = [1.0, k as f64];
        let row = [
            xk[0] * inv[(0, 0)] + xk[1] * inv[(1, 0)],
            xk[0] * inv[(0, 1)] + xk[1] * inv[(1, 1)],
        ];
        for (j, &w) in w2.iter().enumerate() {
            filter[(k, j)] -= w * (row[0] + row[1] * j as f64);
        }
    }

    Ok(filter)
}
