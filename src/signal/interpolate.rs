//! Cubic-spline upsampling of uniformly sampled series.

use nalgebra::LU;

use crate::error::{Error, Result};
use crate::types::Matrix;

/// Upsample every column of `series` by an integer factor.
///
/// Each column is interpolated with a not-a-knot cubic spline through the
/// original samples (spacing 1) and evaluated on a grid of spacing
/// `1 / factor`, so output row `r` corresponds to original time `r / factor`.
/// Rows that coincide with original samples reproduce them exactly. The grid
/// covers the whole last TR: rows past the final knot extend the last spline
/// segment.
///
/// # Returns
///
/// An `(n · factor) x ncols` matrix.
///
/// # Errors
///
/// Fewer than four time points cannot define a not-a-knot cubic.
pub fn upsample_cubic(series: &Matrix, factor: usize) -> Result<Matrix> {
    if factor == 0 {
        return Err(Error::InvalidParameter {
            parameter: "upsample",
            reason: "factor must be at least 1".into(),
        });
    }
    if factor == 1 {
        return Ok(series.clone());
    }

    let n = series.nrows();
    if n < 4 {
        return Err(Error::TooFewTimepoints { got: n });
    }

    let m = second_derivatives(series)?;
    let n_out = n * factor;
    let mut out = Matrix::zeros(n_out, series.ncols());

    for r in 0..n_out {
        let i = (r / factor).min(n - 2);
        let t = (r - i * factor) as f64 / factor as f64;
        let u = 1.0 - t;
        for c in 0..series.ncols() {
            let (y0, y1) = (series[(i, c)], series[(i + 1, c)]);
            let (m0, m1) = (m[(i, c)], m[(i + 1, c)]);
            out[(r, c)] = (m0 * u.powi(3) + m1 * t.powi(3)) / 6.0
                + (y0 - m0 / 6.0) * u
                + (y1 - m1 / 6.0) * t;
        }
    }

    Ok(out)
}

/// Solve for the spline second derivatives at every knot.
///
/// Interior rows are the usual continuity equations
/// `M[i-1] + 4 M[i] + M[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1])`; the first and
/// last rows force a continuous third derivative at the second and
/// second-to-last knots (not-a-knot). The system is shared by all columns and
/// factored once.
fn second_derivatives(series: &Matrix) -> Result<Matrix> {
    let n = series.nrows();
    let mut system = Matrix::zeros(n, n);
    let mut rhs = Matrix::zeros(n, series.ncols());

    system[(0, 0)] = 1.0;
    system[(0, 1)] = -2.0;
    system[(0, 2)] = 1.0;
    system[(n - 1, n - 3)] = 1.0;
    system[(n - 1, n - 2)] = -2.0;
    system[(n - 1, n - 1)] = 1.0;

    for i in 1..n - 1 {
        system[(i, i - 1)] = 1.0;
        system[(i, i)] = 4.0;
        system[(i, i + 1)] = 1.0;
        for c in 0..series.ncols() {
            rhs[(i, c)] = 6.0 * (series[(i + 1, c)] - 2.0 * series[(i, c)] + series[(i - 1, c)]);
        }
    }

    LU::new(system)
        .solve(&rhs)
        .ok_or_else(|| Error::InvalidParameter {
            parameter: "upsample",
            reason: "spline system is singular".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_length() {
        let series = Matrix::from_fn(10, 3, |i, j| (i + j) as f64);
        let up = upsample_cubic(&series, 4).unwrap();
        assert_eq!(up.nrows(), 40);
        assert_eq!(up.ncols(), 3);
    }

    #[test]
    fn test_knots_are_preserved() {
        let series = Matrix::from_fn(12, 2, |i, j| ((i * (j + 1)) as f64).sin());
        let up = upsample_cubic(&series, 3).unwrap();
        for i in 0..12 {
            for j in 0..2 {
                assert!((up[(i * 3, j)] - series[(i, j)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_reproduces_cubic_polynomial() {
        let f = |x: f64| 0.1 * x.powi(3) - x * x + 2.0 * x - 1.0;
        let series = Matrix::from_fn(8, 1, |i, _| f(i as f64));
        let up = upsample_cubic(&series, 5).unwrap();
        for r in 0..up.nrows() {
            let x = r as f64 / 5.0;
            assert!((up[(r, 0)] - f(x)).abs() < 1e-9, "mismatch at x={x}");
        }
    }

    #[test]
    fn test_tail_extends_last_segment() {
        // Linear data: the extrapolated tail continues the line
        let series = Matrix::from_fn(6, 1, |i, _| 2.0 * i as f64 + 1.0);
        let up = upsample_cubic(&series, 4).unwrap();
        assert_eq!(up.nrows(), 24);
        for r in 20..24 {
            let x = r as f64 / 4.0;
            assert!((up[(r, 0)] - (2.0 * x + 1.0)).abs() < 1e-9, "mismatch at x={x}");
        }
    }

    #[test]
    fn test_factor_one_is_identity() {
        let series = Matrix::from_fn(3, 1, |i, _| i as f64);
        assert_eq!(upsample_cubic(&series, 1).unwrap(), series);
    }

    #[test]
    fn test_too_few_points() {
        let series = Matrix::zeros(3, 1);
        assert!(matches!(
            upsample_cubic(&series, 2),
            Err(Error::TooFewTimepoints { got: 3 })
        ));
    }
}
