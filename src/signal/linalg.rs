//! Least squares and column standardization on dense matrices.

use nalgebra::SVD;

use crate::error::{Error, Result};
use crate::types::Matrix;

/// Solve `design · beta ≈ data` in the least-squares sense.
///
/// Uses the SVD so that rank-deficient designs (e.g. an all-zero confound
/// column) yield the minimum-norm solution instead of failing. Singular
/// values below `max(sv) · max(rows, cols) · ε` are treated as zero.
///
/// # Returns
///
/// A `design.ncols() x data.ncols()` coefficient matrix.
pub fn lstsq(design: &Matrix, data: &Matrix) -> Result<Matrix> {
    if design.nrows() != data.nrows() {
        return Err(Error::ShapeMismatch {
            context: "least squares rows",
            expected: design.nrows(),
            got: data.nrows(),
        });
    }

    let svd = SVD::new(design.clone(), true, true);
    let max_sv = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let eps = max_sv * design.nrows().max(design.ncols()) as f64 * f64::EPSILON;

    svd.solve(data, eps).map_err(|reason| Error::InvalidParameter {
        parameter: "design",
        reason: reason.to_string(),
    })
}

/// Subtract each column's mean in place.
pub fn demean_columns(matrix: &mut Matrix) {
    for mut column in matrix.column_iter_mut() {
        let mean = column.mean();
        column.add_scalar_mut(-mean);
    }
}

/// Z-score each column in place (population standard deviation).
///
/// A column with zero variance carries no information across samples and is
/// set to zero rather than NaN.
pub fn zscore_columns(matrix: &mut Matrix) {
    let n = matrix.nrows();
    if n == 0 {
        return;
    }

    for mut column in matrix.column_iter_mut() {
        let mean = column.mean();
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let sd = var.sqrt();
        if sd > 0.0 && sd.is_finite() {
            column.apply(|v| *v = (*v - mean) / sd);
        } else {
            column.fill(0.0);
        }
    }
}

/// Residuals of `data` after regressing out `confounds` column by column.
pub fn residualize(data: &Matrix, confounds: &Matrix) -> Result<Matrix> {
    let beta = lstsq(confounds, data)?;
    Ok(data - confounds * beta)
}

/// Stack matrices with equal column counts on top of each other.
pub fn stack_rows(blocks: &[Matrix], ncols: usize) -> Result<Matrix> {
    let nrows = blocks.iter().map(|b| b.nrows()).sum();
    let mut out = Matrix::zeros(nrows, ncols);
    let mut row = 0;
    for block in blocks {
        if block.ncols() != ncols {
            return Err(Error::ShapeMismatch {
                context: "stacked columns",
                expected: ncols,
                got: block.ncols(),
            });
        }
        out.rows_mut(row, block.nrows()).copy_from(block);
        row += block.nrows();
    }
    Ok(out)
}

/// Mean of every column.
pub fn column_means(matrix: &Matrix) -> Vec<f64> {
    matrix.column_iter().map(|c| c.mean()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lstsq_exact_fit() {
        let design = Matrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let data = Matrix::from_column_slice(4, 1, &[1.0, 3.0, 5.0, 7.0]);
        let beta = lstsq(&design, &data).unwrap();
        assert!((beta[(0, 0)] - 1.0).abs() < 1e-10);
        assert!((beta[(1, 0)] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_lstsq_rank_deficient_is_min_norm() {
        // Second column is all zeros: its coefficient must be zero
        let design = Matrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let data = Matrix::from_column_slice(3, 1, &[2.0, 4.0, 6.0]);
        let beta = lstsq(&design, &data).unwrap();
        assert!((beta[(0, 0)] - 2.0).abs() < 1e-10);
        assert!(beta[(1, 0)].abs() < 1e-10);
    }

    #[test]
    fn test_lstsq_shape_mismatch() {
        let design = Matrix::zeros(3, 1);
        let data = Matrix::zeros(4, 1);
        assert!(matches!(
            lstsq(&design, &data),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_demean() {
        let mut m = Matrix::from_row_slice(3, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 60.0]);
        demean_columns(&mut m);
        for mean in column_means(&m) {
            assert!(mean.abs() < 1e-12);
        }
    }

    #[test]
    fn test_zscore_constant_column_is_zero() {
        let mut m = Matrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        zscore_columns(&mut m);
        let expected = 1.0 / (2.0_f64 / 3.0).sqrt();
        assert!((m[(0, 0)] + expected).abs() < 1e-12);
        assert!((m[(2, 0)] - expected).abs() < 1e-12);
        assert!(m.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_residualize_removes_confound() {
        let confound = Matrix::from_column_slice(4, 1, &[-1.5, -0.5, 0.5, 1.5]);
        let data = Matrix::from_column_slice(4, 1, &[-3.0, -1.0, 1.0, 3.0]);
        let resid = residualize(&data, &confound).unwrap();
        assert!(resid.iter().all(|v| v.abs() < 1e-10));
    }
}
