//! Numerical building blocks shared by deconvolution and dataset extraction.
//!
//! - Minimum-norm least squares and column standardization
//! - FSL-style high-pass filter matrix
//! - Not-a-knot cubic-spline upsampling

mod filter;
mod interpolate;
mod linalg;

pub use filter::highpass_matrix;
pub use interpolate::upsample_cubic;
pub use linalg::{column_means, demean_columns, lstsq, residualize, stack_rows, zscore_columns};
