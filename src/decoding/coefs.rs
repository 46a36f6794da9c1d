//! Learned model weights and their projection back into volume space.

use ndarray::Array4;
use tracing::{debug, info};

use super::decode::{decoder_fingerprint, results_key, results_store};
use crate::dataset::{Dataset, Layout, RoiMask};
use crate::error::{Error, Result};
use crate::model::Classifier;
use crate::result::ModelCoefficients;
use crate::types::Matrix;

/// Fit `model` on every sample of each single-frame dataset and keep its
/// learned weights, caching them next to the decoding results.
///
/// # Errors
///
/// - [`Error::MultiFrameDataset`] unless the dataset was collapsed to one frame.
/// - [`Error::MissingWeights`] if the fitted model exposes no weights.
pub fn model_coefs<M: Classifier + Clone>(
    layout: &Layout,
    datasets: &[Dataset],
    model: &M,
) -> Result<Vec<ModelCoefficients>> {
    let identity = model.identity();

    datasets
        .iter()
        .map(|dataset| {
            if dataset.n_frames() != 1 {
                return Err(Error::MultiFrameDataset {
                    frames: dataset.n_frames(),
                });
            }

            let key = format!("{}_coef", results_key(dataset, &identity, false, false, false, false));
            let hash = decoder_fingerprint(dataset, &identity, None, None, None);
            let store = results_store(layout, dataset);
            if let Some(coefs) = store.load::<ModelCoefficients>(&key, &hash) {
                debug!(subject = %dataset.subject, key = %key, "using cached coefficients");
                return Ok(coefs);
            }

            info!(subject = %dataset.subject, model = %identity, "fitting model on all samples");
            let mut fitted = model.clone();
            fitted.fit(&dataset.x[0], &dataset.y)?;
            let learned = fitted.learned_weights().ok_or_else(|| Error::MissingWeights {
                model: identity.clone(),
            })?;

            let coefs = ModelCoefficients {
                weights: learned.to_matrix()?,
                ensemble: learned.is_ensemble(),
                hash,
            };
            store.store(&key, &coefs, &coefs.hash)?;
            Ok(coefs)
        })
        .collect()
}

/// Place `rows x voxels` weights into an `x y z rows` volume, NaN outside
/// the mask.
pub fn unmask_weights(weights: &Matrix, mask: &RoiMask) -> Result<Array4<f64>> {
    if weights.ncols() != mask.n_voxels() {
        return Err(Error::ShapeMismatch {
            context: "weight features",
            expected: mask.n_voxels(),
            got: weights.ncols(),
        });
    }

    let [nx, ny, nz] = mask.shape();
    let mut volume = Array4::from_elem((nx, ny, nz, weights.nrows()), f64::NAN);
    for (feature, &[x, y, z]) in mask.voxels().iter().enumerate() {
        for row in 0..weights.nrows() {
            volume[[x, y, z, row]] = weights[(row, feature)];
        }
    }
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_unmask_places_weights() {
        let mut vol = Array3::zeros((2, 2, 1));
        vol[[0, 1, 0]] = 1.0;
        vol[[1, 0, 0]] = 1.0;
        let mask = RoiMask::from_volume(&vol).unwrap();

        let weights = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let out = unmask_weights(&weights, &mask).unwrap();
        assert_eq!(out.dim(), (2, 2, 1, 2));
        assert_eq!(out[[0, 1, 0, 0]], 1.0);
        assert_eq!(out[[1, 0, 0, 0]], 2.0);
        assert_eq!(out[[1, 0, 0, 1]], 4.0);
        assert!(out[[0, 0, 0, 0]].is_nan());
        assert!(out[[1, 1, 0, 1]].is_nan());
    }

    #[test]
    fn test_unmask_checks_width() {
        let mask = RoiMask::from_volume(&Array3::ones((1, 1, 2))).unwrap();
        assert!(unmask_weights(&Matrix::zeros(1, 3), &mask).is_err());
    }
}
