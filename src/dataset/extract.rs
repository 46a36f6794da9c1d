//! Frame sampling of one run's ROI time series at event onsets.

use ndarray::Array4;

use super::source::{condition_names, RoiMask};
use crate::error::{Error, Result};
use crate::signal::{upsample_cubic, zscore_columns};
use crate::types::{EventSpec, Matrix};

/// Offsets (on the possibly upsampled grid) at which each event is sampled.
///
/// Without upsampling these are the requested frames. With factor `u` the
/// span `[min, max + 1)` of the requested frames is divided into
/// `len · u` evenly spaced offsets starting at `min · u`, truncated toward
/// zero.
pub fn sampling_offsets(frames: &[i64], upsample: Option<usize>) -> Vec<i64> {
    let Some(factor) = upsample else {
        return frames.to_vec();
    };
    let (Some(&min), Some(&max)) = (frames.iter().min(), frames.iter().max()) else {
        return Vec::new();
    };

    let n = frames.len() * factor;
    let start = (min * factor as i64) as f64;
    let stop = ((max + 1) * factor as i64) as f64;
    let step = (stop - start) / n as f64;
    (0..n).map(|i| (start + i as f64 * step) as i64).collect()
}

/// Sample a masked run at frames relative to each event onset.
///
/// # Arguments
///
/// * `events` - Rows of one run
/// * `timeseries` - 4D series `(x, y, z, t)`
/// * `mask` - Validated ROI
/// * `tr` - Acquisition TR in seconds
/// * `frames` - Offsets in TRs relative to each onset
/// * `upsample` - Optional cubic-spline upsampling factor
/// * `event_names` - Label order; sorted unique conditions when `None`
///
/// # Returns
///
/// One `events x voxels` matrix per sampling offset, each feature z-scored
/// across events, and the integer label of every event.
pub fn extract_dataset(
    events: &[EventSpec],
    timeseries: &Array4<f64>,
    mask: &RoiMask,
    tr: f64,
    frames: &[i64],
    upsample: Option<usize>,
    event_names: Option<&[String]>,
) -> Result<(Vec<Matrix>, Vec<usize>)> {
    if tr.is_nan() || tr <= 0.0 {
        return Err(Error::InvalidParameter {
            parameter: "tr",
            reason: format!("must be positive, got {tr}"),
        });
    }

    let names = match event_names {
        Some(names) => names.to_vec(),
        None => condition_names(events),
    };
    let y = events
        .iter()
        .map(|e| {
            names
                .iter()
                .position(|n| *n == e.condition)
                .ok_or_else(|| Error::UnknownCondition {
                    condition: e.condition.clone(),
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut roi = mask.sample(timeseries)?;
    let factor = upsample.unwrap_or(1);
    if factor != 1 {
        roi = upsample_cubic(&roi, factor)?;
    }

    let onsets: Vec<i64> = events
        .iter()
        .map(|e| (e.onset / tr).floor() as i64 * factor as i64)
        .collect();

    let mut x = Vec::new();
    for offset in sampling_offsets(frames, upsample) {
        let mut frame = Matrix::zeros(events.len(), roi.ncols());
        for (row, &onset) in onsets.iter().enumerate() {
            let index = onset + offset;
            if index < 0 || index as usize >= roi.nrows() {
                return Err(Error::FrameOutOfRange {
                    index,
                    len: roi.nrows(),
                });
            }
            frame.row_mut(row).copy_from(&roi.row(index as usize));
        }
        zscore_columns(&mut frame);
        x.push(frame);
    }

    Ok((x, y))
}
