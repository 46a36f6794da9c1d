//! Inputs of dataset extraction: ROI masks, event tables and the subject
//! data source.

use std::fs;
use std::path::PathBuf;

use ndarray::{Array3, Array4, Axis};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{EventSpec, Matrix};

/// A validated boolean region-of-interest mask.
///
/// Selected voxels are kept in C order (x slowest, z fastest), which fixes
/// the feature order of every extracted dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiMask {
    shape: [usize; 3],
    voxels: Vec<[usize; 3]>,
}

impl RoiMask {
    /// Validate a raw mask volume.
    ///
    /// # Errors
    ///
    /// Every voxel must be exactly 0 or 1; anything else (including NaN) is
    /// [`Error::NonBooleanMask`].
    pub fn from_volume(volume: &Array3<f64>) -> Result<Self> {
        let mut voxels = Vec::new();
        for ((x, y, z), &value) in volume.indexed_iter() {
            if value == 1.0 {
                voxels.push([x, y, z]);
            } else if value != 0.0 {
                return Err(Error::NonBooleanMask {
                    value,
                    voxel: [x, y, z],
                });
            }
        }
        let (nx, ny, nz) = volume.dim();
        Ok(Self {
            shape: [nx, ny, nz],
            voxels,
        })
    }

    /// Volume dimensions.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Number of selected voxels.
    pub fn n_voxels(&self) -> usize {
        self.voxels.len()
    }

    /// Selected voxel coordinates in feature order.
    pub fn voxels(&self) -> &[[usize; 3]] {
        &self.voxels
    }

    /// Pull the masked voxels out of a 4D series as `time x voxels`.
    pub fn sample(&self, timeseries: &Array4<f64>) -> Result<Matrix> {
        let (nx, ny, nz, nt) = timeseries.dim();
        for (axis, (&expected, got)) in self.shape.iter().zip([nx, ny, nz]).enumerate() {
            if expected != got {
                return Err(Error::ShapeMismatch {
                    context: ["time series x", "time series y", "time series z"][axis],
                    expected,
                    got,
                });
            }
        }

        let mut out = Matrix::zeros(nt, self.voxels.len());
        for (feature, &[x, y, z]) in self.voxels.iter().enumerate() {
            let series = timeseries.index_axis(Axis(0), x);
            for t in 0..nt {
                out[(t, feature)] = series[[y, z, t]];
            }
        }
        Ok(out)
    }
}

/// Every event of one subject and problem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    rows: Vec<EventSpec>,
}

impl EventTable {
    /// Wrap event rows in file order.
    pub fn new(rows: Vec<EventSpec>) -> Self {
        Self { rows }
    }

    /// Read a JSON array of event rows.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::new(serde_json::from_str(&text)?))
    }

    /// Rows in file order.
    pub fn rows(&self) -> &[EventSpec] {
        &self.rows
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct run ids, ascending.
    pub fn runs(&self) -> Vec<usize> {
        let mut runs: Vec<usize> = self.rows.iter().map(|r| r.run).collect();
        runs.sort_unstable();
        runs.dedup();
        runs
    }

    /// Rows of one run, in file order.
    pub fn run_rows(&self, run: usize) -> Vec<EventSpec> {
        self.rows.iter().filter(|r| r.run == run).cloned().collect()
    }

    /// Rows grouped by run (ascending), file order within a run.
    pub fn grouped_rows(&self) -> Vec<EventSpec> {
        self.runs().into_iter().flat_map(|run| self.run_rows(run)).collect()
    }

    /// Distinct condition labels, sorted.
    pub fn condition_names(&self) -> Vec<String> {
        condition_names(&self.rows)
    }
}

/// Distinct condition labels of `rows`, sorted.
pub fn condition_names(rows: &[EventSpec]) -> Vec<String> {
    let mut names: Vec<String> = rows.iter().map(|r| r.condition.clone()).collect();
    names.sort();
    names.dedup();
    names
}

/// Covariate columns of `rows` as a `rows x names` matrix.
pub fn covariate_matrix(rows: &[EventSpec], names: &[String]) -> Result<Matrix> {
    let mut out = Matrix::zeros(rows.len(), names.len());
    for (i, row) in rows.iter().enumerate() {
        for (j, name) in names.iter().enumerate() {
            out[(i, j)] = *row
                .covariates
                .get(name)
                .ok_or_else(|| Error::MissingCovariate {
                    column: name.clone(),
                })?;
        }
    }
    Ok(out)
}

/// Conventional locations of a subject's inputs and results.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    config: Config,
    experiment: String,
}

impl Layout {
    /// Layout for `experiment`, or the project default.
    pub fn new(config: Config, experiment: Option<&str>) -> Self {
        let experiment = config.experiment(experiment).to_string();
        Self { config, experiment }
    }

    /// Project configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Experiment name.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Acquisition TR in seconds.
    pub fn tr(&self) -> f64 {
        self.config.acquisition_tr
    }

    /// Mask volume path.
    pub fn mask_path(&self, subject: &str, mask_name: &str) -> PathBuf {
        self.config.mask_path(subject, mask_name)
    }

    /// Event table path.
    pub fn events_path(&self, subject: &str, problem: &str) -> PathBuf {
        self.config.events_path(subject, problem)
    }

    /// Time series path of a zero-based run.
    pub fn timeseries_path(&self, subject: &str, run: usize) -> PathBuf {
        self.config.timeseries_path(&self.experiment, subject, run)
    }

    /// Directory holding the per-run time series directories.
    pub fn timeseries_dir(&self, subject: &str) -> PathBuf {
        self.config
            .analysis_dir
            .join(&self.experiment)
            .join(subject)
            .join("reg")
            .join("epi")
            .join("unsmoothed")
    }

    /// Cache directory for one subject, problem and ROI.
    pub fn results_dir(&self, subject: &str, problem: &str, roi: &str) -> PathBuf {
        self.config.results_dir(&self.experiment, subject, problem, roi)
    }
}

/// Where subject data comes from.
///
/// Paths are used for provenance timestamps; the loaders decode whatever
/// on-disk formats the project uses.
pub trait SubjectSource: Sync {
    /// Path conventions of the project.
    fn layout(&self) -> &Layout;

    /// Raw mask volume.
    fn load_mask(&self, subject: &str, mask_name: &str) -> Result<Array3<f64>>;

    /// Event table of a problem.
    fn load_events(&self, subject: &str, problem: &str) -> Result<EventTable>;

    /// 4D time series `(x, y, z, t)` of a zero-based run.
    fn load_timeseries(&self, subject: &str, run: usize) -> Result<Array4<f64>>;

    /// Number of acquired runs: the `run_*` directories of the subject.
    fn n_runs(&self, subject: &str) -> Result<usize> {
        let dir = self.layout().timeseries_dir(subject);
        let entries = fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            if entry.file_name().to_string_lossy().starts_with("run_") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_selects_c_order() {
        let mut volume = Array3::<f64>::zeros((2, 2, 2));
        volume[[1, 0, 1]] = 1.0;
        volume[[0, 1, 0]] = 1.0;
        let mask = RoiMask::from_volume(&volume).unwrap();
        assert_eq!(mask.voxels(), &[[0, 1, 0], [1, 0, 1]]);
        assert_eq!(mask.n_voxels(), 2);
    }

    #[test]
    fn test_non_boolean_mask_rejected() {
        let mut volume = Array3::<f64>::zeros((2, 2, 2));
        volume[[0, 0, 1]] = 0.5;
        let err = RoiMask::from_volume(&volume).unwrap_err();
        assert!(matches!(
            err,
            Error::NonBooleanMask { voxel: [0, 0, 1], .. }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sample_extracts_series() {
        let mut volume = Array3::<f64>::zeros((2, 1, 1));
        volume[[1, 0, 0]] = 1.0;
        let mask = RoiMask::from_volume(&volume).unwrap();
        let ts = Array4::from_shape_fn((2, 1, 1, 3), |(x, _, _, t)| (10 * x + t) as f64);
        let sampled = mask.sample(&ts).unwrap();
        assert_eq!(sampled, Matrix::from_column_slice(3, 1, &[10.0, 11.0, 12.0]));

        let wrong = Array4::<f64>::zeros((3, 1, 1, 3));
        assert!(mask.sample(&wrong).is_err());
    }

    #[test]
    fn test_event_table_grouping() {
        let table = EventTable::new(vec![
            EventSpec::new(1, "b", 4.0),
            EventSpec::new(0, "a", 2.0),
            EventSpec::new(1, "a", 0.0),
            EventSpec::new(0, "b", 6.0),
        ]);
        assert_eq!(table.runs(), vec![0, 1]);
        assert_eq!(table.condition_names(), vec!["a", "b"]);
        let onsets: Vec<f64> = table.grouped_rows().iter().map(|r| r.onset).collect();
        assert_eq!(onsets, vec![2.0, 6.0, 4.0, 0.0]);
    }

    #[test]
    fn test_missing_covariate() {
        let rows = vec![EventSpec::new(0, "a", 0.0).covariate("rt", 0.4)];
        let m = covariate_matrix(&rows, &["rt".to_string()]).unwrap();
        assert_eq!(m[(0, 0)], 0.4);
        assert!(matches!(
            covariate_matrix(&rows, &["acc".to_string()]),
            Err(Error::MissingCovariate { .. })
        ));
    }

    #[test]
    fn test_layout_counts_runs() {
        struct Dirs(Layout);
        impl SubjectSource for Dirs {
            fn layout(&self) -> &Layout {
                &self.0
            }
            fn load_mask(&self, _: &str, _: &str) -> Result<Array3<f64>> {
                unimplemented!()
            }
            fn load_events(&self, _: &str, _: &str) -> Result<EventTable> {
                unimplemented!()
            }
            fn load_timeseries(&self, _: &str, _: usize) -> Result<Array4<f64>> {
                unimplemented!()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("data"), dir.path().join("analysis"), "exp");
        let source = Dirs(Layout::new(config, None));
        for run in 0..3 {
            let path = source.layout().timeseries_path("s1", run);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
        }
        assert_eq!(source.n_runs("s1").unwrap(), 3);
    }
}
