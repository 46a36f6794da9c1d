//! Project configuration and the conventional on-disk layout.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Project-level configuration passed explicitly to every cached operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the raw per-subject data (masks, event tables).
    pub data_dir: PathBuf,

    /// Root of the analysis hierarchy (time series, cached datasets, results).
    pub analysis_dir: PathBuf,

    /// Experiment used when a call does not name one.
    pub default_experiment: String,

    /// Acquisition repetition time in seconds (default: 2.0).
    #[serde(default = "default_tr")]
    pub acquisition_tr: f64,
}

fn default_tr() -> f64 {
    2.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            analysis_dir: PathBuf::from("analysis"),
            default_experiment: String::from("default"),
            acquisition_tr: default_tr(),
        }
    }
}

impl Config {
    /// Create a configuration rooted at the given directories.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        analysis_dir: impl Into<PathBuf>,
        default_experiment: impl Into<String>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            analysis_dir: analysis_dir.into(),
            default_experiment: default_experiment.into(),
            acquisition_tr: default_tr(),
        }
    }

    /// Set the acquisition TR.
    pub fn acquisition_tr(mut self, tr: f64) -> Self {
        self.acquisition_tr = tr;
        self
    }

    /// Read a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = serde_json::from_str(&text)?;
        if config.acquisition_tr.is_nan() || config.acquisition_tr <= 0.0 {
            return Err(Error::InvalidParameter {
                parameter: "acquisition_tr",
                reason: format!("must be positive, got {}", config.acquisition_tr),
            });
        }
        Ok(config)
    }

    /// Resolve an optional experiment name against the project default.
    pub fn experiment<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        name.unwrap_or(&self.default_experiment)
    }

    /// Directory holding the cached dataset and decoding results for one
    /// subject, problem and ROI.
    pub fn results_dir(&self, experiment: &str, subject: &str, problem: &str, roi: &str) -> PathBuf {
        self.analysis_dir
            .join(experiment)
            .join(subject)
            .join("mvpa")
            .join(problem)
            .join(roi)
    }

    /// Path of a subject's ROI mask volume.
    pub fn mask_path(&self, subject: &str, mask_name: &str) -> PathBuf {
        self.data_dir
            .join(subject)
            .join("masks")
            .join(format!("{mask_name}.nii.gz"))
    }

    /// Path of a subject's event table for a problem.
    pub fn events_path(&self, subject: &str, problem: &str) -> PathBuf {
        self.data_dir
            .join(subject)
            .join("events")
            .join(format!("{problem}.csv"))
    }

    /// Path of the time series for a zero-based run.
    pub fn timeseries_path(&self, experiment: &str, subject: &str, run: usize) -> PathBuf {
        self.analysis_dir
            .join(experiment)
            .join(subject)
            .join("reg")
            .join("epi")
            .join("unsmoothed")
            .join(format!("run_{}", run + 1))
            .join("timeseries_xfm.nii.gz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let config = Config::new("/data", "/analysis", "exp");
        assert_eq!(
            config.results_dir("exp", "s1", "faces", "ifs"),
            PathBuf::from("/analysis/exp/s1/mvpa/faces/ifs")
        );
        assert_eq!(
            config.timeseries_path("exp", "s1", 0),
            PathBuf::from("/analysis/exp/s1/reg/epi/unsmoothed/run_1/timeseries_xfm.nii.gz")
        );
        assert_eq!(
            config.mask_path("s1", "ifs"),
            PathBuf::from("/data/s1/masks/ifs.nii.gz")
        );
    }

    #[test]
    fn test_experiment_fallback() {
        let config = Config::new("/data", "/analysis", "exp");
        assert_eq!(config.experiment(None), "exp");
        assert_eq!(config.experiment(Some("other")), "other");
    }

    #[test]
    fn test_from_json_defaults_tr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        fs::write(
            &path,
            r#"{"data_dir": "/d", "analysis_dir": "/a", "default_experiment": "e"}"#,
        )
        .unwrap();
        let config = Config::from_json_file(&path).unwrap();
        assert!((config.acquisition_tr - 2.0).abs() < 1e-12);
        assert_eq!(config.default_experiment, "e");
    }

    #[test]
    fn test_from_json_rejects_bad_tr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        fs::write(
            &path,
            r#"{"data_dir": "/d", "analysis_dir": "/a", "default_experiment": "e", "acquisition_tr": 0}"#,
        )
        .unwrap();
        let err = Config::from_json_file(&path).unwrap_err();
        assert!(err.is_configuration());
    }
}
