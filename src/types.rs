//! Type aliases and common types.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense row-major-agnostic matrix used for designs, data and features.
pub type Matrix = DMatrix<f64>;

/// Dense column vector.
pub type Vector = DVector<f64>;

/// A single stimulus occurrence on the acquisition clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Onset in seconds from the start of the run.
    pub onset: f64,
    /// Duration in seconds (0 for an impulse).
    pub duration: f64,
    /// Regressor amplitude.
    pub amplitude: f64,
}

impl Event {
    /// Create an event from its (onset, duration, amplitude) triple.
    pub fn new(onset: f64, duration: f64, amplitude: f64) -> Self {
        Self {
            onset,
            duration,
            amplitude,
        }
    }

    /// Unit-amplitude impulse at `onset`.
    pub fn impulse(onset: f64) -> Self {
        Self::new(onset, 0.0, 1.0)
    }
}

fn default_amplitude() -> f64 {
    1.0
}

/// One row of an event table, as read from the experiment's event file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Acquisition run (zero based).
    pub run: usize,
    /// Condition label.
    pub condition: String,
    /// Onset in seconds.
    pub onset: f64,
    /// Duration in seconds (default 0).
    #[serde(default)]
    pub duration: f64,
    /// Regressor amplitude (default 1).
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    /// Extra numeric columns, e.g. reaction time, usable as confounds.
    #[serde(default)]
    pub covariates: BTreeMap<String, f64>,
}

impl EventSpec {
    /// An impulse of unit amplitude.
    pub fn new(run: usize, condition: impl Into<String>, onset: f64) -> Self {
        Self {
            run,
            condition: condition.into(),
            onset,
            duration: 0.0,
            amplitude: default_amplitude(),
            covariates: BTreeMap::new(),
        }
    }

    /// Set the duration.
    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Set the amplitude.
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Attach a covariate value.
    pub fn covariate(mut self, name: impl Into<String>, value: f64) -> Self {
        self.covariates.insert(name.into(), value);
        self
    }

    /// The timing triple of this event.
    pub fn event(&self) -> Event {
        Event::new(self.onset, self.duration, self.amplitude)
    }
}

/// A parameter given once for a whole group or once per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PerItem<T> {
    /// The same value for every item.
    All(T),
    /// One value per item, in item order.
    Each(Vec<T>),
}

impl<T> PerItem<T> {
    /// Value for item `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        match self {
            PerItem::All(value) => Some(value),
            PerItem::Each(values) => values.get(index),
        }
    }

    /// Check that a per-item list covers exactly `n_items`.
    pub fn check_len(&self, n_items: usize) -> Result<()> {
        match self {
            PerItem::Each(values) if values.len() != n_items => Err(Error::ShapeMismatch {
                context: "per-item parameter",
                expected: n_items,
                got: values.len(),
            }),
            _ => Ok(()),
        }
    }
}
