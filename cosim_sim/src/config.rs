//! Configuration for conformance runs.

use serde::{Deserialize, Serialize};

/// Configuration for a strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Number of repeated runs for `fresh_instance_per_run`
    pub runs: usize,

    /// Experiment start time (None = time of the first input row)
    pub start_time: Option<f64>,

    /// Experiment stop time passed to the engine, if any
    pub stop_time: Option<f64>,

    /// Solver tolerance passed to the engine, if any
    pub tolerance: Option<f64>,

    /// Step size for a single-row input series
    pub fallback_step: f64,

    /// Steps executed by the first instance of `handover_run`
    /// (None = half of the schedule, rounded up)
    pub handover_split: Option<usize>,

    /// Prefix for instance names
    pub instance_name: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            start_time: None,
            stop_time: None,
            tolerance: None,
            fallback_step: 0.0,
            handover_split: None,
            instance_name: "cosim".to_string(),
        }
    }
}
