//! Error types for driving engine instances.

use cosim_core::CoreError;
use cosim_env::{EngineError, EngineStatus};
use thiserror::Error;

/// Errors raised while configuring, stepping or validating an instance.
///
/// Validation mismatches are not errors; they are reported through
/// [`cosim_core::CheckpointReport`] and recorded as failed steps.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Loading, catalog or coercion failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The engine refused to describe itself or to create an instance
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A typed write was rejected by the engine
    #[error("Write of '{variable}' failed with status {status}")]
    Write {
        variable: String,
        status: EngineStatus,
    },

    /// `do_step` returned false
    #[error("Step {step} at t={time} failed with status {status}")]
    StepFailure {
        step: usize,
        time: f64,
        status: EngineStatus,
    },

    /// A call that the instance's lifecycle state does not allow
    #[error("Lifecycle violation on '{instance}': {message}")]
    Lifecycle { instance: String, message: String },

    /// A run stopped early; carries where it stopped
    #[error("Run {run} aborted at step {step} (t={time}): {source}")]
    Aborted {
        run: usize,
        step: usize,
        time: f64,
        source: Box<DriverError>,
    },

    /// Invalid runner or strategy setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriverError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wraps `self` with the run/step context it occurred in.
    pub fn aborted(self, run: usize, step: usize, time: f64) -> Self {
        Self::Aborted {
            run,
            step,
            time,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through [`DriverError::Aborted`].
    pub fn root(&self) -> &DriverError {
        match self {
            DriverError::Aborted { source, .. } => source.root(),
            other => other,
        }
    }
}
