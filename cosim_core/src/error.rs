//! Error types for catalog, coercion and data loading.

use cosim_env::VariableType;
use thiserror::Error;

/// Errors raised by the engine-independent parts of the driver.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed tabular or parameter input (missing header, missing time
    /// column, decreasing time, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The delimited-text reader rejected the input (ragged rows, bad UTF-8)
    #[error("Malformed tabular data: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model self-description cannot be turned into a catalog
    #[error("Model description error: {0}")]
    Description(String),

    /// A name has no entry in the variable catalog
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Text could not be coerced to the variable's declared type
    #[error("Invalid {expected} value for '{variable}': '{raw}'")]
    InvalidValueFormat {
        variable: String,
        expected: VariableType,
        raw: String,
    },

    /// A time series without rows cannot be scheduled
    #[error("Time series is empty")]
    EmptySeries,
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a description error.
    pub fn description(msg: impl Into<String>) -> Self {
        Self::Description(msg.into())
    }

    /// Creates an unknown-variable error.
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable(name.into())
    }
}
