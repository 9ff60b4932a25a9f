//! Error types for the engine contract boundary.

use thiserror::Error;

/// Errors that can occur while talking to a co-simulation engine.
///
/// Step, write and read failures are not errors at this layer: the engine
/// reports them through `bool` returns and [`crate::EngineStatus`], and the
/// driver decides what to do with them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not create a new instance
    #[error("Instantiation failed: {0}")]
    InstantiationFailed(String),

    /// The engine's self-description could not be produced or is malformed
    #[error("Model description error: {0}")]
    Description(String),

    /// Native resources could not be released
    #[error("Resource release failed: {0}")]
    Release(String),
}

impl EngineError {
    /// Creates an instantiation error.
    pub fn instantiation(msg: impl Into<String>) -> Self {
        Self::InstantiationFailed(msg.into())
    }

    /// Creates a description error.
    pub fn description(msg: impl Into<String>) -> Self {
        Self::Description(msg.into())
    }

    /// Creates a release error.
    pub fn release(msg: impl Into<String>) -> Self {
        Self::Release(msg.into())
    }
}
