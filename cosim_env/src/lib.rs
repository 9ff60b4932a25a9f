//! Co-Simulation Engine Abstraction Layer
//!
//! This crate defines the narrow contract through which the conformance
//! driver talks to a time-stepped co-simulation component (an FMU-style
//! engine), so the same driver runs against a native binding in production
//! and an in-process double in tests.
//!
//! # Core Concept: Opaque Engine
//!
//! The driver never looks inside the engine. Everything it knows comes from:
//! - The engine's self-description (`describe_variables()`)
//! - Typed reads and writes by value reference
//! - Boolean lifecycle results plus `last_status()`
//!
//! # Example
//!
//! ```ignore
//! use cosim_env::{CoSimEngine, SimulationInstance};
//!
//! fn smoke<E: CoSimEngine>(engine: &E) -> Result<bool, cosim_env::EngineError> {
//!     let mut instance = engine.instantiate(Some("smoke"))?;
//!     instance.setup_experiment(0.0, None, None);
//!     instance.enter_initialization_mode();
//!     instance.exit_initialization_mode();
//!     let ok = instance.do_step(0.0, 0.5);
//!     instance.terminate();
//!     instance.dispose()?;
//!     Ok(ok)
//! }
//! ```

mod engine;
mod error;
mod types;

pub use engine::{CoSimEngine, SimulationInstance};
pub use error::EngineError;
pub use types::{
    Causality, EngineStatus, ValueReference, Variability, VariableDescription, VariableType,
};
