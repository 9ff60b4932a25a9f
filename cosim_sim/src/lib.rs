//! CoSim Conformance Harness
//!
//! This crate drives an engine that implements the `cosim_env` contract
//! through input series, steps it, and checks its outputs against expected
//! checkpoints under several execution strategies.
//!
//! # Core Principle: Guarded Instances
//!
//! Every engine instance is owned by exactly one strategy and wrapped in a
//! [`ManagedInstance`], so it is terminated and disposed exactly once on
//! every exit path, including errors and panics.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      StrategyRunner                       │
//! │  schedule ◄── StepScheduler ◄── InputTimeSeries           │
//! │       │                                                   │
//! │  ┌────▼───────────────┐      ┌─────────────────────────┐  │
//! │  │  shared step loop  │─────►│    SimulationDriver     │  │
//! │  │ (per strategy)     │      │ write / step / compare  │  │
//! │  └────────────────────┘      └───────────┬─────────────┘  │
//! │                                          │                │
//! │                              ┌───────────▼─────────────┐  │
//! │                              │ ManagedInstance<engine> │  │
//! │                              └─────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cosim_sim::{load_catalog, ExecutionStrategy, LoopbackEngine, LoopbackModel, StrategyRunner};
//!
//! let engine = LoopbackEngine::new(LoopbackModel::from_path("model.json")?)?;
//! let catalog = Arc::new(load_catalog(&engine)?);
//! let inputs = InputTimeSeries::from_path("inputs.csv")?;
//! let expected = ExpectedOutputTimeSeries::from_path("expected.csv", &catalog)?;
//!
//! let runner = StrategyRunner::new(engine, catalog, inputs, expected).with_runs(5);
//! let report = runner.run(ExecutionStrategy::FreshInstancePerRun)?;
//! assert!(report.passed());
//! ```

mod config;
mod driver;
mod error;
mod exporter;
mod instance;
mod loopback;
mod runner;
pub mod strategy;

pub use config::DriverConfig;
pub use driver::{load_catalog, read_value, write_value, ParameterReport, SimulationDriver, StepOutcome};
pub use error::DriverError;
pub use exporter::{ConformanceExport, StrategyFailure};
pub use instance::{LifecycleState, ManagedInstance};
pub use loopback::{
    CallLog, EngineCall, FaultPlan, LoopbackEngine, LoopbackInstance, LoopbackModel, Route, StepFault,
};
pub use runner::{StrategyReport, StrategyRunner};
pub use strategy::ExecutionStrategy;
