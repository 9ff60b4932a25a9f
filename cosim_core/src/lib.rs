//! CoSim Core - engine-independent logic of the conformance driver
//!
//! Everything here is pure data handling; nothing in this crate calls into
//! an engine:
//! 1. **Catalog**: the model's declared variables, indexed by name
//! 2. **Coercion**: text ⇄ [`TypedValue`] per declared type
//! 3. **Series**: input rows and typed expected-output checkpoints
//! 4. **Scheduling**: step sizes derived from input timestamps
//! 5. **Validation & aggregation**: checkpoint reports and multi-run summaries

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod parameters;
pub mod schedule;
pub mod series;
pub mod validation;
pub mod value;

// Re-export key types for convenience
pub use aggregate::{summarize, FailedRun, RunResult, RunSummary};
pub use catalog::{ModelVariable, VariableCatalog};
pub use error::CoreError;
pub use parameters::ParameterSet;
pub use schedule::{ScheduledStep, StepScheduler};
pub use series::{
    is_time_column, ExpectedOutputTimeSeries, ExpectedRow, ExpectedValue, InputTimeSeries,
    TimeSeriesRow, TIME_COLUMN,
};
pub use validation::{CheckpointReport, ColumnCheck};
pub use value::{coerce, TypedValue};
