//! SimulationDriver - typed access to one engine instance.
//!
//! The driver turns catalog names and raw text into typed engine calls:
//! it configures an instance, writes a step's inputs, advances time and
//! compares live outputs with the expected checkpoints. It never decides
//! whether a failure aborts a run; the strategies do.

use crate::error::DriverError;
use crate::instance::ManagedInstance;
use cosim_core::{
    coerce, CheckpointReport, ColumnCheck, CoreError, ExpectedOutputTimeSeries, ExpectedRow,
    ModelVariable, ParameterSet, TimeSeriesRow, TypedValue, VariableCatalog,
};
use cosim_env::{Causality, CoSimEngine, EngineStatus, SimulationInstance, VariableType};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the variable catalog from an engine's self-description.
pub fn load_catalog<E: CoSimEngine>(engine: &E) -> Result<VariableCatalog, DriverError> {
    let descriptions = engine.describe_variables()?;
    Ok(VariableCatalog::build(descriptions)?)
}

/// What `initialize` did with the initial parameter values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParameterReport {
    /// Parameters written from the supplied values
    pub applied: Vec<String>,
    /// Writable parameters left at their declared default
    pub defaulted: Vec<String>,
    /// Supplied keys that name no writable parameter
    pub unmatched: Vec<String>,
}

/// Result of one `do_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub ok: bool,
    pub status: EngineStatus,
}

/// Typed driver over a shared catalog and expected outputs.
#[derive(Debug, Clone)]
pub struct SimulationDriver {
    catalog: Arc<VariableCatalog>,
    expected: Arc<ExpectedOutputTimeSeries>,
    stop_time: Option<f64>,
    tolerance: Option<f64>,
}

impl SimulationDriver {
    pub fn new(catalog: Arc<VariableCatalog>, expected: Arc<ExpectedOutputTimeSeries>) -> Self {
        Self {
            catalog,
            expected,
            stop_time: None,
            tolerance: None,
        }
    }

    /// Sets the stop time passed to `setup_experiment`.
    pub fn with_stop_time(mut self, stop_time: Option<f64>) -> Self {
        self.stop_time = stop_time;
        self
    }

    /// Sets the tolerance passed to `setup_experiment`.
    pub fn with_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    /// Sets up the experiment, applies initial parameter values and runs
    /// the initialization handshake.
    ///
    /// Only writable parameters (causality `parameter`, variability `fixed`
    /// or `tunable`) are written, in name order. Keys without such a
    /// parameter are reported as unmatched; they are not an error. A
    /// rejected lifecycle call is logged and does not abort.
    pub fn initialize<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        start_time: f64,
        parameters: &ParameterSet,
    ) -> Result<ParameterReport, DriverError> {
        let name = instance.name().to_string();
        let engine = instance.engine()?;

        if !engine.setup_experiment(start_time, self.stop_time, self.tolerance) {
            warn!("setup_experiment on '{}' reported {}", name, engine.last_status());
        }

        let mut report = ParameterReport::default();
        for variable in self.catalog.writable_parameters() {
            match parameters.get(&variable.name) {
                Some(raw) => {
                    let value = coerce(variable, raw)?;
                    write_value(engine, variable, &value)?;
                    debug!("Parameter {} = {}", variable.name, value);
                    report.applied.push(variable.name.clone());
                }
                None => report.defaulted.push(variable.name.clone()),
            }
        }
        for key in parameters.keys() {
            let writable = self
                .catalog
                .get(key)
                .map_or(false, ModelVariable::is_writable_parameter);
            if !writable {
                info!("Parameter '{}' does not exist in the model, ignored", key);
                report.unmatched.push(key.to_string());
            }
        }

        if !engine.enter_initialization_mode() {
            warn!("enter_initialization_mode on '{}' reported {}", name, engine.last_status());
        }
        if !engine.exit_initialization_mode() {
            warn!("exit_initialization_mode on '{}' reported {}", name, engine.last_status());
        }

        instance.mark_configured()?;
        Ok(report)
    }

    /// Writes every non-time cell of `row` to its variable.
    ///
    /// The whole row is resolved and coerced before the first write, so an
    /// unknown column or a malformed value leaves the instance untouched.
    /// Returns the number of values written.
    pub fn set_inputs_for_step<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        row: &TimeSeriesRow,
    ) -> Result<usize, DriverError> {
        let writes = row
            .signals()
            .map(|(column, raw)| {
                let variable = self.catalog.resolve(column)?;
                Ok((variable, coerce(variable, raw)?))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let engine = instance.engine()?;
        for (variable, value) in &writes {
            write_value(engine, variable, value)?;
        }
        Ok(writes.len())
    }

    /// Advances the instance by one step.
    ///
    /// A rejected step is not an error here; the outcome says so.
    pub fn advance<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        time: f64,
        step_size: f64,
    ) -> Result<StepOutcome, DriverError> {
        instance.mark_stepping()?;
        let engine = instance.engine()?;

        let ok = engine.do_step(time, step_size);
        let status = engine.last_status();
        debug!("do_step(t={}, h={}) -> {} ({})", time, step_size, ok, status);

        Ok(StepOutcome { ok, status })
    }

    /// True if the instance matches the checkpoint at `time`, or if there is
    /// no checkpoint at exactly that time.
    pub fn validate_step<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        time: f64,
    ) -> Result<bool, DriverError> {
        Ok(self
            .check_step(instance, time)?
            .map_or(true, |report| report.passed()))
    }

    /// Compares against the checkpoint at `time`, if there is one.
    pub fn check_step<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        time: f64,
    ) -> Result<Option<CheckpointReport>, DriverError> {
        match self.expected.row_at(time) {
            Some(row) => self.compare_row(instance, row).map(Some),
            None => {
                debug!("No checkpoint at t={}, skipping validation", time);
                Ok(None)
            }
        }
    }

    /// Reads every variable of `expected` and compares it.
    ///
    /// All columns are checked; a failing column does not stop the others.
    pub fn compare_row<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        expected: &ExpectedRow,
    ) -> Result<CheckpointReport, DriverError> {
        let engine = instance.engine()?;
        let mut report = CheckpointReport::new(expected.time);

        for column in &expected.values {
            let (actual, status) = read_value(engine, &column.variable);
            let check = ColumnCheck::evaluate(&column.variable.name, &column.value, actual, status);
            if check.passed {
                debug!("t={}: {}", expected.time, check);
            } else {
                warn!("t={}: {}", expected.time, check);
            }
            report.push(check);
        }

        Ok(report)
    }

    /// Dumps all non-input variables grouped by causality at debug level.
    pub fn log_state<I: SimulationInstance>(
        &self,
        instance: &mut ManagedInstance<I>,
        time: f64,
    ) -> Result<(), DriverError> {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return Ok(());
        }

        let engine = instance.engine()?;
        debug!("State at t={}", time);
        for causality in [
            Causality::Parameter,
            Causality::CalculatedParameter,
            Causality::Output,
            Causality::Local,
            Causality::Independent,
        ] {
            let mut variables = self.catalog.with_causality(causality).peekable();
            if variables.peek().is_none() {
                continue;
            }
            debug!("  {}:", causality);
            for variable in variables {
                match read_value(engine, variable) {
                    (Some(value), status) if status.is_ok() => {
                        debug!("    {} = {}", variable.name, value)
                    }
                    (_, status) => debug!("    {} = <{}>", variable.name, status),
                }
            }
        }
        Ok(())
    }
}

/// Writes one typed value; a non-OK status is a [`DriverError::Write`].
pub fn write_value<I: SimulationInstance>(
    engine: &mut I,
    variable: &ModelVariable,
    value: &TypedValue,
) -> Result<(), DriverError> {
    let vrs = [variable.value_reference];
    match value {
        TypedValue::Integer(v) => engine.write_integer(&vrs, &[*v]),
        TypedValue::Boolean(v) => engine.write_boolean(&vrs, &[*v]),
        TypedValue::Real(v) => engine.write_real(&vrs, &[*v]),
        TypedValue::String(v) => engine.write_string(&vrs, std::slice::from_ref(v)),
    }

    let status = engine.last_status();
    if !status.is_ok() {
        return Err(DriverError::Write {
            variable: variable.name.clone(),
            status,
        });
    }
    Ok(())
}

/// Reads one variable with the read call matching its declared type.
pub fn read_value<I: SimulationInstance>(
    engine: &mut I,
    variable: &ModelVariable,
) -> (Option<TypedValue>, EngineStatus) {
    let vrs = [variable.value_reference];
    let value = match variable.var_type {
        VariableType::Integer => engine.read_integer(&vrs).first().copied().map(TypedValue::Integer),
        VariableType::Boolean => engine.read_boolean(&vrs).first().copied().map(TypedValue::Boolean),
        VariableType::Real => engine.read_real(&vrs).first().copied().map(TypedValue::Real),
        VariableType::String => engine.read_string(&vrs).into_iter().next().map(TypedValue::String),
    };
    (value, engine.last_status())
}
