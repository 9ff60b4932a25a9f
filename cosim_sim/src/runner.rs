//! Strategy runner - executes conformance strategies against an engine.

use crate::config::DriverConfig;
use crate::driver::SimulationDriver;
use crate::error::DriverError;
use crate::instance::ManagedInstance;
use crate::strategy::ExecutionStrategy;

use cosim_core::{
    summarize, ExpectedOutputTimeSeries, InputTimeSeries, ParameterSet, RunResult, RunSummary,
    ScheduledStep, StepScheduler, VariableCatalog,
};
use cosim_env::{CoSimEngine, SimulationInstance};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Results from running a strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    /// Strategy that was run
    pub strategy: ExecutionStrategy,

    /// One entry per run, in run order
    pub runs: Vec<RunResult>,

    /// Aggregate over `runs`
    pub summary: RunSummary,
}

impl StrategyReport {
    /// Whether every step of every run passed.
    pub fn passed(&self) -> bool {
        self.summary.passed()
    }
}

/// Runs conformance strategies.
pub struct StrategyRunner<E: CoSimEngine> {
    engine: E,
    catalog: Arc<VariableCatalog>,
    inputs: Arc<InputTimeSeries>,
    expected: Arc<ExpectedOutputTimeSeries>,
    parameters: ParameterSet,
    config: DriverConfig,
}

impl<E: CoSimEngine> StrategyRunner<E> {
    /// Creates a new strategy runner.
    pub fn new(
        engine: E,
        catalog: Arc<VariableCatalog>,
        inputs: InputTimeSeries,
        expected: ExpectedOutputTimeSeries,
    ) -> Self {
        Self {
            engine,
            catalog,
            inputs: Arc::new(inputs),
            expected: Arc::new(expected),
            parameters: ParameterSet::default(),
            config: DriverConfig::default(),
        }
    }

    /// Sets the initial parameter values.
    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of repeated runs.
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.config.runs = runs;
        self
    }

    /// Sets the step size used for a single-row series.
    pub fn with_fallback_step(mut self, step_size: f64) -> Self {
        self.config.fallback_step = step_size;
        self
    }

    /// Sets how many steps the first hand-off instance executes.
    pub fn with_handover_split(mut self, split: usize) -> Self {
        self.config.handover_split = Some(split);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The step schedule derived from the inputs.
    pub fn schedule(&self) -> Result<Vec<ScheduledStep>, DriverError> {
        Ok(StepScheduler::new()
            .with_fallback_step(self.config.fallback_step)
            .derive(&self.inputs)?)
    }

    /// Runs a strategy and returns its report.
    ///
    /// Validation failures are recorded in the report. Step failures and
    /// driver errors abort every strategy except `fresh_instance_per_run`,
    /// which records a failed step and keeps stepping, and records a fatal
    /// error against its run before moving on to the next one.
    pub fn run(&self, strategy: ExecutionStrategy) -> Result<StrategyReport, DriverError> {
        info!("Starting strategy: {} ({})", strategy.name(), strategy.description());

        let schedule = self.schedule()?;
        let driver = SimulationDriver::new(Arc::clone(&self.catalog), Arc::clone(&self.expected))
            .with_stop_time(self.config.stop_time)
            .with_tolerance(self.config.tolerance);

        let step_loop = StepLoop {
            driver: &driver,
            keep_going: strategy.continues_after_failure(),
        };

        let runs = match strategy {
            ExecutionStrategy::SingleRun => vec![self.run_single(&step_loop, &schedule)?],
            ExecutionStrategy::FreshInstancePerRun => self.run_repeated(&step_loop, &schedule)?,
            ExecutionStrategy::FreshInstancePerStep => vec![self.run_per_step(&step_loop, &schedule)?],
            ExecutionStrategy::HandoverRun => vec![self.run_handover(&step_loop, &schedule)?],
            ExecutionStrategy::FirstStepOnly => vec![self.run_single(&step_loop, &schedule[..1])?],
        };

        let summary = summarize(&runs);
        for line in summary.report_lines() {
            info!("{}", line);
        }

        Ok(StrategyReport {
            strategy,
            runs,
            summary,
        })
    }

    /// Single instance across `steps`.
    fn run_single(&self, step_loop: &StepLoop<'_>, steps: &[ScheduledStep]) -> Result<RunResult, DriverError> {
        let mut result = RunResult::new(0);
        let name = format!("{}_single", self.config.instance_name);
        self.run_segment(step_loop, &name, self.start_time(steps), steps, &mut result)?;
        Ok(result)
    }

    /// Fresh instance per full run; failures are recorded, not propagated.
    fn run_repeated(&self, step_loop: &StepLoop<'_>, schedule: &[ScheduledStep]) -> Result<Vec<RunResult>, DriverError> {
        if self.config.runs == 0 {
            return Err(DriverError::configuration("at least one run is required"));
        }

        let mut results = Vec::with_capacity(self.config.runs);
        for run in 0..self.config.runs {
            let mut result = RunResult::new(run);
            let name = format!("{}_run{}", self.config.instance_name, run);

            if let Err(e) = self.run_segment(step_loop, &name, self.start_time(schedule), schedule, &mut result) {
                error!("Run {} failed: {}", run + 1, e);
                result.record(false);
                result.annotate(e.to_string());
            }
            results.push(result);
        }
        Ok(results)
    }

    /// One instance per input row, each set up at its row's time.
    fn run_per_step(&self, step_loop: &StepLoop<'_>, schedule: &[ScheduledStep]) -> Result<RunResult, DriverError> {
        let mut result = RunResult::new(0);
        for step in schedule {
            let name = format!("{}_step{}", self.config.instance_name, step.index);
            self.run_segment(step_loop, &name, step.time, std::slice::from_ref(step), &mut result)?;
        }
        Ok(result)
    }

    /// Two disjoint instances; the second starts at the hand-off time.
    fn run_handover(&self, step_loop: &StepLoop<'_>, schedule: &[ScheduledStep]) -> Result<RunResult, DriverError> {
        let n = schedule.len();
        if n < 2 {
            return Err(DriverError::configuration(format!(
                "handover needs at least 2 steps, input has {}",
                n
            )));
        }
        let split = self.config.handover_split.unwrap_or((n + 1) / 2);
        if split == 0 || split >= n {
            return Err(DriverError::configuration(format!(
                "handover split {} must be within 1..{}",
                split, n
            )));
        }

        let (first, second) = schedule.split_at(split);
        let handoff_time = second[0].time;
        info!("Handing over after {} steps at t={}", split, handoff_time);

        let mut result = RunResult::new(0);
        let prefix = &self.config.instance_name;
        self.run_segment(step_loop, &format!("{prefix}_a"), self.start_time(first), first, &mut result)?;
        self.run_segment(step_loop, &format!("{prefix}_b"), handoff_time, second, &mut result)?;
        Ok(result)
    }

    /// The shared step loop: instantiate, initialize, step through `steps`,
    /// release.
    ///
    /// Errors come back wrapped in [`DriverError::Aborted`] with the step
    /// being executed. The instance is terminated and disposed before the
    /// error reaches the caller. A failed `do_step` is only an error when
    /// the loop does not keep going.
    fn run_segment(
        &self,
        step_loop: &StepLoop<'_>,
        name: &str,
        start_time: f64,
        steps: &[ScheduledStep],
        result: &mut RunResult,
    ) -> Result<(), DriverError> {
        let Some(first) = steps.first() else {
            return Ok(());
        };
        let driver = step_loop.driver;
        let run_index = result.run_index;
        let mut instance = match self.engine.instantiate(Some(name)) {
            Ok(inner) => ManagedInstance::new(name, inner),
            Err(e) => return Err(DriverError::from(e).aborted(run_index, first.index, first.time)),
        };
        debug!("Instantiated '{}' (start t={})", name, start_time);

        let report = driver
            .initialize(&mut instance, start_time, &self.parameters)
            .map_err(|e| e.aborted(run_index, first.index, first.time))?;
        debug!(
            "Parameters: {} applied, {} defaulted, {} unmatched",
            report.applied.len(),
            report.defaulted.len(),
            report.unmatched.len()
        );

        for step in steps {
            let passed = self
                .execute_step(step_loop, &mut instance, step, result)
                .map_err(|e| e.aborted(run_index, step.index, step.time))?;
            result.record(passed);
        }

        instance.release();
        Ok(())
    }

    /// Inputs, step, validation for one scheduled step.
    fn execute_step<I: SimulationInstance>(
        &self,
        step_loop: &StepLoop<'_>,
        instance: &mut ManagedInstance<I>,
        step: &ScheduledStep,
        result: &mut RunResult,
    ) -> Result<bool, DriverError> {
        let driver = step_loop.driver;
        let row = self.inputs.row(step.index).ok_or_else(|| {
            DriverError::configuration(format!("no input row for step {}", step.index))
        })?;

        driver.set_inputs_for_step(instance, row)?;

        let outcome = driver.advance(instance, step.time, step.step_size)?;
        if !outcome.ok {
            if step_loop.keep_going {
                warn!("Step {} (t={}): do_step failed with {}", step.index, step.time, outcome.status);
                result.annotate(format!(
                    "step {} at t={}: do_step failed with status {}",
                    step.index, step.time, outcome.status
                ));
                return Ok(false);
            }
            return Err(DriverError::StepFailure {
                step: step.index,
                time: step.time,
                status: outcome.status,
            });
        }

        let end_time = step.end_time();
        driver.log_state(instance, end_time)?;

        match driver.check_step(instance, end_time)? {
            Some(report) if !report.passed() => {
                warn!("Step {} (t={}): {} failed", step.index, end_time, report.failing_variables());
                result.annotate(format!(
                    "step {} at t={}: {} did not match",
                    step.index,
                    end_time,
                    report.failing_variables()
                ));
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    fn start_time(&self, steps: &[ScheduledStep]) -> f64 {
        self.config
            .start_time
            .or_else(|| steps.first().map(|s| s.time))
            .unwrap_or(0.0)
    }
}

/// How the shared step loop treats a failed `do_step`.
struct StepLoop<'a> {
    driver: &'a SimulationDriver,

    /// Record the step as failed and continue instead of aborting
    keep_going: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::load_catalog;
    use crate::loopback::{CallLog, EngineCall, FaultPlan, LoopbackEngine, LoopbackModel, Route, StepFault};
    use cosim_env::{Causality, ValueReference, Variability, VariableDescription, VariableType};

    const INPUTS: &str = "time,u\n0,1\n0.5,2\n1.0,3\n1.5,4\n";
    const EXPECTED: &str = "time,y\n0.5,1\n1.0,2\n1.5,3\n2.0,4\n";

    fn runner_with(expected: &str, faults: FaultPlan) -> (StrategyRunner<LoopbackEngine>, CallLog) {
        let model = LoopbackModel {
            variables: vec![
                VariableDescription::new("u", VariableType::Real, Causality::Input, Variability::Continuous, 1),
                VariableDescription::new("y", VariableType::Real, Causality::Output, Variability::Continuous, 2),
            ],
            routes: vec![Route::Copy {
                from: "u".into(),
                to: "y".into(),
            }],
            faults,
        };
        let engine = LoopbackEngine::new(model).unwrap();
        let log = engine.call_log();
        let catalog = Arc::new(load_catalog(&engine).unwrap());
        let inputs = InputTimeSeries::from_reader(INPUTS.as_bytes()).unwrap();
        let expected = ExpectedOutputTimeSeries::from_reader(expected.as_bytes(), &catalog).unwrap();
        (StrategyRunner::new(engine, catalog, inputs, expected), log)
    }

    fn runner(faults: FaultPlan) -> (StrategyRunner<LoopbackEngine>, CallLog) {
        runner_with(EXPECTED, faults)
    }

    fn step_fault(instance: usize, step: usize) -> FaultPlan {
        FaultPlan {
            failing_steps: vec![StepFault { instance, step }],
            ..Default::default()
        }
    }

    fn terminates(log: &CallLog) -> usize {
        log.count(|c| matches!(c, EngineCall::Terminate { .. }))
    }

    fn disposes(log: &CallLog) -> usize {
        log.count(|c| matches!(c, EngineCall::Dispose { .. }))
    }

    #[test]
    fn test_single_run_passes() {
        let (runner, log) = runner(FaultPlan::default());

        let report = runner.run(ExecutionStrategy::SingleRun).unwrap();

        assert!(report.passed());
        assert_eq!(report.runs.len(), 1);
        assert_eq!(report.runs[0].steps, vec![true; 4]);
        assert_eq!(log.count(|c| matches!(c, EngineCall::Instantiate { .. })), 1);
        assert_eq!(terminates(&log), 1);
        assert_eq!(disposes(&log), 1);
    }

    #[test]
    fn test_validation_failure_is_recorded_not_aborted() {
        let (runner, _log) = runner_with("time,y\n0.5,1\n1.0,99\n", FaultPlan::default());

        let report = runner.run(ExecutionStrategy::SingleRun).unwrap();

        assert!(!report.passed());
        assert_eq!(report.runs[0].steps, vec![true, false, true, true]);
        assert_eq!(report.summary.failing_steps_of(0), Some(&[1usize][..]));
        assert_eq!(report.runs[0].annotations.len(), 1);
    }

    #[test]
    fn test_step_failure_aborts_single_run() {
        let (runner, log) = runner(step_fault(0, 2));

        let err = runner.run(ExecutionStrategy::SingleRun).unwrap_err();

        assert!(matches!(err, DriverError::Aborted { run: 0, step: 2, .. }));
        assert!(matches!(err.root(), DriverError::StepFailure { step: 2, .. }));
        assert_eq!(terminates(&log), 1);
        assert_eq!(disposes(&log), 1);
    }

    #[test]
    fn test_repeated_runs_record_failures_and_continue() {
        let (runner, log) = runner(step_fault(2, 1));
        let runner = runner.with_runs(5);

        let report = runner.run(ExecutionStrategy::FreshInstancePerRun).unwrap();

        assert_eq!(report.summary.total_runs, 5);
        assert_eq!(report.summary.failed_runs, 1);
        assert_eq!(report.summary.failing_steps_of(2), Some(&[1usize][..]));
        assert_eq!(report.runs[2].steps, vec![true, false, true, true]);
        assert_eq!(log.count(|c| matches!(c, EngineCall::DoStep { instance: 2, .. })), 4);
        assert_eq!(log.count(|c| matches!(c, EngineCall::Instantiate { .. })), 5);
        assert_eq!(disposes(&log), 5);
    }

    #[test]
    fn test_repeated_runs_validate_steps_after_a_failed_step() {
        let (runner, log) = runner_with("time,y\n0.5,1\n1.0,2\n1.5,3\n2.0,99\n", step_fault(2, 1));
        let runner = runner.with_runs(3);

        let report = runner.run(ExecutionStrategy::FreshInstancePerRun).unwrap();

        assert_eq!(report.summary.failed_runs, 3);
        assert_eq!(report.summary.failing_steps_of(0), Some(&[3usize][..]));
        assert_eq!(report.summary.failing_steps_of(2), Some(&[1usize, 3][..]));
        assert_eq!(report.runs[2].steps, vec![true, false, true, false]);
        assert_eq!(report.runs[2].annotations.len(), 2);
        assert_eq!(log.count(|c| matches!(c, EngineCall::DoStep { instance: 2, .. })), 4);
    }

    #[test]
    fn test_write_error_still_aborts_repeated_run() {
        let (runner, log) = runner(FaultPlan {
            failing_writes: vec![ValueReference(1)],
            ..Default::default()
        });
        let runner = runner.with_runs(2);

        let report = runner.run(ExecutionStrategy::FreshInstancePerRun).unwrap();

        assert_eq!(report.summary.failed_runs, 2);
        assert_eq!(report.runs[0].steps, vec![false]);
        assert_eq!(log.count(|c| matches!(c, EngineCall::DoStep { .. })), 0);
        assert_eq!(disposes(&log), 2);
    }

    #[test]
    fn test_repeated_runs_default_to_ten() {
        let (runner, _log) = runner(FaultPlan::default());

        let report = runner.run(ExecutionStrategy::FreshInstancePerRun).unwrap();

        assert_eq!(report.summary.total_runs, 10);
        assert!(report.passed());
    }

    #[test]
    fn test_repeated_runs_survive_instantiation_failure() {
        let (runner, _log) = runner(FaultPlan {
            failing_instances: vec![0],
            ..Default::default()
        });
        let runner = runner.with_runs(3);

        let report = runner.run(ExecutionStrategy::FreshInstancePerRun).unwrap();

        assert_eq!(report.summary.failed_runs, 1);
        assert_eq!(report.runs[0].steps, vec![false]);
        assert!(report.runs[1].passed());
    }

    #[test]
    fn test_zero_runs_is_configuration_error() {
        let (runner, _log) = runner(FaultPlan::default());

        let err = runner.with_runs(0).run(ExecutionStrategy::FreshInstancePerRun).unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
    }

    #[test]
    fn test_fresh_instance_per_step() {
        let (runner, log) = runner(FaultPlan::default());

        let report = runner.run(ExecutionStrategy::FreshInstancePerStep).unwrap();

        assert!(report.passed());
        let starts: Vec<f64> = log
            .snapshot()
            .iter()
            .filter_map(|c| match c {
                EngineCall::SetupExperiment { start_time, .. } => Some(*start_time),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(disposes(&log), 4);
    }

    #[test]
    fn test_handover_instances_are_disjoint() {
        let (runner, log) = runner(FaultPlan::default());

        let report = runner.run(ExecutionStrategy::HandoverRun).unwrap();

        assert!(report.passed());
        assert_eq!(report.runs[0].steps.len(), 4);

        let calls = log.snapshot();
        let first_dispose = calls
            .iter()
            .position(|c| matches!(c, EngineCall::Dispose { instance: 0 }))
            .unwrap();
        let second_instantiate = calls
            .iter()
            .position(|c| matches!(c, EngineCall::Instantiate { instance: 1, .. }))
            .unwrap();
        assert!(first_dispose < second_instantiate);
        assert!(calls.iter().any(|c| matches!(
            c,
            EngineCall::SetupExperiment { instance: 1, start_time, .. } if *start_time == 1.0
        )));
    }

    #[test]
    fn test_handover_custom_split() {
        let (runner, log) = runner(FaultPlan::default());

        runner.with_handover_split(3).run(ExecutionStrategy::HandoverRun).unwrap();

        let steps_of_b = log.count(|c| matches!(c, EngineCall::DoStep { instance: 1, .. }));
        assert_eq!(steps_of_b, 1);
    }

    #[test]
    fn test_handover_split_out_of_range() {
        let (runner, _log) = runner(FaultPlan::default());

        let err = runner.with_handover_split(4).run(ExecutionStrategy::HandoverRun).unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
    }

    #[test]
    fn test_first_step_only() {
        let (runner, log) = runner(FaultPlan::default());

        let report = runner.run(ExecutionStrategy::FirstStepOnly).unwrap();

        assert_eq!(report.runs[0].steps, vec![true]);
        assert_eq!(log.count(|c| matches!(c, EngineCall::DoStep { .. })), 1);
        assert_eq!(terminates(&log), 1);
    }
}
