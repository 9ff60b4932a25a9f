//! Property tests for repeated runs under injected step faults.

use cosim_core::{ExpectedOutputTimeSeries, InputTimeSeries};
use cosim_env::{Causality, Variability, VariableDescription, VariableType};
use cosim_sim::{
    load_catalog, EngineCall, ExecutionStrategy, FaultPlan, LoopbackEngine, LoopbackModel, Route,
    StepFault, StrategyRunner,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const STEPS: usize = 4;
const RUNS: usize = 6;

fn runner(faults: FaultPlan) -> (StrategyRunner<LoopbackEngine>, cosim_sim::CallLog) {
    let model = LoopbackModel {
        variables: vec![
            VariableDescription::new("u", VariableType::Integer, Causality::Input, Variability::Discrete, 1),
            VariableDescription::new("y", VariableType::Integer, Causality::Output, Variability::Discrete, 2),
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
    let inputs = InputTimeSeries::from_reader("time,u\n0,1\n1,2\n2,3\n3,4\n".as_bytes()).unwrap();
    let expected =
        ExpectedOutputTimeSeries::from_reader("time,y\n1,1\n2,2\n3,3\n4,4\n".as_bytes(), &catalog).unwrap();
    (
        StrategyRunner::new(engine, catalog, inputs, expected).with_runs(RUNS),
        log,
    )
}

proptest! {
    #[test]
    fn prop_repeated_runs_report_every_faulty_step(
        faults in prop::collection::vec((0..RUNS, 0..STEPS), 0..8)
    ) {
        let plan = FaultPlan {
            failing_steps: faults.iter().map(|&(instance, step)| StepFault { instance, step }).collect(),
            ..Default::default()
        };
        let (runner, log) = runner(plan);

        let report = runner.run(ExecutionStrategy::FreshInstancePerRun).unwrap();

        let mut faulty: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for &(instance, step) in &faults {
            faulty.entry(instance).or_default().insert(step);
        }

        prop_assert_eq!(report.summary.total_runs, RUNS);
        prop_assert_eq!(report.summary.failed_runs, faulty.len());
        for run in &report.runs {
            prop_assert_eq!(run.steps.len(), STEPS);
        }
        for (&run, steps) in &faulty {
            let expected: Vec<usize> = steps.iter().copied().collect();
            prop_assert_eq!(report.summary.failing_steps_of(run).map(<[usize]>::to_vec), Some(expected));
        }
        prop_assert_eq!(log.count(|c| matches!(c, EngineCall::DoStep { .. })), RUNS * STEPS);
        prop_assert_eq!(log.count(|c| matches!(c, EngineCall::Terminate { .. })), RUNS);
        prop_assert_eq!(log.count(|c| matches!(c, EngineCall::Dispose { .. })), RUNS);
    }

    #[test]
    fn prop_random_fault_rate_is_reproducible(seed in any::<u64>(), rate in 0.0f64..1.0) {
        let plan = FaultPlan { step_failure_rate: rate, seed, ..Default::default() };

        let (first, _) = runner(plan.clone());
        let (second, _) = runner(plan);

        let a = first.run(ExecutionStrategy::FreshInstancePerRun).unwrap();
        let b = second.run(ExecutionStrategy::FreshInstancePerRun).unwrap();
        prop_assert_eq!(a.summary, b.summary);
    }
}
