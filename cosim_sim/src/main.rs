//! CoSim Conformance CLI
//!
//! Run conformance strategies against a loopback engine model.

use clap::Parser;
use cosim_core::{ExpectedOutputTimeSeries, InputTimeSeries, ParameterSet};
use cosim_sim::{
    load_catalog, ConformanceExport, DriverConfig, DriverError, ExecutionStrategy, LoopbackEngine,
    LoopbackModel, StrategyReport, StrategyRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// CoSim conformance driver CLI
#[derive(Parser, Debug)]
#[command(name = "cosim-conform")]
#[command(about = "Run co-simulation conformance strategies", long_about = None)]
struct Args {
    /// Loopback engine model (JSON)
    #[arg(short, long)]
    model: PathBuf,

    /// Input series (CSV with a `time` column)
    #[arg(short, long)]
    inputs: PathBuf,

    /// Expected outputs (CSV with a `time` column)
    #[arg(short, long)]
    expected: PathBuf,

    /// Initial parameter values (key=value lines)
    #[arg(short, long)]
    parameters: Option<PathBuf>,

    /// Strategy to run (single_run, fresh_instance_per_run, fresh_instance_per_step,
    /// handover_run, first_step_only, all)
    #[arg(short = 'S', long, default_value = "all")]
    strategy: String,

    /// Number of runs for fresh_instance_per_run
    #[arg(long, default_value = "10")]
    runs: usize,

    /// Step size used when the input has a single row
    #[arg(long, default_value = "0.0")]
    fallback_step: f64,

    /// Steps executed by the first instance of handover_run
    #[arg(long)]
    handover_split: Option<usize>,

    /// Experiment start time (default: first input time)
    #[arg(long)]
    start_time: Option<f64>,

    /// Experiment stop time
    #[arg(long)]
    stop_time: Option<f64>,

    /// Solver tolerance
    #[arg(long)]
    tolerance: Option<f64>,

    /// Probability that the loopback engine fails any step
    #[arg(long, default_value = "0.0")]
    fault_rate: f64,

    /// Seed for fault injection
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export all reports to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Runs the selected strategies; returns the overall verdict.
fn run(args: &Args) -> Result<bool, DriverError> {
    if !args.json {
        info!("CoSim Conformance Driver v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let strategies = ExecutionStrategy::parse_selection(&args.strategy).map_err(|e| {
        DriverError::configuration(format!(
            "{}; available: single_run, fresh_instance_per_run, fresh_instance_per_step, handover_run, first_step_only, all",
            e
        ))
    })?;

    let mut model = LoopbackModel::from_path(&args.model)?;
    if args.fault_rate > 0.0 {
        model.faults.step_failure_rate = args.fault_rate;
        model.faults.seed = args.seed;
    }
    let engine = LoopbackEngine::new(model)?;

    let catalog = Arc::new(load_catalog(&engine)?);
    let inputs = InputTimeSeries::from_path(&args.inputs)?;
    let expected = ExpectedOutputTimeSeries::from_path(&args.expected, &catalog)?;
    let parameters = match &args.parameters {
        Some(path) => ParameterSet::from_path(path)?,
        None => ParameterSet::default(),
    };
    info!(
        "Loaded {} variables, {} input rows, {} checkpoints, {} parameters",
        catalog.len(),
        inputs.len(),
        expected.len(),
        parameters.len()
    );

    let config = DriverConfig {
        runs: args.runs,
        start_time: args.start_time,
        stop_time: args.stop_time,
        tolerance: args.tolerance,
        fallback_step: args.fallback_step,
        handover_split: args.handover_split,
        ..Default::default()
    };
    let runner = StrategyRunner::new(engine, catalog, inputs, expected)
        .with_parameters(parameters)
        .with_config(config);

    let mut export = ConformanceExport::new(
        &args.model.display().to_string(),
        &args.inputs.display().to_string(),
        runner.schedule()?.len(),
    );

    for strategy in strategies {
        match runner.run(strategy) {
            Ok(report) => {
                if !args.json {
                    log_report(&report);
                }
                export.add_report(report);
            }
            Err(e) => {
                if !args.json {
                    error!("✗ {} ABORTED: {}", strategy.name(), e);
                }
                export.add_failure(strategy, e);
            }
        }
    }
    let passed = export.finalize();

    if args.json {
        let summary = serde_json::json!({
            "total": export.reports.len() + export.failures.len(),
            "passed": export.reports.iter().filter(|r| r.passed()).count(),
            "failed": export.reports.iter().filter(|r| !r.passed()).count() + export.failures.len(),
            "results": export.reports.iter().map(|r| {
                serde_json::json!({
                    "strategy": r.strategy.name(),
                    "passed": r.passed(),
                    "runs": r.summary.total_runs,
                    "failed_runs": r.summary.failed_runs,
                })
            }).chain(export.failures.iter().map(|f| {
                serde_json::json!({
                    "strategy": f.strategy.name(),
                    "passed": false,
                    "error": f.error,
                })
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if passed {
            info!("✅ All {} strategies passed!", export.reports.len());
        } else {
            error!(
                "❌ {}/{} strategies failed!",
                export.reports.iter().filter(|r| !r.passed()).count() + export.failures.len(),
                export.reports.len() + export.failures.len()
            );
        }
    }

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("Exported {} reports to {}", export.reports.len(), path.display());
    }

    Ok(passed)
}

fn log_report(report: &StrategyReport) {
    if report.passed() {
        info!("✓ {} PASSED ({} runs)", report.strategy.name(), report.summary.total_runs);
        return;
    }
    error!(
        "✗ {} FAILED: {}/{} runs failed",
        report.strategy.name(),
        report.summary.failed_runs,
        report.summary.total_runs
    );
    for run in report.runs.iter().filter(|r| !r.passed()) {
        for note in &run.annotations {
            error!("  - run {}: {}", run.run_index + 1, note);
        }
    }
}
