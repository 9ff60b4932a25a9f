//! JSON exporter for conformance reports.
//!
//! Writes every strategy report of an invocation as one JSON document, for
//! CI artifacts and later inspection.

use crate::runner::StrategyReport;
use crate::strategy::ExecutionStrategy;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A strategy that did not produce a report.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyFailure {
    pub strategy: ExecutionStrategy,
    pub error: String,
}

/// Complete export of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ConformanceExport {
    /// Model file the engine was built from
    pub model: String,

    /// Input series the schedule was derived from
    pub inputs: String,

    /// Number of scheduled steps
    pub steps: usize,

    /// Completed strategies
    pub reports: Vec<StrategyReport>,

    /// Strategies that aborted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StrategyFailure>,

    /// Final verdict
    pub passed: bool,
}

impl ConformanceExport {
    /// Creates a new export container.
    pub fn new(model: &str, inputs: &str, steps: usize) -> Self {
        Self {
            model: model.to_string(),
            inputs: inputs.to_string(),
            steps,
            reports: Vec::new(),
            failures: Vec::new(),
            passed: false,
        }
    }

    /// Adds a completed strategy.
    pub fn add_report(&mut self, report: StrategyReport) {
        self.reports.push(report);
    }

    /// Adds an aborted strategy.
    pub fn add_failure(&mut self, strategy: ExecutionStrategy, error: impl ToString) {
        self.failures.push(StrategyFailure {
            strategy,
            error: error.to_string(),
        });
    }

    /// Finalizes the export: passed iff nothing aborted and every report passed.
    pub fn finalize(&mut self) -> bool {
        self.passed = self.failures.is_empty() && self.reports.iter().all(StrategyReport::passed);
        self.passed
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
