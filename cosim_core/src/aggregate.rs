//! Per-run step outcomes and their aggregation across repeated runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of every executed step of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// 0-based run index
    pub run_index: usize,

    /// One entry per executed step; `true` = stepped and validated
    pub steps: Vec<bool>,

    /// Free-form notes (step failures, abort reasons)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
}

impl RunResult {
    pub fn new(run_index: usize) -> Self {
        Self {
            run_index,
            ..Default::default()
        }
    }

    /// Appends the outcome of the next step.
    pub fn record(&mut self, passed: bool) {
        self.steps.push(passed);
    }

    pub fn annotate(&mut self, note: impl Into<String>) {
        self.annotations.push(note.into());
    }

    /// True when every executed step passed.
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|&s| s)
    }

    /// 0-based indices of the failed steps.
    pub fn failing_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, passed)| !**passed)
            .map(|(i, _)| i)
            .collect()
    }
}

/// A run with at least one failed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRun {
    pub run_index: usize,
    pub failing_steps: Vec<usize>,
}

/// Aggregate over a sequence of runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_runs: usize,
    pub failed_runs: usize,
    /// Failed runs in run order
    pub failures: Vec<FailedRun>,
    /// Run indices in the order they were summarized
    pub run_indices: Vec<usize>,
}

impl RunSummary {
    /// The top-level verdict: no run failed.
    pub fn passed(&self) -> bool {
        self.failed_runs == 0
    }

    /// Failing step indices of a run, if it failed.
    pub fn failing_steps_of(&self, run_index: usize) -> Option<&[usize]> {
        self.failures
            .iter()
            .find(|f| f.run_index == run_index)
            .map(|f| f.failing_steps.as_slice())
    }

    /// Report lines: totals followed by one line per run (1-based).
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Runs total: {}", self.total_runs),
            format!("Runs failed: {}", self.failed_runs),
        ];
        for &run_index in &self.run_indices {
            let line = match self.failing_steps_of(run_index) {
                None => format!("Run {}: OK", run_index + 1),
                Some(steps) => format!(
                    "Run {}: FAILED (failed steps: {})",
                    run_index + 1,
                    steps
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            lines.push(line);
        }
        lines
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.report_lines().join("\n"))
    }
}

/// Summarizes runs. A run failed if any of its steps is `false`.
pub fn summarize(results: &[RunResult]) -> RunSummary {
    let failures: Vec<FailedRun> = results
        .iter()
        .filter(|r| !r.passed())
        .map(|r| FailedRun {
            run_index: r.run_index,
            failing_steps: r.failing_steps(),
        })
        .collect();

    RunSummary {
        total_runs: results.len(),
        failed_runs: failures.len(),
        failures,
        run_indices: results.iter().map(|r| r.run_index).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(index: usize, steps: &[bool]) -> RunResult {
        RunResult {
            run_index: index,
            steps: steps.to_vec(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_all_passing() {
        let results: Vec<RunResult> = (0..5).map(|i| run(i, &[true, true, true])).collect();

        let summary = summarize(&results);

        assert_eq!(summary.total_runs, 5);
        assert_eq!(summary.failed_runs, 0);
        assert!(summary.passed());
    }

    #[test]
    fn test_one_failing_step_in_run_two() {
        let mut results: Vec<RunResult> = (0..5).map(|i| run(i, &[true, true, true])).collect();
        results[2].steps[1] = false;

        let summary = summarize(&results);

        assert_eq!(summary.failed_runs, 1);
        assert_eq!(summary.failing_steps_of(2), Some(&[1usize][..]));
        assert_eq!(summary.failing_steps_of(0), None);
        assert!(!summary.passed());
    }

    #[test]
    fn test_report_lines() {
        let summary = summarize(&[run(0, &[true]), run(1, &[false, true, false])]);

        assert_eq!(
            summary.report_lines(),
            vec![
                "Runs total: 2",
                "Runs failed: 1",
                "Run 1: OK",
                "Run 2: FAILED (failed steps: 0, 2)",
            ]
        );
    }

    #[test]
    fn test_empty_run_passes() {
        assert!(run(0, &[]).passed());
        assert!(summarize(&[]).passed());
    }
}
