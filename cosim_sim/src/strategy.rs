//! Execution strategies for conformance runs.

use serde::{Deserialize, Serialize};

/// Strategy identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One instance lives across the entire input series
    SingleRun,

    /// The full series is replayed N times, each on a fresh instance
    FreshInstancePerRun,

    /// Every input row gets its own instance
    FreshInstancePerStep,

    /// Two instances split the series; the second resumes at the hand-off time
    HandoverRun,

    /// Smoke test: a single step
    FirstStepOnly,
}

impl ExecutionStrategy {
    /// Returns a list of all strategies.
    pub fn all() -> Vec<ExecutionStrategy> {
        vec![
            ExecutionStrategy::SingleRun,
            ExecutionStrategy::FreshInstancePerRun,
            ExecutionStrategy::FreshInstancePerStep,
            ExecutionStrategy::HandoverRun,
            ExecutionStrategy::FirstStepOnly,
        ]
    }

    /// Parses a selection: one strategy name or `all`.
    pub fn parse_selection(s: &str) -> Result<Vec<ExecutionStrategy>, String> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        s.split(',').map(|part| part.trim().parse()).collect()
    }

    /// Returns the strategy name.
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionStrategy::SingleRun => "single_run",
            ExecutionStrategy::FreshInstancePerRun => "fresh_instance_per_run",
            ExecutionStrategy::FreshInstancePerStep => "fresh_instance_per_step",
            ExecutionStrategy::HandoverRun => "handover_run",
            ExecutionStrategy::FirstStepOnly => "first_step_only",
        }
    }

    /// Returns a description of the strategy.
    pub fn description(&self) -> &'static str {
        match self {
            ExecutionStrategy::SingleRun => "All steps in a single instance",
            ExecutionStrategy::FreshInstancePerRun => "Repeated full runs, new instance each run",
            ExecutionStrategy::FreshInstancePerStep => "New instance for every step",
            ExecutionStrategy::HandoverRun => "Two instances, second starts where the first stopped",
            ExecutionStrategy::FirstStepOnly => "First step only",
        }
    }

    /// Returns true if the strategy records per-run failures instead of
    /// aborting on them.
    pub fn continues_after_failure(&self) -> bool {
        matches!(self, ExecutionStrategy::FreshInstancePerRun)
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_run" | "singlerun" | "single" => Ok(ExecutionStrategy::SingleRun),
            "fresh_instance_per_run" | "freshinstanceperrun" | "multiple_runs" => {
                Ok(ExecutionStrategy::FreshInstancePerRun)
            }
            "fresh_instance_per_step" | "freshinstanceperstep" | "per_step" => {
                Ok(ExecutionStrategy::FreshInstancePerStep)
            }
            "handover_run" | "handoverrun" | "handover" => Ok(ExecutionStrategy::HandoverRun),
            "first_step_only" | "firststeponly" | "first_step" => Ok(ExecutionStrategy::FirstStepOnly),
            // Groups
            "all" => Err("'all' selects every strategy; use parse_selection".to_string()),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for strategy in ExecutionStrategy::all() {
            assert_eq!(strategy.name().parse::<ExecutionStrategy>(), Ok(strategy));
            assert_eq!(strategy.to_string(), strategy.name());
        }
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(ExecutionStrategy::parse_selection("ALL").unwrap().len(), 5);
        assert_eq!(
            ExecutionStrategy::parse_selection("handover, first_step_only").unwrap(),
            vec![ExecutionStrategy::HandoverRun, ExecutionStrategy::FirstStepOnly]
        );
        assert!(ExecutionStrategy::parse_selection("warp_speed").is_err());
    }

    #[test]
    fn test_only_repeated_runs_continue() {
        let continuing: Vec<_> = ExecutionStrategy::all()
            .into_iter()
            .filter(ExecutionStrategy::continues_after_failure)
            .collect();
        assert_eq!(continuing, vec![ExecutionStrategy::FreshInstancePerRun]);
    }
}
