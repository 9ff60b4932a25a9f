//! Validation Module - Checkpoint Comparison Against Expected Outputs
//! ===================================================================
//!
//! Records the outcome of comparing live engine values with an expected
//! checkpoint row. Every column is checked and kept, so a single pass shows
//! every violation of a row; the row passes only if all columns pass.
//!
//! Usage:
//! ```ignore
//! use cosim_core::validation::{CheckpointReport, ColumnCheck};
//!
//! let mut report = CheckpointReport::new(t);
//! for expected in &row.values {
//!     let (actual, status) = read(expected.variable);
//!     report.push(ColumnCheck::evaluate(&expected.variable.name, &expected.value, Some(actual), status));
//! }
//! assert!(report.passed());
//! ```

use crate::value::TypedValue;
use cosim_env::EngineStatus;
use serde::Serialize;
use std::fmt;

// =============================================================================
// COLUMN CHECK
// =============================================================================

/// Comparison of one variable at one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCheck {
    pub variable: String,
    pub expected: TypedValue,
    /// Value read from the engine; `None` if the read produced nothing
    pub actual: Option<TypedValue>,
    /// Status reported by the read
    pub status: EngineStatus,
    pub passed: bool,
}

impl ColumnCheck {
    /// Passes iff the read status is OK and the value equals `expected`.
    pub fn evaluate(
        variable: &str,
        expected: &TypedValue,
        actual: Option<TypedValue>,
        status: EngineStatus,
    ) -> Self {
        let passed = status.is_ok() && actual.as_ref() == Some(expected);
        Self {
            variable: variable.to_string(),
            expected: expected.clone(),
            actual,
            status,
            passed,
        }
    }
}

impl fmt::Display for ColumnCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}? ", self.variable, self.expected)?;
        if self.passed {
            return f.write_str("OK");
        }
        let actual = self
            .actual
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<none>".to_string());
        if self.status.is_ok() {
            write!(f, "FAILED (actual: {})", actual)
        } else {
            write!(f, "FAILED (actual: {}, status: {})", actual, self.status)
        }
    }
}

// =============================================================================
// CHECKPOINT REPORT
// =============================================================================

/// All column checks performed at one checkpoint time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointReport {
    pub time: f64,
    pub checks: Vec<ColumnCheck>,
}

impl CheckpointReport {
    /// An empty report; passes vacuously.
    pub fn new(time: f64) -> Self {
        Self {
            time,
            checks: Vec::new(),
        }
    }

    pub fn push(&mut self, check: ColumnCheck) {
        self.checks.push(check);
    }

    /// Conjunction of all column checks.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Checks that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &ColumnCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Comma-separated names of the failing variables.
    pub fn failing_variables(&self) -> String {
        self.failures()
            .map(|c| c.variable.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
