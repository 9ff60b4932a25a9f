//! Time series loaded from delimited text.
//!
//! Both series share one tabular shape: a header row naming the columns, one
//! of which is `time` (matched case-insensitively), followed by one row per
//! step or checkpoint. Input rows stay as raw text and are coerced when they
//! are written; expected-output rows are coerced once, at load time, against
//! the variable catalog.

use crate::catalog::{ModelVariable, VariableCatalog};
use crate::error::CoreError;
use crate::value::{coerce, TypedValue};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Name of the mandatory time column.
pub const TIME_COLUMN: &str = "time";

/// Returns true if `column` names the time column.
pub fn is_time_column(column: &str) -> bool {
    column.eq_ignore_ascii_case(TIME_COLUMN)
}

// =============================================================================
// TABLE READING
// =============================================================================

/// Header plus raw rows, with the time column already parsed.
struct RawTable {
    columns: Vec<String>,
    time_index: usize,
    rows: Vec<(f64, Vec<String>)>,
}

fn read_table<R: Read>(reader: R) -> Result<RawTable, CoreError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(CoreError::configuration("missing header row"));
    }

    for (i, column) in columns.iter().enumerate() {
        if columns[..i].contains(column) {
            return Err(CoreError::configuration(format!("duplicate column '{column}'")));
        }
    }

    let mut time_columns = columns.iter().enumerate().filter(|(_, c)| is_time_column(c));
    let time_index = match (time_columns.next(), time_columns.next()) {
        (Some((index, _)), None) => index,
        (None, _) => {
            return Err(CoreError::configuration(format!(
                "no '{TIME_COLUMN}' column in header"
            )))
        }
        (Some(_), Some(_)) => {
            return Err(CoreError::configuration(format!(
                "more than one '{TIME_COLUMN}' column in header"
            )))
        }
    };

    let mut rows = Vec::new();
    let mut previous: Option<f64> = None;
    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = i + 2;
        let raw_time = record.get(time_index).unwrap_or_default().trim();
        let time: f64 = raw_time
            .parse()
            .ok()
            .filter(|t: &f64| t.is_finite())
            .ok_or_else(|| {
                CoreError::configuration(format!("line {line}: invalid time '{raw_time}'"))
            })?;

        if let Some(prev) = previous {
            if time < prev {
                return Err(CoreError::configuration(format!(
                    "line {line}: time {time} is before previous row's {prev}"
                )));
            }
        }
        previous = Some(time);

        rows.push((time, record.iter().map(str::to_string).collect()));
    }

    Ok(RawTable {
        columns,
        time_index,
        rows,
    })
}

// =============================================================================
// INPUT SERIES
// =============================================================================

/// One row of input: raw text per column, in header order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesRow {
    time: f64,
    cells: Vec<(String, String)>,
}

impl TimeSeriesRow {
    /// Builds a row from column/value pairs; `time` must be one of them.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, CoreError>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let cells: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let raw_time = cells
            .iter()
            .find(|(column, _)| is_time_column(column))
            .map(|(_, value)| value.trim())
            .ok_or_else(|| CoreError::configuration(format!("row has no '{TIME_COLUMN}' cell")))?;
        let time = raw_time
            .parse()
            .map_err(|_| CoreError::configuration(format!("invalid time '{raw_time}'")))?;

        Ok(Self { time, cells })
    }

    /// Simulation time of this row.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Raw value of a column (including `time`).
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// All cells in header order, including `time`.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// Non-time cells in header order.
    pub fn signals(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells().filter(|(c, _)| !is_time_column(c))
    }
}

/// Ordered input rows, one per intended step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputTimeSeries {
    columns: Vec<String>,
    rows: Vec<TimeSeriesRow>,
}

impl InputTimeSeries {
    /// Loads an input series from delimited text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CoreError> {
        let table = read_table(reader)?;
        let rows = table
            .rows
            .into_iter()
            .map(|(time, values)| TimeSeriesRow {
                time,
                cells: table.columns.iter().cloned().zip(values).collect(),
            })
            .collect();

        Ok(Self {
            columns: table.columns,
            rows,
        })
    }

    /// Loads an input series from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Self::from_reader(File::open(path)?)
    }

    /// Builds a series from rows already in memory.
    ///
    /// Fails if times decrease.
    pub fn from_rows(rows: Vec<TimeSeriesRow>) -> Result<Self, CoreError> {
        if let Some(pair) = rows.windows(2).find(|w| w[1].time < w[0].time) {
            return Err(CoreError::configuration(format!(
                "time {} is before previous row's {}",
                pair[1].time, pair[0].time
            )));
        }
        let columns = rows
            .first()
            .map(|r| r.cells.iter().map(|(c, _)| c.clone()).collect())
            .unwrap_or_default();
        Ok(Self { columns, rows })
    }

    /// Header column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TimeSeriesRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&TimeSeriesRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The time column.
    pub fn times(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.time).collect()
    }
}

// =============================================================================
// EXPECTED OUTPUT SERIES
// =============================================================================

/// One expected value at a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedValue {
    pub variable: ModelVariable,
    pub value: TypedValue,
}

/// All expected values at one checkpoint time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedRow {
    pub time: f64,
    pub values: Vec<ExpectedValue>,
}

/// Checkpoints with values typed against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpectedOutputTimeSeries {
    rows: Vec<ExpectedRow>,
}

impl ExpectedOutputTimeSeries {
    /// Loads and types expected outputs.
    ///
    /// Every non-time column must name a catalog variable; an unknown column
    /// fails with [`CoreError::UnknownVariable`] before any row is read.
    pub fn from_reader<R: Read>(reader: R, catalog: &VariableCatalog) -> Result<Self, CoreError> {
        let table = read_table(reader)?;

        let mut variables = Vec::with_capacity(table.columns.len());
        for (i, column) in table.columns.iter().enumerate() {
            if i == table.time_index {
                continue;
            }
            variables.push((i, catalog.resolve(column)?));
        }

        let mut rows = Vec::with_capacity(table.rows.len());
        for (time, cells) in &table.rows {
            let mut values = Vec::with_capacity(variables.len());
            for (i, variable) in &variables {
                let raw = cells.get(*i).map(String::as_str).unwrap_or_default();
                values.push(ExpectedValue {
                    variable: (*variable).clone(),
                    value: coerce(variable, raw)?,
                });
            }
            rows.push(ExpectedRow { time: *time, values });
        }

        Ok(Self { rows })
    }

    /// Loads expected outputs from a file.
    pub fn from_path(path: impl AsRef<Path>, catalog: &VariableCatalog) -> Result<Self, CoreError> {
        Self::from_reader(File::open(path)?, catalog)
    }

    /// An empty series: every step validates vacuously.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the first checkpoint whose time equals `t` exactly.
    pub fn row_at(&self, t: f64) -> Option<&ExpectedRow> {
        self.rows.iter().find(|row| row.time == t)
    }

    pub fn rows(&self) -> &[ExpectedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
