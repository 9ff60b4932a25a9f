//! Step scheduling from input timestamps.

use crate::error::CoreError;
use crate::series::InputTimeSeries;
use serde::{Deserialize, Serialize};

/// One communication step: start time and interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStep {
    /// 0-based step index (= input row index)
    pub index: usize,

    /// Communication point the step starts at
    pub time: f64,

    /// Interval to advance by
    pub step_size: f64,
}

impl ScheduledStep {
    /// Simulation time reached once the step completes.
    pub fn end_time(&self) -> f64 {
        self.time + self.step_size
    }
}

/// Derives step sizes from the gaps between consecutive input rows.
///
/// The last row has no successor, so it reuses the previous interval. A
/// single-row series has no interval at all and gets the fallback step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepScheduler {
    fallback_step: f64,
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self { fallback_step: 0.0 }
    }
}

impl StepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the step size used when the series has a single row.
    pub fn with_fallback_step(mut self, step_size: f64) -> Self {
        self.fallback_step = step_size;
        self
    }

    pub fn fallback_step(&self) -> f64 {
        self.fallback_step
    }

    /// Derives one step per input row.
    pub fn derive(&self, series: &InputTimeSeries) -> Result<Vec<ScheduledStep>, CoreError> {
        self.derive_from_times(&series.times())
    }

    /// Derives one step per timestamp.
    pub fn derive_from_times(&self, times: &[f64]) -> Result<Vec<ScheduledStep>, CoreError> {
        if times.is_empty() {
            return Err(CoreError::EmptySeries);
        }

        let mut steps = Vec::with_capacity(times.len());
        let mut step_size = self.fallback_step;
        for (index, &time) in times.iter().enumerate() {
            if let Some(&next) = times.get(index + 1) {
                step_size = next - time;
            }
            steps.push(ScheduledStep {
                index,
                time,
                step_size,
            });
        }

        Ok(steps)
    }
}

/// Derives a schedule with the default scheduler.
pub fn derive(series: &InputTimeSeries) -> Result<Vec<ScheduledStep>, CoreError> {
    StepScheduler::default().derive(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_step_sizes_are_gaps() {
        let steps = StepScheduler::new().derive_from_times(&[0.0, 0.5, 1.5, 2.0]).unwrap();

        let sizes: Vec<f64> = steps.iter().map(|s| s.step_size).collect();
        assert_eq!(sizes, vec![0.5, 1.0, 0.5, 0.5]);
        assert_eq!(steps[3].index, 3);
        assert_eq!(steps[3].end_time(), 2.5);
    }

    #[test]
    fn test_last_step_carries_previous_interval() {
        let steps = StepScheduler::new().derive_from_times(&[0.0, 0.25, 1.0]).unwrap();

        assert_eq!(steps[2].step_size, steps[1].step_size);
        assert_eq!(steps[2].step_size, 0.75);
    }

    #[test]
    fn test_single_row_uses_fallback() {
        let steps = StepScheduler::new().derive_from_times(&[3.0]).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_size, 0.0);

        let steps = StepScheduler::new()
            .with_fallback_step(0.5)
            .derive_from_times(&[3.0])
            .unwrap();
        assert_eq!(steps[0].step_size, 0.5);
    }

    #[test]
    fn test_empty_series_fails() {
        let err = StepScheduler::new().derive_from_times(&[]).unwrap_err();
        assert!(matches!(err, CoreError::EmptySeries));
    }

    #[test]
    fn test_repeated_timestamps_give_zero_steps() {
        let steps = StepScheduler::new().derive_from_times(&[0.0, 0.0, 1.0]).unwrap();
        assert_eq!(steps[0].step_size, 0.0);
        assert_eq!(steps[1].step_size, 1.0);
    }

    #[test]
    fn test_decimal_grid_is_close() {
        let steps = StepScheduler::new().derive_from_times(&[0.0, 0.1, 0.2, 0.3]).unwrap();

        for step in &steps {
            assert_relative_eq!(step.step_size, 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_derive_from_series() {
        let series = InputTimeSeries::from_reader("time,u\n0,1\n2,1\n".as_bytes()).unwrap();

        let steps = derive(&series).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].time, 2.0);
        assert_eq!(steps[1].step_size, 2.0);
    }
}
