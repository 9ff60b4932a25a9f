//! Lifecycle guard around a single engine instance.
//!
//! `ManagedInstance` owns the engine handle for its whole life and makes
//! sure `terminate` and `dispose` each happen exactly once, whether the
//! strategy finishes, returns early with an error, or unwinds.

use crate::error::DriverError;
use cosim_env::SimulationInstance;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Lifecycle position of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Created,
    Configured,
    Stepping,
    Terminated,
    Disposed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Configured => "configured",
            LifecycleState::Stepping => "stepping",
            LifecycleState::Terminated => "terminated",
            LifecycleState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Exclusively owned engine instance with enforced shutdown.
pub struct ManagedInstance<I: SimulationInstance> {
    name: String,
    inner: Option<I>,
    state: LifecycleState,
}

impl<I: SimulationInstance> ManagedInstance<I> {
    /// Wraps a freshly instantiated engine instance.
    pub fn new(name: impl Into<String>, instance: I) -> Self {
        Self {
            name: name.into(),
            inner: Some(instance),
            state: LifecycleState::Created,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Borrows the engine handle while the instance is still live.
    pub fn engine(&mut self) -> Result<&mut I, DriverError> {
        if self.state >= LifecycleState::Terminated {
            return Err(self.violation("instance is no longer live"));
        }
        let name = &self.name;
        self.inner.as_mut().ok_or_else(|| DriverError::Lifecycle {
            instance: name.clone(),
            message: "instance has been released".to_string(),
        })
    }

    /// Created → Configured.
    pub(crate) fn mark_configured(&mut self) -> Result<(), DriverError> {
        if self.state != LifecycleState::Created {
            return Err(self.violation("initialize called twice"));
        }
        self.state = LifecycleState::Configured;
        Ok(())
    }

    /// Configured → Stepping on the first step; no-op afterwards.
    pub(crate) fn mark_stepping(&mut self) -> Result<(), DriverError> {
        match self.state {
            LifecycleState::Configured => {
                self.state = LifecycleState::Stepping;
                Ok(())
            }
            LifecycleState::Stepping => Ok(()),
            _ => Err(self.violation("step requested before initialize")),
        }
    }

    /// Terminates and disposes the instance.
    ///
    /// Failures are logged and swallowed: release is always attempted in
    /// full and never escalated.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(mut instance) = self.inner.take() else {
            return;
        };

        if self.state < LifecycleState::Terminated {
            if !instance.terminate() {
                warn!(
                    "Terminate of '{}' reported {}",
                    self.name,
                    instance.last_status()
                );
            }
            self.state = LifecycleState::Terminated;
        }

        if let Err(e) = instance.dispose() {
            warn!("Dispose of '{}' failed: {}", self.name, e);
        }
        self.state = LifecycleState::Disposed;
        debug!("Released instance '{}'", self.name);
    }

    fn violation(&self, message: &str) -> DriverError {
        DriverError::Lifecycle {
            instance: self.name.clone(),
            message: format!("{} (state: {})", message, self.state),
        }
    }
}

impl<I: SimulationInstance> Drop for ManagedInstance<I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{EngineCall, FaultPlan, LoopbackEngine, LoopbackModel};
    use cosim_env::CoSimEngine;

    fn engine() -> LoopbackEngine {
        LoopbackEngine::new(LoopbackModel::default()).unwrap()
    }

    fn count(engine: &LoopbackEngine, pred: impl Fn(&EngineCall) -> bool) -> usize {
        engine.call_log().snapshot().iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_release_terminates_and_disposes_once() {
        let engine = engine();
        let mut instance = ManagedInstance::new("a", engine.instantiate(Some("a")).unwrap());
        instance.mark_configured().unwrap();
        instance.mark_stepping().unwrap();

        instance.release();

        assert_eq!(count(&engine, |c| matches!(c, EngineCall::Terminate { .. })), 1);
        assert_eq!(count(&engine, |c| matches!(c, EngineCall::Dispose { .. })), 1);
    }

    #[test]
    fn test_drop_releases() {
        let engine = engine();
        {
            let _instance = ManagedInstance::new("a", engine.instantiate(None).unwrap());
        }

        assert_eq!(count(&engine, |c| matches!(c, EngineCall::Terminate { .. })), 1);
        assert_eq!(count(&engine, |c| matches!(c, EngineCall::Dispose { .. })), 1);
    }

    #[test]
    fn test_release_during_unwind() {
        let engine = engine();
        let log = engine.call_log();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _instance = ManagedInstance::new("a", engine.instantiate(None).unwrap());
            panic!("strategy bug");
        }));

        assert!(result.is_err());
        assert_eq!(log.count(|c| matches!(c, EngineCall::Dispose { .. })), 1);
    }

    #[test]
    fn test_dispose_failure_is_swallowed() {
        let engine = engine().with_faults(FaultPlan {
            failing_dispose: true,
            ..Default::default()
        });
        let instance = ManagedInstance::new("a", engine.instantiate(None).unwrap());

        instance.release();

        assert_eq!(count(&engine, |c| matches!(c, EngineCall::Dispose { .. })), 1);
    }

    #[test]
    fn test_state_transitions() {
        let engine = engine();
        let mut instance = ManagedInstance::new("a", engine.instantiate(None).unwrap());

        assert_eq!(instance.state(), LifecycleState::Created);
        assert!(instance.mark_stepping().is_err());

        instance.mark_configured().unwrap();
        assert!(instance.mark_configured().is_err());

        instance.mark_stepping().unwrap();
        instance.mark_stepping().unwrap();
        assert_eq!(instance.state(), LifecycleState::Stepping);
        assert!(instance.engine().is_ok());
    }
}
