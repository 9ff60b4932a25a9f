//! The co-simulation engine contract consumed by the driver.

use crate::error::EngineError;
use crate::types::{EngineStatus, ValueReference, VariableDescription};

/// A loaded co-simulation component that can describe itself and create
/// running instances.
///
/// # Implementations
///
/// - **Native**: a binding to an FMU-style shared library (not part of this
///   workspace)
/// - **Loopback**: `cosim_sim::LoopbackEngine`, an in-process test double
///
/// An engine is only ever asked for one live instance at a time.
pub trait CoSimEngine {
    /// The instance type produced by [`CoSimEngine::instantiate`].
    type Instance: SimulationInstance;

    /// Returns the engine's self-description: every declared scalar variable.
    fn describe_variables(&self) -> Result<Vec<VariableDescription>, EngineError>;

    /// Creates a fresh instance in the `Created` state.
    ///
    /// # Arguments
    /// * `instance_name` - Optional name, used by engines for logging
    fn instantiate(&self, instance_name: Option<&str>) -> Result<Self::Instance, EngineError>;
}

/// One running instance of a co-simulation engine.
///
/// All calls are blocking. Writes and reads report their outcome through
/// [`SimulationInstance::last_status`]; lifecycle calls and `do_step`
/// additionally return `false` when the engine rejected the call.
///
/// # Lifecycle
///
/// ```text
/// instantiate -> setup_experiment -> enter/exit_initialization_mode
///             -> (write* -> do_step -> read*)* -> terminate -> dispose
/// ```
pub trait SimulationInstance {
    /// Sets up the experiment time frame.
    ///
    /// # Arguments
    /// * `start_time` - Simulation start time
    /// * `stop_time` - Optional stop time
    /// * `tolerance` - Optional solver tolerance
    fn setup_experiment(
        &mut self,
        start_time: f64,
        stop_time: Option<f64>,
        tolerance: Option<f64>,
    ) -> bool;

    /// Enters initialization mode.
    fn enter_initialization_mode(&mut self) -> bool;

    /// Leaves initialization mode; the instance is ready to step.
    fn exit_initialization_mode(&mut self) -> bool;

    fn write_integer(&mut self, vrs: &[ValueReference], values: &[i32]);

    fn write_boolean(&mut self, vrs: &[ValueReference], values: &[bool]);

    fn write_real(&mut self, vrs: &[ValueReference], values: &[f64]);

    fn write_string(&mut self, vrs: &[ValueReference], values: &[String]);

    fn read_integer(&mut self, vrs: &[ValueReference]) -> Vec<i32>;

    fn read_boolean(&mut self, vrs: &[ValueReference]) -> Vec<bool>;

    fn read_real(&mut self, vrs: &[ValueReference]) -> Vec<f64>;

    fn read_string(&mut self, vrs: &[ValueReference]) -> Vec<String>;

    /// Status of the most recent write, read or step.
    fn last_status(&self) -> EngineStatus;

    /// Advances the instance from `current_time` by `step_size`.
    ///
    /// Returns `false` when the step was not completed; check
    /// [`SimulationInstance::last_status`] for the reason.
    fn do_step(&mut self, current_time: f64, step_size: f64) -> bool;

    /// Negotiated shutdown. Must be called exactly once before disposal.
    fn terminate(&mut self) -> bool;

    /// Releases native resources.
    fn dispose(self) -> Result<(), EngineError>
    where
        Self: Sized;
}
