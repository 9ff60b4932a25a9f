//! In-process loopback engine backed by a deterministic value store.
//!
//! This implements the engine contract using:
//! - A per-instance value store seeded from the declared start values
//! - Routes that move values from inputs to outputs on every `do_step`
//! - A seeded ChaCha8 RNG for random step failures
//! - A shared call log that tests inspect after the engine has moved
//!
//! The model is plain JSON:
//!
//! ```json
//! {
//!   "variables": [
//!     {"name": "u", "type": "Real", "causality": "input",
//!      "variability": "continuous", "value_reference": 1, "start": "0.0"},
//!     {"name": "y", "type": "Real", "causality": "output",
//!      "variability": "continuous", "value_reference": 2}
//!   ],
//!   "routes": [{"kind": "copy", "from": "u", "to": "y"}],
//!   "faults": {"failing_steps": [{"instance": 0, "step": 2}]}
//! }
//! ```

use crate::error::DriverError;
use cosim_core::TypedValue;
use cosim_env::{
    CoSimEngine, EngineError, EngineStatus, SimulationInstance, ValueReference,
    VariableDescription, VariableType,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// MODEL
// =============================================================================

/// How a value moves through the engine on each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// `to = from` (same type)
    Copy { from: String, to: String },

    /// `to += from * step_size` (Real only)
    Accumulate { from: String, to: String },
}

/// A `do_step` that fails: the `step`-th step of the `instance`-th instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepFault {
    pub instance: usize,
    pub step: usize,
}

/// Deterministic faults to inject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultPlan {
    /// Steps that return `false` with status `Error`
    pub failing_steps: Vec<StepFault>,

    /// Instance ordinals whose instantiation fails
    pub failing_instances: Vec<usize>,

    /// Value references whose writes are rejected
    pub failing_writes: Vec<ValueReference>,

    /// Value references whose reads report status `Error`
    pub failing_reads: Vec<ValueReference>,

    /// Lifecycle calls (setup/enter/exit) return `false`
    pub reject_initialization: bool,

    /// `dispose` returns an error
    pub failing_dispose: bool,

    /// Probability that any step fails
    pub step_failure_rate: f64,

    /// Seed for `step_failure_rate`
    pub seed: u64,
}

/// Variables, routes and faults of a loopback engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopbackModel {
    pub variables: Vec<VariableDescription>,

    #[serde(default)]
    pub routes: Vec<Route>,

    #[serde(default)]
    pub faults: FaultPlan,
}

impl LoopbackModel {
    pub fn from_json(text: &str) -> Result<Self, DriverError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a model file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

// =============================================================================
// CALL LOG
// =============================================================================

/// An engine call as seen by the loopback engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    Instantiate { instance: usize, name: Option<String> },
    SetupExperiment {
        instance: usize,
        start_time: f64,
        stop_time: Option<f64>,
        tolerance: Option<f64>,
    },
    EnterInitializationMode { instance: usize },
    ExitInitializationMode { instance: usize },
    Write { instance: usize, vr: ValueReference, value: TypedValue },
    DoStep { instance: usize, time: f64, step_size: f64, ok: bool },
    Terminate { instance: usize },
    Dispose { instance: usize },
}

/// Shared, clonable handle to the engine's call log.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<EngineCall>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<EngineCall>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: EngineCall) {
        self.lock().push(call);
    }

    /// Copy of every call so far, in order.
    pub fn snapshot(&self) -> Vec<EngineCall> {
        self.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.lock().iter().filter(|c| pred(c)).count()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum ResolvedRoute {
    Copy { from: Slot, to: Slot },
    Accumulate { from: Slot, to: Slot },
}

type Slot = (VariableType, ValueReference);

/// In-process engine for tests and dry runs.
pub struct LoopbackEngine {
    variables: Vec<VariableDescription>,
    defaults: Arc<HashMap<Slot, TypedValue>>,
    routes: Arc<Vec<ResolvedRoute>>,
    faults: Arc<FaultPlan>,
    rng: Arc<Mutex<ChaCha8Rng>>,
    instances_created: AtomicUsize,
    log: CallLog,
}

impl LoopbackEngine {
    /// Builds an engine, checking that start values parse and routes
    /// connect declared variables of compatible types.
    pub fn new(model: LoopbackModel) -> Result<Self, EngineError> {
        let mut defaults = HashMap::new();
        let mut by_name = HashMap::new();
        for var in &model.variables {
            let value = match &var.start {
                Some(raw) => TypedValue::parse(var.var_type, raw).ok_or_else(|| {
                    EngineError::description(format!(
                        "start value '{}' of '{}' is not a valid {}",
                        raw, var.name, var.var_type
                    ))
                })?,
                None => zero(var.var_type),
            };
            let slot = (var.var_type, var.value_reference);
            defaults.entry(slot).or_insert(value);
            by_name.insert(var.name.as_str(), slot);
        }

        let lookup = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| EngineError::description(format!("route names unknown variable '{}'", name)))
        };
        let mut routes = Vec::with_capacity(model.routes.len());
        for route in &model.routes {
            let resolved = match route {
                Route::Copy { from, to } => {
                    let (from, to) = (lookup(from)?, lookup(to)?);
                    if from.0 != to.0 {
                        return Err(EngineError::description(format!(
                            "copy route from {} to {}",
                            from.0, to.0
                        )));
                    }
                    ResolvedRoute::Copy { from, to }
                }
                Route::Accumulate { from, to } => {
                    let (from, to) = (lookup(from)?, lookup(to)?);
                    if from.0 != VariableType::Real || to.0 != VariableType::Real {
                        return Err(EngineError::description("accumulate routes need Real variables"));
                    }
                    ResolvedRoute::Accumulate { from, to }
                }
            };
            routes.push(resolved);
        }

        let rng = ChaCha8Rng::seed_from_u64(model.faults.seed);
        Ok(Self {
            variables: model.variables,
            defaults: Arc::new(defaults),
            routes: Arc::new(routes),
            faults: Arc::new(model.faults),
            rng: Arc::new(Mutex::new(rng)),
            instances_created: AtomicUsize::new(0),
            log: CallLog::default(),
        })
    }

    /// Replaces the fault plan (and reseeds the RNG).
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.rng = Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(faults.seed)));
        self.faults = Arc::new(faults);
        self
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Handle to the call log; stays valid after the engine is moved.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    /// Number of instances created so far.
    pub fn instances_created(&self) -> usize {
        self.instances_created.load(Ordering::SeqCst)
    }
}

impl CoSimEngine for LoopbackEngine {
    type Instance = LoopbackInstance;

    fn describe_variables(&self) -> Result<Vec<VariableDescription>, EngineError> {
        Ok(self.variables.clone())
    }

    fn instantiate(&self, instance_name: Option<&str>) -> Result<LoopbackInstance, EngineError> {
        let ordinal = self.instances_created.fetch_add(1, Ordering::SeqCst);
        if self.faults.failing_instances.contains(&ordinal) {
            return Err(EngineError::instantiation(format!(
                "instance #{} refused by fault plan",
                ordinal
            )));
        }

        self.log.push(EngineCall::Instantiate {
            instance: ordinal,
            name: instance_name.map(str::to_string),
        });

        Ok(LoopbackInstance {
            ordinal,
            store: (*self.defaults).clone(),
            routes: Arc::clone(&self.routes),
            faults: Arc::clone(&self.faults),
            failing_steps: self.faults.failing_steps.iter().copied().collect(),
            rng: Arc::clone(&self.rng),
            log: self.log.clone(),
            status: EngineStatus::Ok,
            steps_taken: 0,
            time: 0.0,
        })
    }
}

// =============================================================================
// INSTANCE
// =============================================================================

/// One loopback instance with its own value store.
pub struct LoopbackInstance {
    ordinal: usize,
    store: HashMap<Slot, TypedValue>,
    routes: Arc<Vec<ResolvedRoute>>,
    faults: Arc<FaultPlan>,
    failing_steps: HashSet<StepFault>,
    rng: Arc<Mutex<ChaCha8Rng>>,
    log: CallLog,
    status: EngineStatus,
    steps_taken: usize,
    time: f64,
}

impl LoopbackInstance {
    /// Ordinal of this instance among all instances of its engine.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Simulation time reached by the last successful step.
    pub fn time(&self) -> f64 {
        self.time
    }

    fn lifecycle(&self, call: EngineCall) -> bool {
        self.log.push(call);
        !self.faults.reject_initialization
    }

    fn write_all(&mut self, vrs: &[ValueReference], values: impl IntoIterator<Item = TypedValue>) {
        self.status = EngineStatus::Ok;
        for (&vr, value) in vrs.iter().zip(values) {
            let slot = (value.variable_type(), vr);
            if self.faults.failing_writes.contains(&vr) || !self.store.contains_key(&slot) {
                self.status = EngineStatus::Error;
                continue;
            }
            self.log.push(EngineCall::Write {
                instance: self.ordinal,
                vr,
                value: value.clone(),
            });
            self.store.insert(slot, value);
        }
    }

    fn read_all<T: Default>(
        &mut self,
        var_type: VariableType,
        vrs: &[ValueReference],
        extract: impl Fn(&TypedValue) -> Option<T>,
    ) -> Vec<T> {
        self.status = EngineStatus::Ok;
        let mut out = Vec::with_capacity(vrs.len());
        for &vr in vrs {
            if self.faults.failing_reads.contains(&vr) {
                self.status = EngineStatus::Error;
            }
            match self.store.get(&(var_type, vr)).and_then(&extract) {
                Some(value) => out.push(value),
                None => {
                    self.status = EngineStatus::Error;
                    out.push(T::default());
                }
            }
        }
        out
    }

    fn injected_step_failure(&self) -> bool {
        let scheduled = self.failing_steps.contains(&StepFault {
            instance: self.ordinal,
            step: self.steps_taken,
        });
        if scheduled {
            return true;
        }
        if self.faults.step_failure_rate <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen::<f64>() < self.faults.step_failure_rate
    }

    fn apply_routes(&mut self, step_size: f64) {
        for route in self.routes.iter() {
            match *route {
                ResolvedRoute::Copy { from, to } => {
                    if let Some(value) = self.store.get(&from).cloned() {
                        self.store.insert(to, value);
                    }
                }
                ResolvedRoute::Accumulate { from, to } => {
                    let rate = self.store.get(&from).and_then(TypedValue::as_real).unwrap_or(0.0);
                    let acc = self.store.get(&to).and_then(TypedValue::as_real).unwrap_or(0.0);
                    self.store.insert(to, TypedValue::Real(acc + rate * step_size));
                }
            }
        }
    }
}

impl SimulationInstance for LoopbackInstance {
    fn setup_experiment(&mut self, start_time: f64, stop_time: Option<f64>, tolerance: Option<f64>) -> bool {
        self.time = start_time;
        self.lifecycle(EngineCall::SetupExperiment {
            instance: self.ordinal,
            start_time,
            stop_time,
            tolerance,
        })
    }

    fn enter_initialization_mode(&mut self) -> bool {
        self.lifecycle(EngineCall::EnterInitializationMode { instance: self.ordinal })
    }

    fn exit_initialization_mode(&mut self) -> bool {
        self.lifecycle(EngineCall::ExitInitializationMode { instance: self.ordinal })
    }

    fn write_integer(&mut self, vrs: &[ValueReference], values: &[i32]) {
        self.write_all(vrs, values.iter().map(|&v| TypedValue::Integer(v)));
    }

    fn write_boolean(&mut self, vrs: &[ValueReference], values: &[bool]) {
        self.write_all(vrs, values.iter().map(|&v| TypedValue::Boolean(v)));
    }

    fn write_real(&mut self, vrs: &[ValueReference], values: &[f64]) {
        self.write_all(vrs, values.iter().map(|&v| TypedValue::Real(v)));
    }

    fn write_string(&mut self, vrs: &[ValueReference], values: &[String]) {
        self.write_all(vrs, values.iter().map(|v| TypedValue::String(v.clone())));
    }

    fn read_integer(&mut self, vrs: &[ValueReference]) -> Vec<i32> {
        self.read_all(VariableType::Integer, vrs, TypedValue::as_integer)
    }

    fn read_boolean(&mut self, vrs: &[ValueReference]) -> Vec<bool> {
        self.read_all(VariableType::Boolean, vrs, TypedValue::as_boolean)
    }

    fn read_real(&mut self, vrs: &[ValueReference]) -> Vec<f64> {
        self.read_all(VariableType::Real, vrs, TypedValue::as_real)
    }

    fn read_string(&mut self, vrs: &[ValueReference]) -> Vec<String> {
        self.read_all(VariableType::String, vrs, |v| v.as_str().map(str::to_string))
    }

    fn last_status(&self) -> EngineStatus {
        self.status
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> bool {
        let ok = !self.injected_step_failure();
        self.steps_taken += 1;
        self.log.push(EngineCall::DoStep {
            instance: self.ordinal,
            time: current_time,
            step_size,
            ok,
        });

        if !ok {
            self.status = EngineStatus::Error;
            return false;
        }
        self.apply_routes(step_size);
        self.time = current_time + step_size;
        self.status = EngineStatus::Ok;
        true
    }

    fn terminate(&mut self) -> bool {
        self.log.push(EngineCall::Terminate { instance: self.ordinal });
        true
    }

    fn dispose(self) -> Result<(), EngineError> {
        self.log.push(EngineCall::Dispose { instance: self.ordinal });
        if self.faults.failing_dispose {
            return Err(EngineError::release(format!("instance #{} leaked", self.ordinal)));
        }
        Ok(())
    }
}

fn zero(var_type: VariableType) -> TypedValue {
    match var_type {
        VariableType::Integer => TypedValue::Integer(0),
        VariableType::Boolean => TypedValue::Boolean(false),
        VariableType::Real => TypedValue::Real(0.0),
        VariableType::String => TypedValue::String(String::new()),
    }
}
