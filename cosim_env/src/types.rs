//! Common types describing a co-simulation model and engine status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque handle identifying a variable to the engine.
///
/// Independent of the variable's name; two variables of different types may
/// share the same numeric reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueReference(pub u32);

impl ValueReference {
    /// Returns the raw reference number.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ValueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vr#{}", self.0)
    }
}

/// Status reported by the engine after a write, read or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    #[default]
    Ok,
    Warning,
    Discard,
    Error,
    Fatal,
    Pending,
}

impl EngineStatus {
    /// Returns true only for [`EngineStatus::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, EngineStatus::Ok)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStatus::Ok => "OK",
            EngineStatus::Warning => "WARNING",
            EngineStatus::Discard => "DISCARD",
            EngineStatus::Error => "ERROR",
            EngineStatus::Fatal => "FATAL",
            EngineStatus::Pending => "PENDING",
        };
        f.write_str(name)
    }
}

/// Declared scalar type of a model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Integer,
    Boolean,
    Real,
    String,
}

impl VariableType {
    /// Returns the type name as used in model descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Integer => "Integer",
            VariableType::Boolean => "Boolean",
            VariableType::Real => "Real",
            VariableType::String => "String",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" | "int" => Ok(VariableType::Integer),
            "boolean" | "bool" => Ok(VariableType::Boolean),
            "real" | "float" | "double" => Ok(VariableType::Real),
            "string" => Ok(VariableType::String),
            _ => Err(format!("Unknown variable type: {}", s)),
        }
    }
}

/// Declared role of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Causality {
    Parameter,
    CalculatedParameter,
    Input,
    Output,
    Local,
    Independent,
    Unknown,
}

impl Causality {
    /// Returns the causality name as used in model descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            Causality::Parameter => "parameter",
            Causality::CalculatedParameter => "calculatedParameter",
            Causality::Input => "input",
            Causality::Output => "output",
            Causality::Local => "local",
            Causality::Independent => "independent",
            Causality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Causality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Causality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parameter" => Ok(Causality::Parameter),
            "calculatedparameter" | "calculated_parameter" => Ok(Causality::CalculatedParameter),
            "input" => Ok(Causality::Input),
            "output" => Ok(Causality::Output),
            "local" => Ok(Causality::Local),
            "independent" => Ok(Causality::Independent),
            "unknown" => Ok(Causality::Unknown),
            _ => Err(format!("Unknown causality: {}", s)),
        }
    }
}

/// Declared time dependency of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variability {
    Constant,
    Fixed,
    Tunable,
    Discrete,
    Continuous,
}

impl Variability {
    /// Returns the variability name as used in model descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            Variability::Constant => "constant",
            Variability::Fixed => "fixed",
            Variability::Tunable => "tunable",
            Variability::Discrete => "discrete",
            Variability::Continuous => "continuous",
        }
    }
}

impl fmt::Display for Variability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "constant" => Ok(Variability::Constant),
            "fixed" => Ok(Variability::Fixed),
            "tunable" => Ok(Variability::Tunable),
            "discrete" => Ok(Variability::Discrete),
            "continuous" => Ok(Variability::Continuous),
            _ => Err(format!("Unknown variability: {}", s)),
        }
    }
}

/// One scalar variable as declared by the engine's self-description.
///
/// The declared start value is kept as text; it is typed when the catalog
/// is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescription {
    /// Variable name (unique within a model)
    pub name: String,

    /// Scalar type
    #[serde(rename = "type")]
    pub var_type: VariableType,

    pub causality: Causality,

    pub variability: Variability,

    /// Engine-side handle
    pub value_reference: ValueReference,

    /// Declared start value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
}

impl VariableDescription {
    /// Creates a description without a start value.
    pub fn new(
        name: &str,
        var_type: VariableType,
        causality: Causality,
        variability: Variability,
        value_reference: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            var_type,
            causality,
            variability,
            value_reference: ValueReference(value_reference),
            start: None,
        }
    }

    /// Sets the declared start value.
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }
}
