//! Variable Catalog - read-only index of a model's declared variables.
//!
//! Built once from an engine's self-description and shared (behind an
//! `Arc`) by everything that needs to translate a column or parameter name
//! into a typed value reference.

use crate::error::CoreError;
use crate::value::{coerce, TypedValue};
use cosim_env::{Causality, ValueReference, Variability, VariableDescription, VariableType};
use serde::Serialize;
use std::collections::BTreeMap;

/// A declared model variable with its default typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVariable {
    pub name: String,
    pub var_type: VariableType,
    pub causality: Causality,
    pub variability: Variability,
    pub value_reference: ValueReference,
    /// Declared start value, coerced to `var_type`
    pub default: Option<TypedValue>,
}

impl ModelVariable {
    /// True for variables that initial parameter values may be applied to:
    /// causality `parameter` with variability `fixed` or `tunable`.
    pub fn is_writable_parameter(&self) -> bool {
        self.causality == Causality::Parameter
            && matches!(self.variability, Variability::Fixed | Variability::Tunable)
    }
}

/// Name-indexed, immutable set of model variables.
#[derive(Debug, Clone, Default)]
pub struct VariableCatalog {
    variables: BTreeMap<String, ModelVariable>,
}

impl VariableCatalog {
    /// Builds a catalog from an engine self-description.
    ///
    /// Fails with [`CoreError::Description`] for an empty or duplicate name
    /// or a start value that does not parse as the declared type. Several
    /// names may share a value reference (aliases).
    pub fn build<I>(descriptions: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = VariableDescription>,
    {
        let mut variables = BTreeMap::new();

        for desc in descriptions {
            if desc.name.trim().is_empty() {
                return Err(CoreError::description(format!(
                    "variable with {} has an empty name",
                    desc.value_reference
                )));
            }
            if variables.contains_key(&desc.name) {
                return Err(CoreError::description(format!(
                    "variable '{}' is declared more than once",
                    desc.name
                )));
            }

            let mut variable = ModelVariable {
                name: desc.name.clone(),
                var_type: desc.var_type,
                causality: desc.causality,
                variability: desc.variability,
                value_reference: desc.value_reference,
                default: None,
            };
            if let Some(start) = &desc.start {
                let default = coerce(&variable, start).map_err(|e| {
                    CoreError::description(format!("bad start value: {e}"))
                })?;
                variable.default = Some(default);
            }

            variables.insert(desc.name, variable);
        }

        Ok(Self { variables })
    }

    /// Looks a variable up by name.
    pub fn resolve(&self, name: &str) -> Result<&ModelVariable, CoreError> {
        self.variables
            .get(name)
            .ok_or_else(|| CoreError::unknown_variable(name))
    }

    /// Looks a variable up by name without failing.
    pub fn get(&self, name: &str) -> Option<&ModelVariable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// All variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelVariable> {
        self.variables.values()
    }

    /// Variables with the given causality, in name order.
    pub fn with_causality(&self, causality: Causality) -> impl Iterator<Item = &ModelVariable> {
        self.iter().filter(move |v| v.causality == causality)
    }

    /// Parameters that accept initial values, in name order.
    pub fn writable_parameters(&self) -> impl Iterator<Item = &ModelVariable> {
        self.iter().filter(|v| v.is_writable_parameter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions() -> Vec<VariableDescription> {
        vec![
            VariableDescription::new("v_ref", VariableType::Real, Causality::Parameter, Variability::Fixed, 1)
                .with_start("10.0"),
            VariableDescription::new("gain", VariableType::Integer, Causality::Parameter, Variability::Tunable, 2)
                .with_start("3"),
            VariableDescription::new("pi", VariableType::Real, Causality::Parameter, Variability::Constant, 3)
                .with_start("3.14"),
            VariableDescription::new("u", VariableType::Real, Causality::Input, Variability::Continuous, 4),
            VariableDescription::new("y", VariableType::Real, Causality::Output, Variability::Continuous, 5),
        ]
    }

    #[test]
    fn test_build_types_defaults() {
        let catalog = VariableCatalog::build(descriptions()).unwrap();

        assert_eq!(catalog.len(), 5);
        let v_ref = catalog.resolve("v_ref").unwrap();
        assert_eq!(v_ref.default, Some(TypedValue::Real(10.0)));
        assert_eq!(v_ref.value_reference, ValueReference(1));
        assert_eq!(catalog.resolve("gain").unwrap().default, Some(TypedValue::Integer(3)));
        assert_eq!(catalog.resolve("u").unwrap().default, None);
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let catalog = VariableCatalog::build(descriptions()).unwrap();

        let err = catalog.resolve("missing").unwrap_err();
        assert!(matches!(err, CoreError::UnknownVariable(name) if name == "missing"));
    }

    #[test]
    fn test_writable_parameters_excludes_constants() {
        let catalog = VariableCatalog::build(descriptions()).unwrap();

        let names: Vec<&str> = catalog.writable_parameters().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["gain", "v_ref"]);
    }

    #[test]
    fn test_duplicate_name_is_description_error() {
        let mut descs = descriptions();
        descs.push(VariableDescription::new("u", VariableType::Real, Causality::Input, Variability::Continuous, 9));

        assert!(matches!(VariableCatalog::build(descs), Err(CoreError::Description(_))));
    }

    #[test]
    fn test_bad_start_value_is_description_error() {
        let descs = vec![
            VariableDescription::new("flag", VariableType::Boolean, Causality::Parameter, Variability::Fixed, 1)
                .with_start("maybe"),
        ];

        assert!(matches!(VariableCatalog::build(descs), Err(CoreError::Description(_))));
    }

    #[test]
    fn test_aliases_may_share_value_reference() {
        let descs = vec![
            VariableDescription::new("a", VariableType::Real, Causality::Output, Variability::Continuous, 1),
            VariableDescription::new("a_alias", VariableType::Real, Causality::Local, Variability::Continuous, 1),
        ];

        let catalog = VariableCatalog::build(descs).unwrap();
        assert_eq!(catalog.with_causality(Causality::Output).count(), 1);
    }
}
