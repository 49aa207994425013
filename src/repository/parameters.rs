//! Query method parameters and their binding to named statement parameters.

use super::conversion::{sql_type_for, ColumnTypes, ParameterType, ValueConverter};
use crate::executor::LifeError;
use may_postgres::types::Type;
use sea_query::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const PARAMETER_NEEDS_TO_BE_NAMED: &str = "For queries with named parameters you need to provide names for method parameters. \
     Retain parameter names when building the query method metadata, or give each parameter an explicit name with Parameter::named.";

/// One declared parameter of a query method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    index: usize,
    name: Option<String>,
    parameter_type: ParameterType,
    bindable: bool,
}

impl Parameter {
    /// A bindable parameter referenced as `:name` in the query.
    pub fn named(index: usize, name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            index,
            name: Some(name.into()),
            parameter_type,
            bindable: true,
        }
    }

    /// A bindable parameter whose name was not retained.
    pub fn unnamed(index: usize, parameter_type: ParameterType) -> Self {
        Self {
            index,
            name: None,
            parameter_type,
            bindable: true,
        }
    }

    /// A parameter the repository infrastructure consumes itself; it is never bound.
    pub fn reserved(index: usize, parameter_type: ParameterType) -> Self {
        Self {
            index,
            name: None,
            parameter_type,
            bindable: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.parameter_type
    }

    pub fn is_bindable(&self) -> bool {
        self.bindable
    }
}

/// Value bound under a name, with the SQL type chosen by the converter.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub value: Value,
    pub sql_type: Option<Type>,
}

/// Named parameters of one statement execution. Built per call, never shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParameters {
    values: HashMap<String, NamedValue>,
}

impl NamedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` under `name`, replacing an earlier value of that name.
    pub fn add_value(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(name.into(), NamedValue { value, sql_type: None });
        self
    }

    /// Add `value` under `name` together with the SQL type it must be bound as.
    pub fn add_typed_value(&mut self, name: impl Into<String>, value: Value, sql_type: Type) -> &mut Self {
        self.values.insert(
            name.into(),
            NamedValue {
                value,
                sql_type: Some(sql_type),
            },
        );
        self
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&NamedValue> {
        self.values.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|v| &v.value)
    }

    pub fn sql_type(&self, name: &str) -> Option<&Type> {
        self.values.get(name).and_then(|v| v.sql_type.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turns positional method arguments into [`NamedParameters`].
#[derive(Clone)]
pub struct ParameterBinder {
    parameters: Vec<Parameter>,
    converter: Arc<dyn ValueConverter>,
}

impl ParameterBinder {
    pub fn new(parameters: Vec<Parameter>, converter: Arc<dyn ValueConverter>) -> Self {
        Self { parameters, converter }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn bindable_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_bindable())
    }

    /// Bind `arguments` (indexed by parameter position) to a fresh parameter set.
    pub fn bind(&self, arguments: &[Value]) -> Result<NamedParameters, LifeError> {
        let mut parameters = NamedParameters::new();

        for parameter in self.bindable_parameters() {
            let value = arguments.get(parameter.index()).cloned().ok_or_else(|| {
                LifeError::Binding(format!(
                    "No argument at position {} ({} arguments supplied)",
                    parameter.index(),
                    arguments.len()
                ))
            })?;
            self.convert_and_add_parameter(&mut parameters, parameter, value)?;
        }

        Ok(parameters)
    }

    fn convert_and_add_parameter(
        &self,
        parameters: &mut NamedParameters,
        parameter: &Parameter,
        value: Value,
    ) -> Result<(), LifeError> {
        let name = parameter
            .name()
            .ok_or_else(|| LifeError::Configuration(PARAMETER_NEEDS_TO_BE_NAMED.to_string()))?;

        let target = ColumnTypes::resolve_primitive_type(parameter.parameter_type());
        let converted = self
            .converter
            .to_database_value(value, target, sql_type_for(target))?;

        match converted.sql_type {
            Some(sql_type) => parameters.add_typed_value(name, converted.value, sql_type),
            None => parameters.add_value(name, converted.value),
        };

        Ok(())
    }
}
