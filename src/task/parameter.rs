//! Parameter Contracts
//!
//! Declarations of the named, typed values a task consumes or produces,
//! and validation of raw key-value mappings against those declarations.
//!
//! # Key Conventions
//!
//! - A parameter owned by a subtask is addressed as `{task_id}.{name}`
//! - Validated mappings are always keyed by full (qualified) name
//! - Lookups fall back to the bare name (last dotted segment)

use std::fmt;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::base::DataMap;

/// Closed set of value types a parameter may declare.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Any value, including null
    Any,
    Boolean,
    /// Whole numbers (signed or unsigned)
    Integer,
    /// Non-integral numbers only
    Float,
    /// Either integers or floats
    Number,
    String,
    List,
    Map,
}

impl ParamType {
    /// Returns true if `value` satisfies this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Float, Value::Number(n)) => n.is_f64(),
            (Self::Number, Value::Number(_)) => true,
            (Self::String, Value::String(_)) => true,
            (Self::List, Value::Array(_)) => true,
            (Self::Map, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// Describes the runtime kind of a value for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Errors produced while validating a mapping against a [`ParameterSet`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid type for {name}: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        actual: String,
    },
}

/// A single declared input or output of a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Local name (unqualified for leaf tasks)
    pub name: String,

    /// Type the value must satisfy
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Documentation only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Substituted when the parameter is required and absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default)]
    pub optional: bool,

    /// Owning subtask, set when the parameter is exposed by a composite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Parameter {
    /// Creates a required parameter with no default.
    ///
    /// # Example
    ///
    /// ```
    /// use taskmodel::task::{ParamType, Parameter};
    ///
    /// let param = Parameter::new("count", ParamType::Integer)
    ///     .with_description("How many items")
    ///     .owned_by("loader");
    /// assert_eq!(param.full_name(), "loader.count");
    /// ```
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: String::new(),
            default: None,
            optional: false,
            task_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Marks the parameter as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets the owning task id, which qualifies the full name.
    pub fn owned_by(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Returns `task_id.name` when owned, otherwise `name`.
    pub fn full_name(&self) -> String {
        match &self.task_id {
            Some(task_id) => format!("{}.{}", task_id, self.name),
            None => self.name.clone(),
        }
    }

    /// Returns the last dotted segment of the full name.
    pub fn local_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Default value, ignoring an explicit null.
    fn usable_default(&self) -> Option<&Value> {
        self.default.as_ref().filter(|v| !v.is_null())
    }
}

/// A mapping from full name to [`Parameter`].
///
/// Insertion order is kept so diagnostics list parameters the way they
/// were declared. Serialized as a list of parameters; deserializing keys
/// each entry by its full name again.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(from = "Vec<Parameter>", into = "Vec<Parameter>")]
pub struct ParameterSet {
    parameters: IndexMap<String, Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter under its full name, replacing any previous one.
    pub fn add(&mut self, param: Parameter) {
        self.parameters.insert(param.full_name(), param);
    }

    /// Builder form of [`ParameterSet::add`].
    pub fn with(mut self, param: Parameter) -> Self {
        self.add(param);
        self
    }

    /// Looks up a parameter by full name, then by bare name.
    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.parameters
            .get(key)
            .or_else(|| self.parameters.values().find(|p| p.name == key))
    }

    /// Looks up a parameter by exact full name.
    pub fn get_mut(&mut self, full_name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(full_name)
    }

    /// Returns true if a parameter is stored under exactly this full name.
    pub fn declares(&self, full_name: &str) -> bool {
        self.parameters.contains_key(full_name)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Flips the optional flag of the parameter stored under `full_name`.
    ///
    /// Returns false if no such parameter exists.
    pub fn set_optional(&mut self, full_name: &str, optional: bool) -> bool {
        match self.parameters.get_mut(full_name) {
            Some(param) => {
                param.optional = optional;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    /// Full names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Copies every declaration of `other` into this set.
    pub fn merge(&mut self, other: &ParameterSet) {
        for param in other.iter() {
            self.add(param.clone());
        }
    }

    /// Validates `data` against the declared parameters.
    ///
    /// Values are looked up by full name first, then by bare name. The
    /// result is keyed by full name. Undeclared keys are dropped, absent
    /// optional parameters are omitted, and absent required parameters
    /// take their default when one exists.
    pub fn validate(&self, data: &DataMap) -> Result<DataMap, ValidationError> {
        let mut validated = DataMap::new();

        for (full_name, param) in &self.parameters {
            let value = data
                .get(full_name.as_str())
                .or_else(|| data.get(param.local_name()));

            let Some(value) = value else {
                if param.optional {
                    continue;
                }
                match param.usable_default() {
                    Some(default) => {
                        debug!("Using default for {}: {}", full_name, default);
                        validated.insert(full_name.clone(), default.clone());
                        continue;
                    }
                    None => return Err(ValidationError::MissingParameter(full_name.clone())),
                }
            };

            if !param.param_type.matches(value) {
                return Err(ValidationError::TypeMismatch {
                    name: full_name.clone(),
                    expected: param.param_type,
                    actual: value_kind(value).to_string(),
                });
            }

            validated.insert(full_name.clone(), value.clone());
        }

        Ok(validated)
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for param in iter {
            set.add(param);
        }
        set
    }
}

impl From<Vec<Parameter>> for ParameterSet {
    fn from(params: Vec<Parameter>) -> Self {
        params.into_iter().collect()
    }
}

impl From<ParameterSet> for Vec<Parameter> {
    fn from(set: ParameterSet) -> Self {
        set.parameters.into_values().collect()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = indexmap::map::Values<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.values()
    }
}
