//! Task Contract
//!
//! The polymorphic unit of work. Every task declares an input and an
//! output [`ParameterSet`] and turns a validated input mapping into a
//! [`TaskResult`].

use std::error::Error;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::parameter::ParameterSet;
use super::result::TaskResult;

/// Flat key-value mapping used for task inputs and outputs.
pub type DataMap = Map<String, Value>;

/// An unexpected fault escaping a task's execution.
pub type TaskFault = Box<dyn Error + Send + Sync>;

/// Identity and parameter contract shared by every task.
#[derive(Debug, Clone, Default)]
pub struct TaskDescriptor {
    /// Unique within the immediate parent scope
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub inputs: ParameterSet,
    pub outputs: ParameterSet,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            inputs: ParameterSet::new(),
            outputs: ParameterSet::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: ParameterSet) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: ParameterSet) -> Self {
        self.outputs = outputs;
        self
    }
}

/// A unit of work with a declared parameter contract.
///
/// Leaf tasks report output keyed by their own parameter names (for
/// example `result`); an enclosing [`CompositeTask`] qualifies those keys
/// with the subtask id.
///
/// [`CompositeTask`]: crate::execution::CompositeTask
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use taskmodel::task::{
///     DataMap, ParamType, Parameter, ParameterSet, Task, TaskDescriptor, TaskFault, TaskResult,
/// };
///
/// struct Negate {
///     descriptor: TaskDescriptor,
/// }
///
/// #[async_trait]
/// impl Task for Negate {
///     fn descriptor(&self) -> &TaskDescriptor {
///         &self.descriptor
///     }
///
///     async fn execute(&self, input: DataMap) -> Result<TaskResult, TaskFault> {
///         let value = input.get("value").and_then(|v| v.as_i64()).ok_or("value is required")?;
///         let mut data = DataMap::new();
///         data.insert("result".to_string(), (-value).into());
///         Ok(TaskResult::success(data))
///     }
/// }
///
/// let task = Negate {
///     descriptor: TaskDescriptor::new("negate", "Negate a number")
///         .with_inputs(ParameterSet::new().with(Parameter::new("value", ParamType::Integer)))
///         .with_outputs(ParameterSet::new().with(Parameter::new("result", ParamType::Integer))),
/// };
/// assert_eq!(task.id(), "negate");
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    fn descriptor(&self) -> &TaskDescriptor;

    /// Runs the task on an input mapping.
    ///
    /// A returned `Err` is an unexpected fault; an expected failure is an
    /// `Ok` holding [`TaskResult::failure`].
    async fn execute(&self, input: DataMap) -> Result<TaskResult, TaskFault>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn input_parameters(&self) -> &ParameterSet {
        &self.descriptor().inputs
    }

    fn output_parameters(&self) -> &ParameterSet {
        &self.descriptor().outputs
    }

    /// Validates `input`, executes, then validates successful output.
    ///
    /// Validation failures on either side become failed results rather
    /// than faults.
    async fn validate_and_execute(&self, input: DataMap) -> Result<TaskResult, TaskFault> {
        let validated = match self.input_parameters().validate(&input) {
            Ok(validated) => validated,
            Err(e) => return Ok(TaskResult::failure(e.to_string())),
        };

        let result = self.execute(validated).await?;
        if result.is_error() {
            return Ok(result);
        }

        match self.output_parameters().validate(result.data()) {
            Ok(output) => Ok(TaskResult::success(output)),
            Err(e) => Ok(TaskResult::failure(format!(
                "Output validation failed: {}",
                e
            ))),
        }
    }
}
