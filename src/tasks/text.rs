//! Text tasks.

use async_trait::async_trait;
use serde_json::Value;

use super::single_output;
use crate::task::{DataMap, ParamType, Parameter, ParameterSet, Task, TaskDescriptor, TaskFault, TaskResult};

/// Counts the characters of `text` into `length`.
pub struct StringLengthTask {
    descriptor: TaskDescriptor,
}

impl StringLengthTask {
    pub fn new(id: impl Into<String>) -> Self {
        let descriptor = TaskDescriptor::new(id, "Get string length")
            .with_inputs(
                ParameterSet::new()
                    .with(Parameter::new("text", ParamType::String).with_description("Input text")),
            )
            .with_outputs(
                ParameterSet::new()
                    .with(Parameter::new("length", ParamType::Integer).with_description("Length of text")),
            );
        Self { descriptor }
    }
}

impl Default for StringLengthTask {
    fn default() -> Self {
        Self::new("string_length_task")
    }
}

#[async_trait]
impl Task for StringLengthTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: DataMap) -> Result<TaskResult, TaskFault> {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .ok_or("Input 'text' is not a string")?;
        Ok(TaskResult::success(single_output("length", text.chars().count())))
    }
}

/// Renders any `value` as `text`, with an optional `prefix`.
///
/// Strings are used as they are; other values are rendered as JSON.
pub struct FormatTask {
    descriptor: TaskDescriptor,
}

impl FormatTask {
    pub fn new(id: impl Into<String>) -> Self {
        let descriptor = TaskDescriptor::new(id, "Format a value as text")
            .with_inputs(
                ParameterSet::new()
                    .with(Parameter::new("value", ParamType::Any).with_description("Value to render"))
                    .with(
                        Parameter::new("prefix", ParamType::String)
                            .with_description("Text placed before the value")
                            .with_default(""),
                    ),
            )
            .with_outputs(
                ParameterSet::new()
                    .with(Parameter::new("text", ParamType::String).with_description("Rendered text")),
            );
        Self { descriptor }
    }
}

impl Default for FormatTask {
    fn default() -> Self {
        Self::new("format_task")
    }
}

#[async_trait]
impl Task for FormatTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: DataMap) -> Result<TaskResult, TaskFault> {
        let value = input.get("value").ok_or("Input 'value' is missing")?;
        let prefix = input.get("prefix").and_then(Value::as_str).unwrap_or_default();

        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(TaskResult::success(single_output(
            "text",
            format!("{}{}", prefix, rendered),
        )))
    }
}
