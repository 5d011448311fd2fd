//! Integer arithmetic tasks.

use async_trait::async_trait;

use super::{integer_input, single_output};
use crate::task::{DataMap, ParamType, Parameter, ParameterSet, Task, TaskDescriptor, TaskFault, TaskResult};

/// Adds `a` and `b` into `result`.
pub struct AddTask {
    descriptor: TaskDescriptor,
}

impl AddTask {
    pub fn new(id: impl Into<String>) -> Self {
        let descriptor = TaskDescriptor::new(id, "Add two numbers")
            .with_inputs(
                ParameterSet::new()
                    .with(Parameter::new("a", ParamType::Integer).with_description("First number"))
                    .with(Parameter::new("b", ParamType::Integer).with_description("Second number")),
            )
            .with_outputs(
                ParameterSet::new()
                    .with(Parameter::new("result", ParamType::Integer).with_description("Sum of a and b")),
            );
        Self { descriptor }
    }
}

impl Default for AddTask {
    fn default() -> Self {
        Self::new("add_task")
    }
}

#[async_trait]
impl Task for AddTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: DataMap) -> Result<TaskResult, TaskFault> {
        let a = integer_input(&input, "a")?;
        let b = integer_input(&input, "b")?;
        let sum = a
            .checked_add(b)
            .ok_or_else(|| format!("Integer overflow adding {} and {}", a, b))?;
        Ok(TaskResult::success(single_output("result", sum)))
    }
}

/// Multiplies `x` and `y` into `result`.
pub struct MultiplyTask {
    descriptor: TaskDescriptor,
}

impl MultiplyTask {
    pub fn new(id: impl Into<String>) -> Self {
        let descriptor = TaskDescriptor::new(id, "Multiply two numbers")
            .with_inputs(
                ParameterSet::new()
                    .with(Parameter::new("x", ParamType::Integer).with_description("First number"))
                    .with(Parameter::new("y", ParamType::Integer).with_description("Second number")),
            )
            .with_outputs(
                ParameterSet::new().with(
                    Parameter::new("result", ParamType::Integer).with_description("Product of x and y"),
                ),
            );
        Self { descriptor }
    }
}

impl Default for MultiplyTask {
    fn default() -> Self {
        Self::new("multiply_task")
    }
}

#[async_trait]
impl Task for MultiplyTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: DataMap) -> Result<TaskResult, TaskFault> {
        let x = integer_input(&input, "x")?;
        let y = integer_input(&input, "y")?;
        let product = x
            .checked_mul(y)
            .ok_or_else(|| format!("Integer overflow multiplying {} and {}", x, y))?;
        Ok(TaskResult::success(single_output("result", product)))
    }
}
