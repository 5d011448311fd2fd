//! Example Leaf Tasks
//!
//! Small computations that satisfy the [`Task`](crate::task::Task)
//! contract. They carry no engine logic and exist to build pipelines in
//! tests and in the demo binary.

pub mod arithmetic;
pub mod text;

pub use arithmetic::{AddTask, MultiplyTask};
pub use text::{FormatTask, StringLengthTask};

use serde_json::Value;

use crate::task::{DataMap, TaskFault};

/// Reads a validated integer input.
fn integer_input(input: &DataMap, name: &str) -> Result<i64, TaskFault> {
    input
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("Input '{}' is not an integer", name).into())
}

/// Builds a single-entry output mapping.
fn single_output(name: &str, value: impl Into<Value>) -> DataMap {
    let mut data = DataMap::new();
    data.insert(name.to_string(), value.into());
    data
}
