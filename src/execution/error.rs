//! Wiring error types raised synchronously by `CompositeTask::connect`.

use thiserror::Error;

/// Malformed wiring between subtasks of a composite.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WiringError {
    #[error("Invalid task name: {0}")]
    UnknownTask(String),

    #[error("Invalid output parameter: {parameter} for task {task}")]
    UnknownOutputParameter { task: String, parameter: String },

    #[error("Invalid input parameter: {parameter} for task {task}")]
    UnknownInputParameter { task: String, parameter: String },
}

pub type Result<T> = std::result::Result<T, WiringError>;
