//! Task Results
//!
//! Success/failure envelope returned by every task execution.

use std::fmt;

use serde::Serialize;

use super::base::DataMap;

/// Outcome of a single task execution.
///
/// Constructed only through [`TaskResult::success`] or
/// [`TaskResult::failure`], so an error message is present exactly when
/// the result is a failure.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TaskResult {
    success: bool,
    #[serde(skip_serializing_if = "DataMap::is_empty")]
    data: DataMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TaskResult {
    /// A successful result carrying `data` (which may be empty).
    pub fn success(data: DataMap) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// A failed result with a human-readable message.
    pub fn failure(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Task failed".to_string();
        }
        Self {
            success: false,
            data: DataMap::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    /// Output data; empty for failures.
    pub fn data(&self) -> &DataMap {
        &self.data
    }

    pub fn into_data(self) -> DataMap {
        self.data
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "success ({} values)", self.data.len()),
            Some(error) => write!(f, "failure: {}", error),
        }
    }
}
