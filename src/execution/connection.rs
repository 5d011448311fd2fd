//! Connections
//!
//! Directed data-flow edges between subtasks and the key arithmetic used
//! to route values along them.
//!
//! # Key Conventions
//!
//! - Subtask results are stored in per-task buckets keyed `{task_id}.{param}`
//! - A nested composite's bucket holds `{inner_id}.{child_id}.{param}`
//! - A dotted task path resolves through the bucket of its first segment

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::DataMap;

/// Per-task result buckets accumulated during one execution, in
/// insertion order.
pub type ResultBuckets = IndexMap<String, DataMap>;

/// Routes `from_task`'s output `from_param` into `to_task`'s input
/// `to_param`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from_task: String,
    pub from_param: String,
    pub to_task: String,
    pub to_param: String,
}

impl Connection {
    pub fn new(
        from_task: impl Into<String>,
        from_param: impl Into<String>,
        to_task: impl Into<String>,
        to_param: impl Into<String>,
    ) -> Self {
        Self {
            from_task: from_task.into(),
            from_param: from_param.into(),
            to_task: to_task.into(),
            to_param: to_param.into(),
        }
    }

    /// Qualified name of the source output (`from_task.from_param`).
    pub fn source_key(&self) -> String {
        qualify(&self.from_task, &self.from_param)
    }

    /// Qualified name of the target input (`to_task.to_param`).
    pub fn target_key(&self) -> String {
        qualify(&self.to_task, &self.to_param)
    }

    /// Reads the source value from the accumulated results, if the source
    /// has produced it.
    pub fn resolve<'a>(&self, results: &'a ResultBuckets) -> Option<&'a Value> {
        lookup(results, &self.from_task, &self.from_param)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_key(), self.target_key())
    }
}

/// Joins a task path and a parameter name with a dot.
pub fn qualify(task_path: &str, name: &str) -> String {
    format!("{}.{}", task_path, name)
}

/// Qualifies every key of a subtask's output with `task_id.`.
///
/// Output keys are the subtask's own declared full names, and the
/// enclosing composite declares each of them as `task_id.{full_name}`, so
/// the prefix is always added, even when a key already starts with it.
pub fn namespace(task_id: &str, data: DataMap) -> DataMap {
    data.into_iter()
        .map(|(key, value)| (qualify(task_id, &key), value))
        .collect()
}

/// Takes every key under `task_id.` from `data`, with the prefix removed.
pub fn strip_prefix(task_id: &str, data: &DataMap) -> DataMap {
    let prefix = format!("{}.", task_id);
    data.iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(&prefix)
                .map(|local| (local.to_string(), value.clone()))
        })
        .collect()
}

/// Looks up `task_path.param` in the accumulated results.
///
/// The bucket is the one registered under `task_path`, or under its first
/// dotted segment when `task_path` addresses a task nested inside a
/// composite subtask.
pub fn lookup<'a>(results: &'a ResultBuckets, task_path: &str, param: &str) -> Option<&'a Value> {
    let bucket = results.get(task_path).or_else(|| {
        let (head, _) = task_path.split_once('.')?;
        results.get(head)
    })?;
    bucket.get(&qualify(task_path, param))
}
