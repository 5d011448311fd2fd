//! Input Mapping Loader
//!
//! Reads a flat input mapping for a task from a YAML or JSON file.
//!
//! # Example YAML Format
//!
//! ```yaml
//! inner.add_task.a: 2
//! inner.add_task.b: 3
//! inner.multiply_task.y: 4
//! final_add.b: 5
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_json::Value;
use thiserror::Error;

use super::base::DataMap;

/// Errors raised while loading an input mapping.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read input file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML input: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Input must be a mapping of parameter names to values, got {0}")]
    NotAMapping(&'static str),
}

/// Loads an input mapping from `path`.
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
/// An empty file yields an empty mapping.
///
/// ```rust,no_run
/// use taskmodel::task::load_input;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let input = load_input("input.yaml")?;
///     println!("Loaded {} values", input.len());
///     Ok(())
/// }
/// ```
pub fn load_input(path: impl AsRef<Path>) -> Result<DataMap, InputError> {
    let path = path.as_ref();
    info!("Loading input from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!("Input content loaded ({} bytes)", content.len());

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json_input(&content)
    } else {
        parse_yaml_input(&content)
    }
}

/// Parses a JSON object into an input mapping.
pub fn parse_json_input(content: &str) -> Result<DataMap, InputError> {
    if content.trim().is_empty() {
        return Ok(DataMap::new());
    }
    into_mapping(serde_json::from_str(content)?)
}

/// Parses a YAML mapping into an input mapping.
pub fn parse_yaml_input(content: &str) -> Result<DataMap, InputError> {
    if content.trim().is_empty() {
        return Ok(DataMap::new());
    }
    into_mapping(serde_yaml::from_str(content)?)
}

fn into_mapping(value: Value) -> Result<DataMap, InputError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(DataMap::new()),
        other => Err(InputError::NotAMapping(crate::task::value_kind(&other))),
    }
}
