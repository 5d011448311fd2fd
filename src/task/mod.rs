//! Task Contract Module
//!
//! Provides the building blocks every task is made of: parameter
//! declarations and validation, the result envelope, and the `Task`
//! trait itself.
//!
//! # Structure
//!
//! - [`parameter`]: Parameter, ParamType, ParameterSet and validation
//! - [`result`]: TaskResult success/failure envelope
//! - [`base`]: Task trait and TaskDescriptor
//! - [`input`]: Loading input mappings from YAML/JSON files

pub mod base;
pub mod input;
pub mod parameter;
pub mod result;

pub use base::{DataMap, Task, TaskDescriptor, TaskFault};
pub use input::{load_input, InputError};
pub use parameter::{value_kind, ParamType, Parameter, ParameterSet, ValidationError};
pub use result::TaskResult;
