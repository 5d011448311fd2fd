//! TaskModel - Composable Units of Work
//!
//! A typed task model: every task declares named, typed inputs and
//! outputs, and composite tasks wire subtasks together into pipelines
//! that behave like a single task.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`task`]: Parameters, validation, results and the `Task` trait
//! - [`execution`]: Composite tasks, connections and cycle detection
//! - [`monitoring`]: Execution events, observers and the timeline
//! - [`tasks`]: Small leaf tasks used to build example pipelines
//!
//! # Example
//!
//! ```rust
//! use taskmodel::{CompositeTask, DataMap, Task};
//! use taskmodel::tasks::{AddTask, MultiplyTask};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut inner = CompositeTask::new("inner", "Add then multiply");
//!     inner.add_subtask(AddTask::new("add_task"));
//!     inner.add_subtask(MultiplyTask::new("multiply_task"));
//!     inner.connect("add_task", "result", "multiply_task", "x")?;
//!
//!     let mut outer = CompositeTask::new("outer", "Pipeline");
//!     outer.add_subtask(inner);
//!     outer.add_subtask(AddTask::new("final_add"));
//!     outer.connect("inner", "multiply_task.result", "final_add", "a")?;
//!
//!     let input: DataMap = serde_json::from_str(
//!         r#"{"inner.add_task.a": 2, "inner.add_task.b": 3,
//!             "inner.multiply_task.y": 4, "final_add.b": 5}"#,
//!     )?;
//!     let result = outer.execute(input).await?;
//!     assert_eq!(result.data()["final_add.result"], 25);
//!     Ok(())
//! }
//! ```

pub mod execution;
pub mod monitoring;
pub mod task;
pub mod tasks;

// Re-export commonly used types
pub use execution::{CompositeTask, Connection, WiringError};
pub use monitoring::{ExecutionObserver, TaskEvent};
pub use task::{
    load_input, DataMap, ParamType, Parameter, ParameterSet, Task, TaskResult, ValidationError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "TaskModel";
