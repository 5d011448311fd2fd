//! Composite Tasks
//!
//! A composite owns a set of subtasks and the connections between them,
//! and runs them as one logical task:
//! - Subtask contracts are folded into the composite's own contract
//! - Connections route one subtask's output into another's input
//! - Subtasks run sequentially, in the order they were added
//! - Composites nest; an inner composite is just another subtask
//!
//! # Ordering
//!
//! Execution order is insertion order, never a topological sort. A
//! connection only delivers a value if its source subtask has already run
//! in the current pass, so producers must be added before consumers. A
//! consumer added first sees only the value supplied by the caller (or
//! fails validation if none was supplied).

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use indexmap::IndexMap;
use log::{debug, warn};

use super::connection::{namespace, strip_prefix, Connection, ResultBuckets};
use super::error::{Result, WiringError};
use super::graph::find_cycle;
use crate::monitoring::{ExecutionObserver, LogObserver, TaskEvent};
use crate::task::{DataMap, Task, TaskDescriptor, TaskFault, TaskResult};

/// A task that orchestrates a fixed set of subtasks and connections.
///
/// # Example
///
/// ```rust
/// use taskmodel::execution::CompositeTask;
/// use taskmodel::task::{DataMap, Task};
/// use taskmodel::tasks::{AddTask, MultiplyTask};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let mut composite = CompositeTask::new("composite", "Add then multiply");
///     composite.add_subtask(AddTask::new("add_task"));
///     composite.add_subtask(MultiplyTask::new("multiply_task"));
///     composite.connect("add_task", "result", "multiply_task", "x")?;
///
///     let input: DataMap = serde_json::from_str(
///         r#"{"add_task.a": 2, "add_task.b": 3, "multiply_task.y": 4}"#,
///     )?;
///     let result = composite.execute(input).await?;
///
///     assert!(result.is_success());
///     assert_eq!(result.data()["multiply_task.result"], 20);
///     Ok(())
/// }
/// ```
pub struct CompositeTask {
    descriptor: TaskDescriptor,
    subtasks: IndexMap<String, Box<dyn Task>>,
    connections: Vec<Connection>,
    observer: Arc<dyn ExecutionObserver>,
}

impl CompositeTask {
    /// Creates an empty composite that reports events to the `log` facade.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            descriptor: TaskDescriptor::new(id, name),
            subtasks: IndexMap::new(),
            connections: Vec::new(),
            observer: Arc::new(LogObserver),
        }
    }

    /// Replaces the observer receiving this composite's events.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn set_observer(&mut self, observer: Arc<dyn ExecutionObserver>) {
        self.observer = observer;
    }

    /// Builder form of [`CompositeTask::add_subtask`].
    pub fn with_subtask(mut self, task: impl Task + 'static) -> Self {
        self.add_subtask(task);
        self
    }

    /// Registers a subtask and folds its contract into the composite's.
    ///
    /// Every input parameter is exposed as `subtask_id.name` with its
    /// optionality and default kept; every output parameter is exposed the
    /// same way but always optional. Registering an id twice replaces the
    /// earlier subtask in place; parameters it declared that the new one
    /// does not remain in the composite's contract.
    pub fn add_subtask(&mut self, task: impl Task + 'static) {
        self.add_boxed_subtask(Box::new(task));
    }

    pub fn add_boxed_subtask(&mut self, task: Box<dyn Task>) {
        let subtask_id = task.id().to_string();

        for param in task.input_parameters() {
            let mut exposed = param.clone();
            exposed.name = param.full_name();
            exposed.task_id = Some(subtask_id.clone());
            self.descriptor.inputs.add(exposed);
        }

        for param in task.output_parameters() {
            let mut exposed = param.clone();
            exposed.name = param.full_name();
            exposed.task_id = Some(subtask_id.clone());
            exposed.optional = true;
            self.descriptor.outputs.add(exposed);
        }

        debug!(
            "[{}] Input params: {:?}",
            self.id(),
            self.descriptor.inputs.keys().collect::<Vec<_>>()
        );
        debug!(
            "[{}] Output params: {:?}",
            self.id(),
            self.descriptor.outputs.keys().collect::<Vec<_>>()
        );

        let replaced = self.subtasks.insert(subtask_id.clone(), task).is_some();
        self.emit(TaskEvent::SubtaskAdded {
            composite: self.id().to_string(),
            subtask: subtask_id,
            replaced,
        });
    }

    /// Routes `from_task`'s output `from_param` into `to_task`'s input
    /// `to_param`.
    ///
    /// Both tasks must be registered subtasks and both parameters must be
    /// declared (by full name) on the respective subtask. On success the
    /// composite's own `to_task.to_param` input becomes optional. Cycles
    /// are reported to the observer but the connection is still kept.
    pub fn connect(
        &mut self,
        from_task: &str,
        from_param: &str,
        to_task: &str,
        to_param: &str,
    ) -> Result<()> {
        debug!(
            "[{}] Attempting to connect {}.{} to {}.{}",
            self.id(),
            from_task,
            from_param,
            to_task,
            to_param
        );

        let source = self
            .subtasks
            .get(from_task)
            .ok_or_else(|| WiringError::UnknownTask(from_task.to_string()))?;
        let target = self
            .subtasks
            .get(to_task)
            .ok_or_else(|| WiringError::UnknownTask(to_task.to_string()))?;

        if !source.output_parameters().declares(from_param) {
            return Err(WiringError::UnknownOutputParameter {
                task: from_task.to_string(),
                parameter: from_param.to_string(),
            });
        }
        if !target.input_parameters().declares(to_param) {
            return Err(WiringError::UnknownInputParameter {
                task: to_task.to_string(),
                parameter: to_param.to_string(),
            });
        }

        let connection = Connection::new(from_task, from_param, to_task, to_param);
        let target_key = connection.target_key();

        if !self.descriptor.inputs.set_optional(&target_key, true) {
            warn!(
                "[{}] {} not found in input parameters, could not make it optional",
                self.id(),
                target_key
            );
        }

        self.emit(TaskEvent::Connected {
            composite: self.id().to_string(),
            from: connection.source_key(),
            to: target_key,
        });
        self.connections.push(connection);

        if let Some(cycle) = self.find_cycle() {
            self.emit(TaskEvent::CycleDetected {
                composite: self.id().to_string(),
                cycle,
            });
        }

        Ok(())
    }

    /// Connections in declaration order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Subtask ids in execution (insertion) order.
    pub fn subtask_ids(&self) -> impl Iterator<Item = &str> {
        self.subtasks.keys().map(String::as_str)
    }

    pub fn subtask(&self, id: &str) -> Option<&dyn Task> {
        self.subtasks.get(id).map(|task| task.as_ref())
    }

    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Returns a cycle in the connection graph, if there is one.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        find_cycle(self.subtask_ids(), &self.connections)
    }

    fn emit(&self, event: TaskEvent) {
        self.observer.on_event(&event);
    }

    /// Builds a subtask's local input: the composite input under its
    /// prefix, overlaid with values routed from subtasks that already ran.
    fn subtask_input(&self, subtask_id: &str, validated: &DataMap, results: &ResultBuckets) -> DataMap {
        let mut input = strip_prefix(subtask_id, validated);

        for connection in self.connections.iter().filter(|c| c.to_task == subtask_id) {
            if let Some(value) = connection.resolve(results) {
                debug!("[{}] Routing {} = {}", self.id(), connection, value);
                input.insert(connection.to_param.clone(), value.clone());
            }
        }

        input
    }

    /// Runs one subtask, converting faults and panics into failed results.
    async fn run_subtask(&self, subtask_id: &str, subtask: &dyn Task, input: DataMap) -> TaskResult {
        let outcome = AssertUnwindSafe(subtask.validate_and_execute(input))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(fault)) => {
                TaskResult::failure(format!("Error in subtask {}: {}", subtask_id, fault))
            }
            Err(payload) => TaskResult::failure(format!(
                "Error in subtask {}: panicked: {}",
                subtask_id,
                panic_message(payload.as_ref())
            )),
        }
    }

    /// Records every value a connection delivered under `to_task.to_param`
    /// in the consumer's bucket, without replacing existing entries.
    fn record_routed_values(&self, results: &mut ResultBuckets) {
        for connection in &self.connections {
            let Some(value) = connection.resolve(results).cloned() else {
                continue;
            };
            results
                .entry(connection.to_task.clone())
                .or_default()
                .entry(connection.target_key())
                .or_insert(value);
        }
    }
}

#[async_trait]
impl Task for CompositeTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    /// Validates the input, runs every subtask in insertion order, then
    /// validates the flattened output.
    ///
    /// Never returns `Err`: validation errors, subtask failures and
    /// subtask faults all come back as a failed [`TaskResult`].
    async fn execute(&self, input: DataMap) -> std::result::Result<TaskResult, TaskFault> {
        let composite = self.id().to_string();
        self.emit(TaskEvent::ExecutionStarted {
            composite: composite.clone(),
        });
        debug!("[{}] Input data: {:?}", composite, input);

        let validated = match self.input_parameters().validate(&input) {
            Ok(validated) => validated,
            Err(e) => {
                self.emit(TaskEvent::InputRejected {
                    composite,
                    error: e.to_string(),
                });
                return Ok(TaskResult::failure(e.to_string()));
            }
        };

        // The composite's own bucket is kept apart from subtask buckets, so
        // a child sharing the composite's id cannot replace it
        let mut results = ResultBuckets::new();

        for (subtask_id, subtask) in &self.subtasks {
            let subtask_input = self.subtask_input(subtask_id, &validated, &results);
            debug!("[{}] Subtask {} input: {:?}", composite, subtask_id, subtask_input);

            self.emit(TaskEvent::SubtaskStarted {
                composite: composite.clone(),
                subtask: subtask_id.clone(),
            });

            let result = self
                .run_subtask(subtask_id, subtask.as_ref(), subtask_input)
                .await;

            if result.is_error() {
                self.emit(TaskEvent::SubtaskFailed {
                    composite,
                    subtask: subtask_id.clone(),
                    error: result.error().unwrap_or_default().to_string(),
                });
                return Ok(result);
            }

            self.emit(TaskEvent::SubtaskCompleted {
                composite: composite.clone(),
                subtask: subtask_id.clone(),
            });
            results.insert(subtask_id.clone(), namespace(subtask_id, result.into_data()));
        }

        self.record_routed_values(&mut results);

        // Later buckets win on key collisions
        let mut output = validated;
        for bucket in results.into_values() {
            output.extend(bucket);
        }
        debug!("[{}] Output data before validation: {:?}", composite, output);

        match self.output_parameters().validate(&output) {
            Ok(validated_output) => {
                self.emit(TaskEvent::ExecutionCompleted { composite });
                Ok(TaskResult::success(validated_output))
            }
            Err(e) => {
                self.emit(TaskEvent::OutputRejected {
                    composite,
                    error: e.to_string(),
                });
                Ok(TaskResult::failure(format!("Output validation failed: {}", e)))
            }
        }
    }
}

impl fmt::Debug for CompositeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeTask")
            .field("id", &self.descriptor.id)
            .field("name", &self.descriptor.name)
            .field("subtasks", &self.subtasks.keys().collect::<Vec<_>>())
            .field("connections", &self.connections)
            .finish()
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{ExecutionTimeline, RecordingObserver};
    use crate::task::{ParamType, Parameter, ParameterSet};
    use crate::tasks::{AddTask, FormatTask, MultiplyTask, StringLengthTask};
    use serde_json::{json, Value};

    fn input(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    /// How a `Troublesome` subtask goes wrong.
    enum Behaviour {
        Fail,
        Fault,
        Panic,
    }

    struct Troublesome {
        descriptor: TaskDescriptor,
        behaviour: Behaviour,
    }

    impl Troublesome {
        fn new(id: &str, behaviour: Behaviour) -> Self {
            Self {
                descriptor: TaskDescriptor::new(id, "Troublesome").with_outputs(
                    ParameterSet::new().with(Parameter::new("done", ParamType::Boolean)),
                ),
                behaviour,
            }
        }
    }

    #[async_trait]
    impl Task for Troublesome {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.descriptor
        }

        async fn execute(&self, _input: DataMap) -> std::result::Result<TaskResult, TaskFault> {
            match self.behaviour {
                Behaviour::Fail => Ok(TaskResult::failure("quota exceeded")),
                Behaviour::Fault => Err("disk on fire".into()),
                Behaviour::Panic => panic!("index out of range"),
            }
        }
    }

    /// Skips its own output validation and reports a string result.
    struct Mistyped {
        descriptor: TaskDescriptor,
    }

    #[async_trait]
    impl Task for Mistyped {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.descriptor
        }

        async fn execute(&self, _input: DataMap) -> std::result::Result<TaskResult, TaskFault> {
            let mut data = DataMap::new();
            data.insert("result".to_string(), json!("not a number"));
            Ok(TaskResult::success(data))
        }

        async fn validate_and_execute(&self, input: DataMap) -> std::result::Result<TaskResult, TaskFault> {
            self.execute(input).await
        }
    }

    fn add_then_multiply() -> CompositeTask {
        let mut composite = CompositeTask::new("composite", "Composite Task");
        composite.add_subtask(AddTask::new("add_task"));
        composite.add_subtask(MultiplyTask::new("multiply_task"));
        composite
    }

    fn started_subtasks(recorder: &RecordingObserver) -> Vec<String> {
        recorder
            .events()
            .into_iter()
            .filter_map(|event| match event {
                TaskEvent::SubtaskStarted { subtask, .. } => Some(subtask),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_add_subtask_derives_contract() {
        let composite = add_then_multiply();

        let inputs: Vec<_> = composite.input_parameters().keys().collect();
        assert_eq!(
            inputs,
            vec!["add_task.a", "add_task.b", "multiply_task.x", "multiply_task.y"]
        );

        let a = composite.input_parameters().get("add_task.a").unwrap();
        assert_eq!(a.name, "a");
        assert_eq!(a.task_id.as_deref(), Some("add_task"));
        assert!(!a.optional);

        let result = composite.output_parameters().get("multiply_task.result").unwrap();
        assert!(result.optional);
        assert_eq!(result.param_type, ParamType::Integer);

        assert_eq!(composite.subtask_ids().collect::<Vec<_>>(), vec!["add_task", "multiply_task"]);
    }

    #[test]
    fn test_connect_marks_target_optional() {
        let mut composite = add_then_multiply();
        assert!(!composite.input_parameters().get("multiply_task.x").unwrap().optional);

        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        assert!(composite.input_parameters().get("multiply_task.x").unwrap().optional);
        assert_eq!(
            composite.connections(),
            &[Connection::new("add_task", "result", "multiply_task", "x")]
        );
        // The subtask's own contract is untouched
        let multiply = composite.subtask("multiply_task").unwrap();
        assert!(!multiply.input_parameters().get("x").unwrap().optional);
    }

    #[test]
    fn test_connect_unknown_task() {
        let mut composite = add_then_multiply();

        let err = composite.connect("ghost", "result", "multiply_task", "x").unwrap_err();
        assert_eq!(err, WiringError::UnknownTask("ghost".to_string()));

        let err = composite.connect("add_task", "result", "ghost", "x").unwrap_err();
        assert_eq!(err, WiringError::UnknownTask("ghost".to_string()));
        assert_eq!(err.to_string(), "Invalid task name: ghost");

        assert!(composite.connections().is_empty());
    }

    #[test]
    fn test_connect_unknown_parameters() {
        let mut composite = add_then_multiply();

        let err = composite
            .connect("add_task", "invalid_output", "multiply_task", "x")
            .unwrap_err();
        assert!(matches!(err, WiringError::UnknownOutputParameter { .. }));

        // Inputs are not outputs
        let err = composite.connect("add_task", "a", "multiply_task", "x").unwrap_err();
        assert!(matches!(err, WiringError::UnknownOutputParameter { .. }));

        let err = composite
            .connect("add_task", "result", "multiply_task", "z")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input parameter: z for task multiply_task"
        );

        assert!(composite.connections().is_empty());
        assert!(!composite.input_parameters().get("multiply_task.x").unwrap().optional);
    }

    #[tokio::test]
    async fn test_sequential_data_flow() {
        let mut composite = add_then_multiply();
        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        let result = composite
            .execute(input(json!({"add_task.a": 2, "add_task.b": 3, "multiply_task.y": 4})))
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.data()["add_task.result"], json!(5));
        assert_eq!(result.data()["multiply_task.result"], json!(20));
    }

    #[tokio::test]
    async fn test_connection_overrides_supplied_value() {
        let mut composite = add_then_multiply();
        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        let result = composite
            .execute(input(json!({
                "add_task.a": 2,
                "add_task.b": 3,
                "multiply_task.x": 4,
                "multiply_task.y": 4
            })))
            .await
            .unwrap();

        assert_eq!(result.data()["multiply_task.result"], json!(20));
    }

    #[tokio::test]
    async fn test_chained_connections() {
        let mut composite = CompositeTask::new("composite", "Composite Task");
        composite.add_subtask(AddTask::new("add_task1"));
        composite.add_subtask(AddTask::new("add_task2"));
        composite.add_subtask(MultiplyTask::new("multiply_task"));
        composite.connect("add_task1", "result", "add_task2", "a").unwrap();
        composite.connect("add_task2", "result", "multiply_task", "x").unwrap();

        let result = composite
            .execute(input(json!({
                "add_task1.a": 2, "add_task1.b": 3,
                "add_task2.a": 0, "add_task2.b": 4,
                "multiply_task.x": 1, "multiply_task.y": 5
            })))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data()["multiply_task.result"], json!(45));
    }

    #[tokio::test]
    async fn test_unconnected_subtasks_run_independently() {
        let composite = add_then_multiply();

        let result = composite
            .execute(input(json!({
                "add_task.a": 2, "add_task.b": 3,
                "multiply_task.x": 4, "multiply_task.y": 5
            })))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data()["add_task.result"], json!(5));
        assert_eq!(result.data()["multiply_task.result"], json!(20));
    }

    #[tokio::test]
    async fn test_consumer_added_before_producer_misses_routed_value() {
        let mut composite = CompositeTask::new("composite", "Out of order");
        composite.add_subtask(MultiplyTask::new("multiply_task"));
        composite.add_subtask(AddTask::new("add_task"));
        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        // The caller's x is used, not the sum
        let result = composite
            .execute(input(json!({
                "add_task.a": 2, "add_task.b": 3,
                "multiply_task.x": 4, "multiply_task.y": 4
            })))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.data()["multiply_task.result"], json!(16));
        assert_eq!(result.data()["add_task.result"], json!(5));

        // Without a caller value the consumer fails validation
        let recorder = Arc::new(RecordingObserver::new());
        composite.set_observer(recorder.clone());
        let result = composite
            .execute(input(json!({"add_task.a": 2, "add_task.b": 3, "multiply_task.y": 4})))
            .await
            .unwrap();
        assert!(result.is_error());
        assert_eq!(result.error(), Some("Missing required parameter: x"));
        assert_eq!(started_subtasks(&recorder), vec!["multiply_task"]);
    }

    #[tokio::test]
    async fn test_bare_names_accepted_as_input() {
        let mut composite = CompositeTask::new("composite", "Bare");
        composite.add_subtask(AddTask::new("add_task"));

        let result = composite
            .execute(input(json!({"a": 1, "b": 2, "unused": "ignored"})))
            .await
            .unwrap();

        assert_eq!(result.data()["add_task.result"], json!(3));
        assert!(!result.data().contains_key("unused"));
    }

    #[tokio::test]
    async fn test_input_validation_failure_runs_nothing() {
        let recorder = Arc::new(RecordingObserver::new());
        let composite = add_then_multiply().with_observer(recorder.clone());

        let result = composite
            .execute(input(json!({"add_task.a": 2, "multiply_task.x": 1, "multiply_task.y": 1})))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(result.error(), Some("Missing required parameter: add_task.b"));
        assert!(started_subtasks(&recorder).is_empty());
        assert!(recorder
            .events()
            .iter()
            .any(|e| matches!(e, TaskEvent::InputRejected { .. })));
    }

    #[tokio::test]
    async fn test_input_type_mismatch() {
        let result = add_then_multiply()
            .execute(input(json!({
                "add_task.a": "2", "add_task.b": 3,
                "multiply_task.x": 1, "multiply_task.y": 1
            })))
            .await
            .unwrap();

        assert!(result.is_error());
        assert!(result.error().unwrap().starts_with("Invalid type for add_task.a"));
    }

    #[tokio::test]
    async fn test_subtask_failure_aborts_remaining() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut composite = CompositeTask::new("composite", "Failing").with_observer(recorder.clone());
        composite.add_subtask(AddTask::new("add_task"));
        composite.add_subtask(Troublesome::new("quota", Behaviour::Fail));
        composite.add_subtask(MultiplyTask::new("multiply_task"));

        let result = composite
            .execute(input(json!({
                "add_task.a": 1, "add_task.b": 1,
                "multiply_task.x": 2, "multiply_task.y": 2
            })))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(result.error(), Some("quota exceeded"));
        assert!(!result.data().contains_key("multiply_task.result"));
        assert_eq!(started_subtasks(&recorder), vec!["add_task", "quota"]);
    }

    #[tokio::test]
    async fn test_subtask_fault_is_converted() {
        let mut composite = add_then_multiply();
        composite.add_subtask(Troublesome::new("faulty", Behaviour::Fault));

        let result = composite
            .execute(input(json!({
                "add_task.a": 1, "add_task.b": 1,
                "multiply_task.x": 2, "multiply_task.y": 2
            })))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(result.error(), Some("Error in subtask faulty: disk on fire"));
    }

    #[tokio::test]
    async fn test_subtask_panic_is_converted() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut composite = CompositeTask::new("composite", "Panicking").with_observer(recorder.clone());
        composite.add_subtask(Troublesome::new("unstable", Behaviour::Panic));
        composite.add_subtask(AddTask::new("add_task"));

        let result = composite
            .execute(input(json!({"add_task.a": 1, "add_task.b": 1})))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(
            result.error(),
            Some("Error in subtask unstable: panicked: index out of range")
        );
        assert_eq!(started_subtasks(&recorder), vec!["unstable"]);
    }

    #[tokio::test]
    async fn test_output_validation_failure() {
        let mut composite = CompositeTask::new("composite", "Mistyped");
        composite.add_subtask(Mistyped {
            descriptor: TaskDescriptor::new("mistyped", "Mistyped").with_outputs(
                ParameterSet::new().with(Parameter::new("result", ParamType::Integer)),
            ),
        });

        let result = composite.execute(DataMap::new()).await.unwrap();

        assert!(result.is_error());
        assert_eq!(
            result.error(),
            Some("Output validation failed: Invalid type for mistyped.result: expected integer, got string")
        );
    }

    #[tokio::test]
    async fn test_nested_composites() {
        let mut inner = CompositeTask::new("inner", "Inner Composite");
        inner.add_subtask(AddTask::new("add_task"));
        inner.add_subtask(MultiplyTask::new("multiply_task"));
        inner.connect("add_task", "result", "multiply_task", "x").unwrap();

        let mut outer = CompositeTask::new("outer", "Outer Composite");
        outer.add_subtask(inner);
        outer.add_subtask(AddTask::new("final_add"));
        outer
            .connect("inner", "multiply_task.result", "final_add", "a")
            .unwrap();

        assert!(outer.input_parameters().declares("inner.add_task.a"));
        assert!(outer.input_parameters().get("inner.multiply_task.x").unwrap().optional);
        assert!(outer.output_parameters().declares("inner.multiply_task.result"));

        let result = outer
            .execute(input(json!({
                "inner.add_task.a": 2,
                "inner.add_task.b": 3,
                "inner.multiply_task.y": 4,
                "final_add.a": 0,
                "final_add.b": 5
            })))
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.data()["inner.add_task.result"], json!(5));
        assert_eq!(result.data()["inner.multiply_task.result"], json!(20));
        assert_eq!(result.data()["final_add.result"], json!(25));
    }

    #[tokio::test]
    async fn test_route_into_nested_composite_input() {
        let mut inner = CompositeTask::new("inner", "Inner");
        inner.add_subtask(AddTask::new("add_task"));

        let mut outer = CompositeTask::new("outer", "Outer");
        outer.add_subtask(AddTask::new("seed"));
        outer.add_subtask(inner);
        outer.add_subtask(StringLengthTask::new("length"));
        outer.add_subtask(FormatTask::new("format"));
        outer.connect("seed", "result", "inner", "add_task.a").unwrap();
        outer.connect("inner", "add_task.result", "format", "value").unwrap();

        assert!(outer.input_parameters().get("inner.add_task.a").unwrap().optional);

        let result = outer
            .execute(input(json!({
                "seed.a": 40, "seed.b": 2,
                "inner.add_task.b": 100,
                "length.text": "abc"
            })))
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.data()["inner.add_task.result"], json!(142));
        assert_eq!(result.data()["format.text"], json!("142"));
        assert_eq!(result.data()["length.length"], json!(3));
    }

    #[tokio::test]
    async fn test_nested_failure_surfaces_in_outer_result() {
        let mut inner = CompositeTask::new("inner", "Inner");
        inner.add_subtask(Troublesome::new("faulty", Behaviour::Fault));

        let mut outer = CompositeTask::new("outer", "Outer");
        outer.add_subtask(inner);
        outer.add_subtask(AddTask::new("after"));

        let result = outer
            .execute(input(json!({"after.a": 1, "after.b": 1})))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(result.error(), Some("Error in subtask faulty: disk on fire"));
    }

    #[tokio::test]
    async fn test_default_used_when_input_absent() {
        let mut composite = CompositeTask::new("composite", "Defaults");
        composite.add_subtask(FormatTask::new("format"));

        let params = composite.input_parameters();
        assert_eq!(params.get("format.prefix").unwrap().default, Some(json!("")));

        let result = composite
            .execute(input(json!({"format.value": true})))
            .await
            .unwrap();
        assert_eq!(result.data()["format.text"], json!("true"));
    }

    #[tokio::test]
    async fn test_routed_values_do_not_leak_into_output() {
        let mut composite = add_then_multiply();
        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        let result = composite
            .execute(input(json!({"add_task.a": 1, "add_task.b": 1, "multiply_task.y": 3})))
            .await
            .unwrap();

        let keys: Vec<_> = result.data().keys().cloned().collect();
        assert_eq!(keys.len(), 2);
        assert!(!result.data().contains_key("multiply_task.x"));
    }

    #[tokio::test]
    async fn test_execution_is_repeatable() {
        let mut composite = add_then_multiply();
        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        for (a, expected) in [(1, 6), (2, 9)] {
            let result = composite
                .execute(input(json!({"add_task.a": a, "add_task.b": 1, "multiply_task.y": 3})))
                .await
                .unwrap();
            assert_eq!(result.data()["multiply_task.result"], json!(expected));
        }
    }

    #[test]
    fn test_cycle_is_reported_but_permitted() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut composite = CompositeTask::new("composite", "Cyclic").with_observer(recorder.clone());
        composite.add_subtask(AddTask::new("first"));
        composite.add_subtask(AddTask::new("second"));

        composite.connect("first", "result", "second", "a").unwrap();
        assert!(composite.find_cycle().is_none());

        composite.connect("second", "result", "first", "a").unwrap();
        assert_eq!(composite.connections().len(), 2);
        assert_eq!(
            composite.find_cycle(),
            Some(vec!["first".to_string(), "second".to_string(), "first".to_string()])
        );

        let cycles: Vec<_> = recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e, TaskEvent::CycleDetected { .. }))
            .collect();
        assert_eq!(cycles.len(), 1);
    }

    #[tokio::test]
    async fn test_cyclic_wiring_still_executes() {
        let mut composite = CompositeTask::new("composite", "Cyclic");
        composite.add_subtask(AddTask::new("first"));
        composite.add_subtask(AddTask::new("second"));
        composite.connect("first", "result", "second", "a").unwrap();
        composite.connect("second", "result", "first", "a").unwrap();

        // first runs before second exists in the results, so it needs a caller value
        let result = composite
            .execute(input(json!({"first.a": 1, "first.b": 2, "second.b": 10})))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data()["first.result"], json!(3));
        assert_eq!(result.data()["second.result"], json!(13));
    }

    #[test]
    fn test_duplicate_subtask_replaces_in_place() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut composite = CompositeTask::new("composite", "Dup").with_observer(recorder.clone());
        composite.add_subtask(AddTask::new("task"));
        composite.add_subtask(MultiplyTask::new("other"));
        composite.add_subtask(MultiplyTask::new("task"));

        assert_eq!(composite.len(), 2);
        assert_eq!(composite.subtask_ids().collect::<Vec<_>>(), vec!["task", "other"]);
        assert_eq!(composite.subtask("task").unwrap().name(), "Multiply two numbers");
        // Stale declarations of the replaced subtask remain
        assert!(composite.input_parameters().declares("task.a"));
        assert!(composite.input_parameters().declares("task.x"));

        assert!(recorder
            .events()
            .iter()
            .any(|e| matches!(e, TaskEvent::SubtaskAdded { replaced: true, .. })));
    }

    #[tokio::test]
    async fn test_timeline_observer_records_subtasks() {
        let timeline = Arc::new(ExecutionTimeline::new());
        let mut composite = add_then_multiply().with_observer(timeline.clone());
        composite.connect("add_task", "result", "multiply_task", "x").unwrap();

        composite
            .execute(input(json!({"add_task.a": 1, "add_task.b": 1, "multiply_task.y": 1})))
            .await
            .unwrap();

        let durations = timeline.get_durations();
        assert!(durations.contains_key("composite.add_task"));
        assert!(durations.contains_key("composite.multiply_task"));
    }

    #[test]
    fn test_empty_composite() {
        let composite = CompositeTask::new("empty", "Empty");
        assert!(composite.is_empty());
        assert!(composite.input_parameters().is_empty());
        assert!(composite.find_cycle().is_none());
        assert!(format!("{:?}", composite).contains("empty"));
    }

    #[tokio::test]
    async fn test_empty_composite_succeeds_with_no_data() {
        let result = CompositeTask::new("empty", "Empty")
            .execute(input(json!({"anything": 1})))
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(result.data().is_empty());
    }

    /// Multiplies `n` by `factor` into a named output, or reports nothing.
    struct Relay {
        descriptor: TaskDescriptor,
        output: String,
        factor: Option<i64>,
    }

    impl Relay {
        fn new(id: &str, output: &str, factor: Option<i64>) -> Self {
            Self {
                descriptor: TaskDescriptor::new(id, "Relay")
                    .with_inputs(ParameterSet::new().with(Parameter::new("n", ParamType::Integer)))
                    .with_outputs(
                        ParameterSet::new().with(Parameter::new(output, ParamType::Integer).optional()),
                    ),
                output: output.to_string(),
                factor,
            }
        }
    }

    #[async_trait]
    impl Task for Relay {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.descriptor
        }

        async fn execute(&self, input: DataMap) -> std::result::Result<TaskResult, TaskFault> {
            let mut data = DataMap::new();
            if let Some(factor) = self.factor {
                let n = input.get("n").and_then(Value::as_i64).ok_or("n is required")?;
                data.insert(self.output.clone(), json!(n * factor));
            }
            Ok(TaskResult::success(data))
        }
    }

    #[tokio::test]
    async fn test_nested_composite_sharing_child_id() {
        let mut inner = CompositeTask::new("add_task", "Inner");
        inner.add_subtask(AddTask::new("add_task"));

        let mut outer = CompositeTask::new("outer", "Outer");
        outer.add_subtask(inner);
        outer.add_subtask(MultiplyTask::new("double"));
        outer
            .connect("add_task", "add_task.result", "double", "x")
            .unwrap();

        assert!(outer.output_parameters().declares("add_task.add_task.result"));

        let result = outer
            .execute(input(json!({
                "add_task.add_task.a": 1,
                "add_task.add_task.b": 2,
                "double.y": 2
            })))
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.data()["add_task.add_task.result"], json!(3));
        assert_eq!(result.data()["double.result"], json!(6));
    }

    #[tokio::test]
    async fn test_child_sharing_composite_id_keeps_input_bucket() {
        let mut composite = CompositeTask::new("relay", "Self-named");
        composite.add_subtask(Relay::new("relay", "n", None));

        let result = composite
            .execute(input(json!({"relay.n": 4})))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data()["relay.n"], json!(4));
    }

    #[tokio::test]
    async fn test_subtask_output_overrides_input_on_collision() {
        let mut composite = CompositeTask::new("composite", "Collision");
        composite.add_subtask(Relay::new("relay", "n", Some(10)));

        let result = composite
            .execute(input(json!({"relay.n": 2})))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data()["relay.n"], json!(20));
    }

    #[tokio::test]
    async fn test_later_subtask_wins_on_key_collision() {
        let mut composite = CompositeTask::new("composite", "Collision");
        // Both report `a.b.value`: one as output `b.value` of `a`, one as
        // output `value` of `a.b`
        composite.add_subtask(Relay::new("a", "b.value", Some(10)));
        composite.add_subtask(Relay::new("a.b", "value", Some(100)));

        let result = composite
            .execute(input(json!({"a.n": 1, "a.b.n": 1})))
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.data()["a.b.value"], json!(100));
    }

    #[tokio::test]
    async fn test_input_bucket_feeds_unproduced_output() {
        let mut composite = CompositeTask::new("composite", "Passthrough");
        composite.add_subtask(Relay::new("relay", "n", None));

        let result = composite
            .execute(input(json!({"relay.n": 7})))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data()["relay.n"], json!(7));
    }
}
