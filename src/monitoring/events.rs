//! Execution Events
//!
//! Structured events emitted by composite tasks while they are wired and
//! executed. Events go to an [`ExecutionObserver`] handed to the composite
//! explicitly; there is no process-wide logger registry.

use std::fmt;
use std::sync::Mutex;

use log::{debug, error, info, warn};

/// Something that happened inside a composite task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A subtask was registered; `replaced` is set when the id was taken
    SubtaskAdded {
        composite: String,
        subtask: String,
        replaced: bool,
    },
    /// A connection was recorded (`from` and `to` are qualified names)
    Connected {
        composite: String,
        from: String,
        to: String,
    },
    /// The connection graph contains a cycle (advisory only)
    CycleDetected { composite: String, cycle: Vec<String> },
    ExecutionStarted { composite: String },
    InputRejected { composite: String, error: String },
    SubtaskStarted { composite: String, subtask: String },
    SubtaskCompleted { composite: String, subtask: String },
    SubtaskFailed {
        composite: String,
        subtask: String,
        error: String,
    },
    OutputRejected { composite: String, error: String },
    ExecutionCompleted { composite: String },
}

impl TaskEvent {
    /// Id of the composite that emitted the event.
    pub fn composite(&self) -> &str {
        match self {
            Self::SubtaskAdded { composite, .. }
            | Self::Connected { composite, .. }
            | Self::CycleDetected { composite, .. }
            | Self::ExecutionStarted { composite }
            | Self::InputRejected { composite, .. }
            | Self::SubtaskStarted { composite, .. }
            | Self::SubtaskCompleted { composite, .. }
            | Self::SubtaskFailed { composite, .. }
            | Self::OutputRejected { composite, .. }
            | Self::ExecutionCompleted { composite } => composite,
        }
    }

    /// Id of the subtask the event concerns, if any.
    pub fn subtask(&self) -> Option<&str> {
        match self {
            Self::SubtaskAdded { subtask, .. }
            | Self::SubtaskStarted { subtask, .. }
            | Self::SubtaskCompleted { subtask, .. }
            | Self::SubtaskFailed { subtask, .. } => Some(subtask),
            _ => None,
        }
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubtaskAdded {
                composite,
                subtask,
                replaced: false,
            } => write!(f, "[{}] Added subtask: {}", composite, subtask),
            Self::SubtaskAdded {
                composite,
                subtask,
                replaced: true,
            } => write!(
                f,
                "[{}] Subtask '{}' replaced an existing registration",
                composite, subtask
            ),
            Self::Connected { composite, from, to } => {
                write!(f, "[{}] Connected {} to {}", composite, from, to)
            }
            Self::CycleDetected { composite, cycle } => write!(
                f,
                "[{}] Potential circular connection detected: {}",
                composite,
                cycle.join(" -> ")
            ),
            Self::ExecutionStarted { composite } => {
                write!(f, "[{}] Execution started", composite)
            }
            Self::InputRejected { composite, error } => {
                write!(f, "[{}] Input validation failed: {}", composite, error)
            }
            Self::SubtaskStarted { composite, subtask } => {
                write!(f, "[{}] Starting subtask: {}", composite, subtask)
            }
            Self::SubtaskCompleted { composite, subtask } => {
                write!(f, "[{}] Subtask '{}' completed", composite, subtask)
            }
            Self::SubtaskFailed {
                composite,
                subtask,
                error,
            } => write!(f, "[{}] Subtask '{}' failed: {}", composite, subtask, error),
            Self::OutputRejected { composite, error } => {
                write!(f, "[{}] Output validation failed: {}", composite, error)
            }
            Self::ExecutionCompleted { composite } => {
                write!(f, "[{}] Execution completed", composite)
            }
        }
    }
}

/// Receives events from composite tasks.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &TaskEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ExecutionObserver for LogObserver {
    fn on_event(&self, event: &TaskEvent) {
        match event {
            TaskEvent::CycleDetected { .. } | TaskEvent::SubtaskAdded { replaced: true, .. } => {
                warn!("{}", event)
            }
            TaskEvent::InputRejected { .. }
            | TaskEvent::SubtaskFailed { .. }
            | TaskEvent::OutputRejected { .. } => error!("{}", event),
            TaskEvent::Connected { .. } | TaskEvent::ExecutionCompleted { .. } => {
                info!("{}", event)
            }
            _ => debug!("{}", event),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ExecutionObserver for NullObserver {
    fn on_event(&self, _event: &TaskEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TaskEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_event(&self, event: &TaskEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
