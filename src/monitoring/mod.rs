//! Execution Monitoring Module
//!
//! Structured events emitted by composite tasks and the observers that
//! consume them.
//!
//! # Components
//!
//! - [`ExecutionObserver`]: Receiver for [`TaskEvent`]s
//! - [`LogObserver`]: Default observer forwarding events to `log`
//! - [`ExecutionTimeline`]: Subtask start/end timing for Gantt charts

pub mod events;
pub mod timeline;

pub use events::{ExecutionObserver, LogObserver, NullObserver, RecordingObserver, TaskEvent};
pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
