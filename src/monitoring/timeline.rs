//! Execution Timeline
//!
//! Observer that tracks subtask start/end times for timing reports and
//! Gantt charts. Subtasks are labelled `composite.subtask`, so a single
//! timeline can watch nested composites.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::events::{ExecutionObserver, TaskEvent};

/// Type of timeline event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    /// Subtask started executing
    Started,
    /// Subtask completed successfully
    Completed,
    /// Subtask failed
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Qualified subtask label (`composite.subtask`)
    pub task_id: String,
    pub event_type: EventType,
    /// Monotonic time, used for durations
    pub timestamp: Instant,
    /// Wall-clock time, used for reporting
    pub recorded_at: DateTime<Utc>,
}

/// Tracks the execution timeline of composite runs.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskmodel::execution::CompositeTask;
/// use taskmodel::monitoring::ExecutionTimeline;
///
/// let timeline = Arc::new(ExecutionTimeline::new());
/// let _composite = CompositeTask::new("pipeline", "Pipeline").with_observer(timeline.clone());
/// assert!(timeline.get_events().is_empty());
/// ```
#[derive(Debug)]
pub struct ExecutionTimeline {
    events: Mutex<Vec<TimelineEvent>>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a subtask.
    pub fn add_event(&self, task_id: impl Into<String>, event_type: EventType) {
        self.lock().push(TimelineEvent {
            task_id: task_id.into(),
            event_type,
            timestamp: Instant::now(),
            recorded_at: Utc::now(),
        });
    }

    /// Returns a snapshot of all recorded events.
    pub fn get_events(&self) -> Vec<TimelineEvent> {
        self.lock().clone()
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Wall-clock time of the first recorded event.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().first().map(|event| event.recorded_at)
    }

    /// Returns subtask durations in milliseconds.
    ///
    /// Subtasks that started but never finished are left out.
    pub fn get_durations(&self) -> HashMap<String, u128> {
        let mut starts: HashMap<String, u128> = HashMap::new();
        let mut durations: HashMap<String, u128> = HashMap::new();

        for event in self.lock().iter() {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();

            match event.event_type {
                EventType::Started => {
                    starts.insert(event.task_id.clone(), elapsed);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = starts.get(&event.task_id) {
                        durations.insert(event.task_id.clone(), elapsed - start);
                    }
                }
            }
        }

        durations
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each subtask is shown as a bar indicating when it ran relative to
    /// the total time, with failed subtasks drawn in `x`.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.elapsed().as_millis();
        let events = self.lock();
        let Some(first) = events.first() else {
            return output;
        };
        output.push_str(&format!(
            "Started at {}\n\n",
            first.recorded_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
        ));

        // Scale to 50 characters width
        let scale = 50.0 / total_time.max(1) as f64;

        // task -> (start, end, failed)
        let mut task_times: Vec<(String, u128, Option<u128>, bool)> = Vec::new();

        for event in events.iter() {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();

            match event.event_type {
                EventType::Started => {
                    task_times.push((event.task_id.clone(), elapsed, None, false));
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(entry) = task_times
                        .iter_mut()
                        .rev()
                        .find(|(id, _, end, _)| *id == event.task_id && end.is_none())
                    {
                        entry.2 = Some(elapsed);
                        entry.3 = event.event_type == EventType::Failed;
                    }
                }
            }
        }

        for (task_id, start, end, failed) in task_times {
            let Some(end) = end else {
                continue;
            };

            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;
            let mark = if failed { "x" } else { "#" };

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&mark.repeat(width));

            output.push_str(&format!(
                "{:20} |{}| ({} ms)\n",
                truncate(&task_id, 20),
                bar,
                end - start
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TimelineEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionObserver for ExecutionTimeline {
    fn on_event(&self, event: &TaskEvent) {
        let event_type = match event {
            TaskEvent::SubtaskStarted { .. } => EventType::Started,
            TaskEvent::SubtaskCompleted { .. } => EventType::Completed,
            TaskEvent::SubtaskFailed { .. } => EventType::Failed,
            _ => return,
        };

        if let Some(subtask) = event.subtask() {
            self.add_event(format!("{}.{}", event.composite(), subtask), event_type);
        }
    }
}

/// Truncates a string to a maximum length, padding shorter ones.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
