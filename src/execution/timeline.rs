//! Execution Timeline
//!
//! Records task start and finish events during a run for the final
//! per-task timing summary.

use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Task started executing
    Started,
    /// Task completed successfully
    Succeeded,
    /// Task failed
    Failed,
    /// Task was up to date and not executed
    Skipped,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Name of the task
    pub task: String,
    /// Type of event
    pub kind: EventKind,
    /// When the event occurred
    pub at: Instant,
}

/// Tracks task events over the course of a run.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    start: Instant,
}

impl Timeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Records an event for a task.
    pub fn record(&mut self, task: &str, kind: EventKind) {
        self.events.push(TimelineEvent {
            task: task.to_string(),
            kind,
            at: Instant::now(),
        });
    }

    /// Returns all recorded events.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Renders a per-task summary with durations and outcomes.
    pub fn summary(&self) -> String {
        let mut output = String::from("Task summary:\n");
        let mut order: Vec<&str> = Vec::new();
        let mut rows: Vec<(Option<Instant>, &'static str, Option<Duration>)> = Vec::new();

        for event in &self.events {
            let index = match order.iter().position(|t| *t == event.task) {
                Some(i) => i,
                None => {
                    order.push(&event.task);
                    rows.push((None, "pending", None));
                    order.len() - 1
                }
            };

            match event.kind {
                EventKind::Started => rows[index].0 = Some(event.at),
                EventKind::Skipped => rows[index].1 = "up to date",
                EventKind::Succeeded | EventKind::Failed => {
                    rows[index].1 = if event.kind == EventKind::Succeeded {
                        "ok"
                    } else {
                        "FAILED"
                    };
                    if let Some(started) = rows[index].0 {
                        rows[index].2 = Some(event.at.duration_since(started));
                    }
                }
            }
        }

        for (index, task) in order.iter().enumerate() {
            let (_, outcome, duration) = rows[index];
            match duration {
                Some(d) => {
                    output.push_str(&format!("  {:<28} {:<10} {:.2?}\n", task, outcome, d))
                }
                None => output.push_str(&format!("  {:<28} {}\n", task, outcome)),
            }
        }

        output
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
