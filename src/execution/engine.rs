//! Run Engine
//!
//! Drives the active task graph to completion: walks the plan in
//! dependency order, skips tasks whose artifacts are current, executes the
//! rest and touches their sentinels, and stops the run on the first
//! failure. Sentinels from earlier successes are never rolled back, so a
//! subsequent run resumes after the last completed task.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::graph::model::{Action, CategoryMode, InternalOp, Invocation, Task};
use crate::graph::registry::ExecutionPlan;
use crate::graph::staleness::is_stale;

use super::invoke::{self, resolve_path, InvokeError, TableError};
use super::pool;
use super::timeline::{EventKind, Timeline};

/// Default number of concurrent fan-out instances.
const DEFAULT_MAX_PARALLEL: usize = 4;

/// Errors raised while executing the plan.
#[derive(Debug, Error)]
pub enum ExecError {
    /// An external invocation of the task failed.
    #[error("task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: InvokeError,
    },

    /// A fan-out task could not discover its categories.
    #[error("task '{task}': cannot expand categories: {source}")]
    FanOut {
        task: String,
        #[source]
        source: TableError,
    },

    /// An in-process operation failed.
    #[error("task '{task}': {message}")]
    Internal { task: String, message: String },

    /// An artifact path could not be prepared or touched.
    #[error("I/O failure for artifact '{}': {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Executes the in-process operations a plan may contain.
///
/// Implemented by the pipeline layer; tests substitute lightweight stubs.
pub trait InternalRunner {
    fn run(
        &self,
        op: InternalOp,
        task: &Task,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Lifecycle state of a task during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for its dependencies
    Pending,
    /// Dependencies satisfied, about to be inspected
    Ready,
    /// Currently executing
    Running,
    /// Executed and completed
    Succeeded,
    /// Execution failed
    Failed,
    /// Artifacts were current, nothing executed
    Skipped,
}

/// Counts for a completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    /// Tasks that actually executed.
    pub executed: usize,
    /// Tasks skipped because their artifacts were current.
    pub skipped: usize,
}

/// Plan execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use coexflow::config;
/// use coexflow::execution::Engine;
/// use coexflow::pipeline;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = config::load(Path::new("."))?;
///     config.validate_inputs()?;
///
///     let plan = pipeline::build(&config)?.resolve()?;
///     let internals = pipeline::report::Internals::new(config, ".");
///
///     let mut engine = Engine::new(plan);
///     engine.set_max_parallel(8);
///     engine.run(&internals)?;
///     Ok(())
/// }
/// ```
pub struct Engine {
    plan: ExecutionPlan,
    dry_run: bool,
    max_parallel: usize,
    working_dir: Option<PathBuf>,
    states: HashMap<String, TaskState>,
    timeline: Timeline,
}

impl Engine {
    /// Creates an engine for a resolved plan.
    pub fn new(plan: ExecutionPlan) -> Self {
        let states = plan
            .tasks()
            .iter()
            .map(|t| (t.name.clone(), TaskState::Pending))
            .collect();

        Self {
            plan,
            dry_run: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
            working_dir: None,
            states,
            timeline: Timeline::new(),
        }
    }

    /// Enables or disables dry run mode.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Sets the bound on concurrent fan-out instances.
    pub fn set_max_parallel(&mut self, max: usize) {
        self.max_parallel = max;
    }

    /// Sets the directory task artifacts and commands are relative to.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    /// Current state of a task, if it is part of the plan.
    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).copied()
    }

    /// Timeline of the most recent run.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Executes the plan.
    ///
    /// Tasks run strictly in dependency order; a task only starts after
    /// every task it depends on has succeeded or was already current. The
    /// first failure aborts the run, leaving downstream tasks pending.
    pub fn run(&mut self, internals: &dyn InternalRunner) -> Result<RunSummary, ExecError> {
        let tasks: Vec<Task> = self.plan.tasks().to_vec();
        let mut summary = RunSummary::default();

        info!(
            "Starting run: {} tasks (max parallel: {}, dry run: {})",
            tasks.len(),
            self.max_parallel,
            self.dry_run
        );

        for task in &tasks {
            self.set_state(&task.name, TaskState::Ready);

            let resolved = self.resolve_artifacts(task);

            if !is_stale(&resolved) {
                debug!("Task '{}' is up to date", task.name);
                self.set_state(&task.name, TaskState::Skipped);
                self.timeline.record(&task.name, EventKind::Skipped);
                summary.skipped += 1;
                continue;
            }

            self.set_state(&task.name, TaskState::Running);
            self.timeline.record(&task.name, EventKind::Started);
            info!("Starting task: {}", task.name);

            if self.dry_run {
                self.print_dry_run(task);
                self.set_state(&task.name, TaskState::Succeeded);
                self.timeline.record(&task.name, EventKind::Succeeded);
                summary.executed += 1;
                continue;
            }

            let outcome = self
                .prepare_output_dirs(&resolved)
                .and_then(|_| self.execute_action(task, internals))
                .and_then(|_| self.touch_sentinel(&resolved));

            match outcome {
                Ok(()) => {
                    self.set_state(&task.name, TaskState::Succeeded);
                    self.timeline.record(&task.name, EventKind::Succeeded);
                    summary.executed += 1;
                    info!("Task '{}' completed", task.name);
                }
                Err(e) => {
                    self.set_state(&task.name, TaskState::Failed);
                    self.timeline.record(&task.name, EventKind::Failed);
                    error!("Task '{}' failed: {}", task.name, e);
                    return Err(e);
                }
            }
        }

        info!(
            "Run finished: {} executed, {} up to date",
            summary.executed, summary.skipped
        );

        Ok(summary)
    }

    fn set_state(&mut self, name: &str, state: TaskState) {
        self.states.insert(name.to_string(), state);
    }

    /// Returns a copy of the task with artifact paths resolved against the
    /// working directory, for filesystem checks performed by the engine.
    fn resolve_artifacts(&self, task: &Task) -> Task {
        let mut resolved = task.clone();
        resolved.inputs = task
            .inputs
            .iter()
            .map(|p| resolve_path(p, &self.working_dir))
            .collect();
        resolved.outputs = task
            .outputs
            .iter()
            .map(|p| resolve_path(p, &self.working_dir))
            .collect();
        resolved.sentinel = resolve_path(&task.sentinel, &self.working_dir);
        resolved
    }

    /// Creates the parent directories of every declared output.
    fn prepare_output_dirs(&self, resolved: &Task) -> Result<(), ExecError> {
        for output in &resolved.outputs {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).map_err(|e| ExecError::Artifact {
                        path: output.clone(),
                        source: e,
                    })?;
                    debug!("Created directory: {}", parent.display());
                }
            }
        }
        Ok(())
    }

    fn execute_action(
        &self,
        task: &Task,
        internals: &dyn InternalRunner,
    ) -> Result<(), ExecError> {
        match &task.action {
            Action::Exec(invocations) => {
                for invocation in invocations {
                    invoke::run(invocation, &self.working_dir).map_err(|e| {
                        ExecError::TaskFailed {
                            task: task.name.clone(),
                            source: e,
                        }
                    })?;
                }
                Ok(())
            }

            Action::Categorised {
                table,
                column,
                template,
                mode,
            } => {
                let table_path = resolve_path(table, &self.working_dir);
                let values = invoke::distinct_column_values(&table_path, column).map_err(|e| {
                    ExecError::FanOut {
                        task: task.name.clone(),
                        source: e,
                    }
                })?;

                if values.is_empty() {
                    warn!(
                        "Task '{}': no categories found in {}",
                        task.name,
                        table.display()
                    );
                    return Ok(());
                }

                match mode {
                    CategoryMode::Joined => {
                        let invocation = template.for_categories(&values);
                        invoke::run(&invocation, &self.working_dir).map_err(|e| {
                            ExecError::TaskFailed {
                                task: task.name.clone(),
                                source: e,
                            }
                        })
                    }
                    CategoryMode::PerValue => {
                        info!(
                            "Task '{}': expanding into {} instances",
                            task.name,
                            values.len()
                        );

                        let instances: Vec<Invocation> =
                            values.iter().map(|v| template.for_category(v)).collect();

                        let results =
                            pool::run_concurrently(instances, self.max_parallel, &self.working_dir);

                        for (_, result) in results {
                            result.map_err(|e| ExecError::TaskFailed {
                                task: task.name.clone(),
                                source: e,
                            })?;
                        }
                        Ok(())
                    }
                }
            }

            Action::Internal(op) => internals.run(*op, task).map_err(|e| ExecError::Internal {
                task: task.name.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Touches the completion marker after a successful execution.
    fn touch_sentinel(&self, resolved: &Task) -> Result<(), ExecError> {
        File::create(&resolved.sentinel).map_err(|e| ExecError::Artifact {
            path: resolved.sentinel.clone(),
            source: e,
        })?;
        debug!("Touched sentinel: {}", resolved.sentinel.display());
        Ok(())
    }

    fn print_dry_run(&self, task: &Task) {
        println!();
        println!("[DRY RUN] Task: {}", task.name);
        match &task.action {
            Action::Exec(invocations) => {
                for invocation in invocations {
                    println!("  Command: {}", invocation.command_line());
                    println!("  Log: {}", invocation.log.display());
                }
            }
            Action::Categorised {
                table,
                column,
                template,
                ..
            } => {
                println!(
                    "  Per-category template ({} column of {}):",
                    column,
                    table.display()
                );
                println!("  Command: {}", template.command_line());
            }
            Action::Internal(op) => {
                println!("  Internal: {:?}", op);
            }
        }
    }
}
