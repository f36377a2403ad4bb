//! Task Registry and Dependency Resolution
//!
//! Holds the statically declared task set, derives dependency edges from
//! artifact paths and produces a topologically ordered execution plan for
//! the active subgraph.
//!
//! Tasks are added through explicit [`TaskRegistry::register`] calls, so
//! graph construction is deterministic and testable. Two tasks may declare
//! the same output when they are configuration-selected alternatives;
//! resolution enforces that exactly one of them is active per run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use super::model::Task;

/// Structural errors raised while building or resolving the graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A task name was registered twice.
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    /// An active task consumes an artifact no active task produces.
    #[error("task '{task}': input '{}' is not produced by any active task", .input.display())]
    UnresolvedDependency { task: String, input: PathBuf },

    /// An either/or alternative has zero or several active producers.
    #[error(
        "output '{}' has {active} active producers among [{}]; \
         exactly one alternative must be selected",
        .output.display(),
        .candidates.join(", ")
    )]
    AmbiguousSelection {
        output: PathBuf,
        candidates: Vec<String>,
        active: usize,
    },

    /// The declared dependencies contain a loop.
    #[error("the task graph contains a dependency cycle")]
    CyclicDependency,
}

/// The complete set of declared tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task definition.
    pub fn register(&mut self, task: Task) -> Result<(), GraphError> {
        if self.index.contains_key(&task.name) {
            return Err(GraphError::DuplicateTask(task.name));
        }

        debug!(
            "Registered task '{}' ({} inputs, {} outputs, active: {})",
            task.name,
            task.inputs.len(),
            task.outputs.len(),
            task.active
        );

        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Looks up a task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// All registered tasks, active or not, in registration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolves dependency edges and returns the active subgraph in
    /// topological order.
    ///
    /// Edges are derived by exact path matching: a task depends on the
    /// producer of each of its declared inputs. Checks performed here:
    ///
    /// - every output consumed by an active task has exactly one active
    ///   producer,
    /// - no output is claimed by two simultaneously active tasks,
    /// - the active subgraph is acyclic.
    pub fn resolve(&self) -> Result<ExecutionPlan, GraphError> {
        // Map each output path to every task claiming it.
        let mut producers: HashMap<&PathBuf, Vec<usize>> = HashMap::new();
        for (i, task) in self.tasks.iter().enumerate() {
            for output in &task.outputs {
                producers.entry(output).or_default().push(i);
            }
        }

        // Alternatives must never be active together, consumed or not.
        for (output, claimants) in &producers {
            let active: Vec<&usize> = claimants
                .iter()
                .filter(|&&i| self.tasks[i].active)
                .collect();
            if active.len() > 1 {
                return Err(GraphError::AmbiguousSelection {
                    output: (*output).clone(),
                    candidates: claimants.iter().map(|&i| self.tasks[i].name.clone()).collect(),
                    active: active.len(),
                });
            }
        }

        // Derive edges for active consumers.
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        for task in self.tasks.iter().filter(|t| t.active) {
            let mut deps: Vec<String> = Vec::new();

            for input in &task.inputs {
                let Some(claimants) = producers.get(input) else {
                    return Err(GraphError::UnresolvedDependency {
                        task: task.name.clone(),
                        input: input.clone(),
                    });
                };

                let active: Vec<usize> = claimants
                    .iter()
                    .copied()
                    .filter(|&i| self.tasks[i].active)
                    .collect();

                match active.as_slice() {
                    [producer] => {
                        let name = &self.tasks[*producer].name;
                        if name != &task.name {
                            deps.push(name.clone());
                        }
                    }
                    [] if claimants.len() > 1 => {
                        return Err(GraphError::AmbiguousSelection {
                            output: input.clone(),
                            candidates: claimants
                                .iter()
                                .map(|&i| self.tasks[i].name.clone())
                                .collect(),
                            active: 0,
                        });
                    }
                    _ => {
                        return Err(GraphError::UnresolvedDependency {
                            task: task.name.clone(),
                            input: input.clone(),
                        });
                    }
                }
            }

            deps.sort();
            deps.dedup();
            debug!("Task '{}' depends on: {:?}", task.name, deps);
            dependencies.insert(task.name.clone(), deps);
        }

        let order = self.topological_order(&dependencies)?;

        info!(
            "Resolved graph: {} active of {} registered tasks",
            order.len(),
            self.tasks.len()
        );

        let tasks = order
            .iter()
            .map(|name| self.tasks[self.index[name]].clone())
            .collect();

        Ok(ExecutionPlan {
            tasks,
            dependencies,
        })
    }

    /// Kahn's algorithm over the active tasks. Detects cycles.
    fn topological_order(
        &self,
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&String, usize> = HashMap::new();
        let mut dependents: HashMap<&String, Vec<&String>> = HashMap::new();

        for (name, deps) in dependencies {
            in_degree.entry(name).or_insert(0);
            for dep in deps {
                *in_degree.entry(name).or_insert(0) += 1;
                dependents.entry(dep).or_default().push(name);
            }
        }

        // Seed with root tasks in registration order for a stable result.
        let mut queue: VecDeque<&String> = self
            .tasks
            .iter()
            .filter(|t| t.active)
            .map(|t| &t.name)
            .filter(|name| in_degree.get(name).copied().unwrap_or(0) == 0)
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(dependencies.len());
        let mut seen: HashSet<&String> = queue.iter().copied().collect();

        while let Some(name) = queue.pop_front() {
            order.push(name.clone());

            if let Some(nexts) = dependents.get(name) {
                for &next in nexts {
                    let degree = in_degree
                        .get_mut(next)
                        .ok_or(GraphError::CyclicDependency)?;
                    *degree -= 1;
                    if *degree == 0 && seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        if order.len() != dependencies.len() {
            return Err(GraphError::CyclicDependency);
        }

        Ok(order)
    }
}

/// The active subgraph, ready for execution.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    tasks: Vec<Task>,
    dependencies: HashMap<String, Vec<String>>,
}

impl ExecutionPlan {
    /// Active tasks in topological order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Names of the tasks `name` directly depends on.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.dependencies
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Looks up an active task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Number of active tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when no task is active.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
