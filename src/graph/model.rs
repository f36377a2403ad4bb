//! Task Graph Data Model
//!
//! Core data structures for declaring tasks, their artifacts and the
//! external invocations that realize them.
//!
//! A task declares the artifact paths it consumes and produces. Exactly one
//! output is the *sentinel*: an empty marker file touched by the executor
//! after the task succeeds, whose existence and timestamp are the sole
//! completion record. Sibling artifacts (data files, logs) are derived from
//! the sentinel path by suffix substitution.

use std::path::{Path, PathBuf};

/// Placeholder substituted with one discovered value per fan-out instance.
pub const CATEGORY_PLACEHOLDER: &str = "{category}";

/// Placeholder substituted with the comma-joined list of discovered values.
pub const CATEGORIES_PLACEHOLDER: &str = "{categories}";

/// Derives a sibling artifact path by swapping a filename suffix.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use coexflow::graph::model::swap_suffix;
///
/// let data = swap_suffix(Path::new("run/clean.sentinel"), ".sentinel", ".RData");
/// assert_eq!(data, Path::new("run/clean.RData"));
/// ```
pub fn swap_suffix(path: &Path, from: &str, to: &str) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(from) {
        Some(stem) => PathBuf::from(format!("{}{}", stem, to)),
        None => path.to_path_buf(),
    }
}

/// A single external program invocation.
///
/// Arguments follow the flat `--key=value` convention of the analysis
/// scripts. Standard output and error are redirected to `log`.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Program to execute, e.g. `Rscript` or `pdflatex`.
    pub program: String,
    /// Flat argument list.
    pub args: Vec<String>,
    /// File receiving the subprocess stdout and stderr.
    pub log: PathBuf,
}

impl Invocation {
    /// Creates an invocation with no arguments yet.
    pub fn new(program: impl Into<String>, log: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            log: log.into(),
        }
    }

    /// Appends a `--key=value` argument.
    pub fn arg(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.args.push(format!("--{}={}", key, value));
        self
    }

    /// Appends an argument verbatim.
    pub fn raw_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The resolved command line, for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Instantiates the invocation for one category value, substituting the
    /// `{category}` placeholder in every argument and in the log path.
    pub fn for_category(&self, value: &str) -> Invocation {
        Invocation {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|a| a.replace(CATEGORY_PLACEHOLDER, value))
                .collect(),
            log: PathBuf::from(
                self.log
                    .to_string_lossy()
                    .replace(CATEGORY_PLACEHOLDER, value),
            ),
        }
    }

    /// Substitutes the `{categories}` placeholder with a comma-joined list.
    pub fn for_categories(&self, values: &[String]) -> Invocation {
        let joined = values.join(",");
        Invocation {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|a| a.replace(CATEGORIES_PLACEHOLDER, &joined))
                .collect(),
            log: self.log.clone(),
        }
    }
}

/// In-process operations carried out by the runner itself rather than a
/// subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalOp {
    /// Emit the LaTeX variable preamble from configuration.
    WriteLatexVars,
    /// Link final artifacts under their canonical report names.
    PublishReport,
}

/// How the values of a table column shape the generated invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMode {
    /// One concurrent invocation per distinct value.
    PerValue,
    /// A single invocation receiving the comma-joined value list.
    Joined,
}

/// What executing a task means.
#[derive(Debug, Clone)]
pub enum Action {
    /// External invocations run sequentially, usually just one.
    Exec(Vec<Invocation>),
    /// Invocations derived at run time from the distinct values of a
    /// column in an upstream table artifact.
    Categorised {
        /// Tab-separated table produced by an upstream task.
        table: PathBuf,
        /// Column whose distinct values drive the expansion.
        column: String,
        template: Invocation,
        mode: CategoryMode,
    },
    /// An in-process operation.
    Internal(InternalOp),
}

/// A named unit of work in the graph.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task name.
    pub name: String,
    /// Artifact paths this task consumes. May be empty.
    pub inputs: Vec<PathBuf>,
    /// Artifact paths this task produces, sentinel included.
    pub outputs: Vec<PathBuf>,
    /// The completion marker, touched by the executor on success.
    pub sentinel: PathBuf,
    /// What to do when the task runs.
    pub action: Action,
    /// Whether the task participates in this run at all. Evaluated at
    /// graph-construction time from configuration.
    pub active: bool,
}

impl Task {
    /// Creates an active task producing `sentinel`.
    pub fn new(name: impl Into<String>, sentinel: impl Into<PathBuf>, action: Action) -> Self {
        let sentinel = sentinel.into();
        Self {
            name: name.into().trim().to_string(),
            inputs: Vec::new(),
            outputs: vec![sentinel.clone()],
            sentinel,
            action,
            active: true,
        }
    }

    /// Declares an input artifact.
    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    /// Declares an additional output artifact beyond the sentinel.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// Sets the activation flag.
    pub fn active_if(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// The log path paired with this task's sentinel.
    pub fn log_path(&self) -> PathBuf {
        swap_suffix(&self.sentinel, ".sentinel", ".log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_suffix() {
        let path = Path::new("wgcna.dir/clean.dir/clean.sentinel");
        assert_eq!(
            swap_suffix(path, ".sentinel", ".RData"),
            Path::new("wgcna.dir/clean.dir/clean.RData")
        );
    }

    #[test]
    fn test_swap_suffix_no_match_returns_input() {
        let path = Path::new("results.tsv");
        assert_eq!(swap_suffix(path, ".sentinel", ".log"), path);
    }

    #[test]
    fn test_invocation_args() {
        let inv = Invocation::new("Rscript", "run/clean.log")
            .raw_arg("clean.R")
            .arg("input", "expr.tsv")
            .arg("threads", 4);

        assert_eq!(inv.args, vec!["clean.R", "--input=expr.tsv", "--threads=4"]);
        assert_eq!(
            inv.command_line(),
            "Rscript clean.R --input=expr.tsv --threads=4"
        );
    }

    #[test]
    fn test_invocation_for_category() {
        let inv = Invocation::new("Rscript", "genesets.dir/analysis.{category}.log")
            .arg("module", "{category}");

        let concrete = inv.for_category("blue");
        assert_eq!(concrete.args, vec!["--module=blue"]);
        assert_eq!(concrete.log, PathBuf::from("genesets.dir/analysis.blue.log"));
        // The template itself is untouched.
        assert_eq!(inv.args, vec!["--module={category}"]);
    }

    #[test]
    fn test_invocation_for_categories_joins() {
        let inv = Invocation::new("Rscript", "summary.log").arg("modulelist", "{categories}");
        let concrete =
            inv.for_categories(&["blue".to_string(), "brown".to_string(), "grey".to_string()]);
        assert_eq!(concrete.args, vec!["--modulelist=blue,brown,grey"]);
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new(
            "clean_data",
            "wgcna.dir/clean.dir/clean.sentinel",
            Action::Exec(vec![]),
        )
        .with_input("expr.tsv")
        .with_output("wgcna.dir/clean.dir/clean.RData")
        .active_if(false);

        assert_eq!(task.name, "clean_data");
        assert_eq!(task.inputs.len(), 1);
        assert_eq!(task.outputs.len(), 2);
        assert_eq!(task.outputs[0], task.sentinel);
        assert!(!task.active);
    }

    #[test]
    fn test_task_log_path() {
        let task = Task::new("soft_power", "run/soft.power.sentinel", Action::Exec(vec![]));
        assert_eq!(task.log_path(), PathBuf::from("run/soft.power.log"));
    }
}
