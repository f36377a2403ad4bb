//! External Invocation Handling
//!
//! Runs a single external program with its output redirected to the
//! invocation's log file, and discovers fan-out categories from upstream
//! table artifacts.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use thiserror::Error;

use crate::graph::model::Invocation;

/// Failures of a single external invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The log file could not be opened for writing.
    #[error("could not open log file '{}': {source}", .log.display())]
    Log {
        log: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program could not be started at all.
    #[error("could not launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited with a non-zero status.
    #[error("'{command}' exited with status {code:?}, see log: {}", .log.display())]
    NonZero {
        command: String,
        code: Option<i32>,
        log: PathBuf,
    },
}

/// Failures while reading a fan-out category table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("could not read table '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("table '{}' is empty", .path.display())]
    Empty { path: PathBuf },

    #[error("table '{}' has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: String },
}

/// Resolves a possibly relative artifact path against the working directory.
pub fn resolve_path(path: &Path, working_dir: &Option<PathBuf>) -> PathBuf {
    match working_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Executes one invocation and waits for it to finish.
///
/// Stdout and stderr go to the invocation's log file, whose parent
/// directory is created if needed. Exit code zero is success; anything
/// else is an [`InvokeError::NonZero`] carrying the resolved command line
/// and the log location.
pub fn run(invocation: &Invocation, working_dir: &Option<PathBuf>) -> Result<(), InvokeError> {
    let log_path = resolve_path(&invocation.log, working_dir);

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|e| InvokeError::Log {
            log: log_path.clone(),
            source: e,
        })?;
    }

    let log_out = File::create(&log_path).map_err(|e| InvokeError::Log {
        log: log_path.clone(),
        source: e,
    })?;
    let log_err = log_out.try_clone().map_err(|e| InvokeError::Log {
        log: log_path.clone(),
        source: e,
    })?;

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_out))
        .stderr(Stdio::from(log_err));

    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    debug!("Executing: {}", invocation.command_line());

    let status = command.status().map_err(|e| InvokeError::Launch {
        command: invocation.command_line(),
        source: e,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(InvokeError::NonZero {
            command: invocation.command_line(),
            code: status.code(),
            log: log_path,
        })
    }
}

/// Distinct values of `column` in a tab-separated table, sorted.
///
/// Used to expand a fan-out task into one invocation per category found in
/// an upstream result, and to pass the joined category list to summary
/// invocations.
pub fn distinct_column_values(table: &Path, column: &str) -> Result<Vec<String>, TableError> {
    let text = fs::read_to_string(table).map_err(|e| TableError::Read {
        path: table.to_path_buf(),
        source: e,
    })?;

    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| TableError::Empty {
        path: table.to_path_buf(),
    })?;

    let column_index = header
        .split('\t')
        .position(|name| name.trim() == column)
        .ok_or_else(|| TableError::MissingColumn {
            path: table.to_path_buf(),
            column: column.to_string(),
        })?;

    let values: BTreeSet<String> = lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split('\t').nth(column_index))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();

    Ok(values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_success_writes_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("hello.log");

        let invocation = Invocation::new("sh", &log)
            .raw_arg("-c")
            .raw_arg("echo hello");

        run(&invocation, &None).unwrap();

        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains("hello"));
    }

    #[test]
    fn test_run_nonzero_exit_reports_code() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("fail.log");

        let invocation = Invocation::new("sh", &log).raw_arg("-c").raw_arg("exit 3");

        let result = run(&invocation, &None);
        match result {
            Err(InvokeError::NonZero { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("Expected NonZero, got {:?}", other),
        }
    }

    #[test]
    fn test_run_missing_program_is_launch_error() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("ghost.log");

        let invocation = Invocation::new("definitely-not-a-real-program-xyz", &log);

        let result = run(&invocation, &None);
        assert!(matches!(result, Err(InvokeError::Launch { .. })));
    }

    #[test]
    fn test_run_creates_log_parent_directory() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("nested/dir/step.log");

        let invocation = Invocation::new("sh", &log).raw_arg("-c").raw_arg("true");

        run(&invocation, &None).unwrap();
        assert!(log.exists());
    }

    #[test]
    fn test_run_respects_working_directory() {
        let dir = tempdir().unwrap();

        let invocation = Invocation::new("sh", "wd.log")
            .raw_arg("-c")
            .raw_arg("pwd");

        run(&invocation, &Some(dir.path().to_path_buf())).unwrap();

        let log = dir.path().join("wd.log");
        assert!(log.exists());
        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.trim().ends_with(
            dir.path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
        ));
    }

    #[test]
    fn test_resolve_path() {
        let wd = Some(PathBuf::from("/data/run"));
        assert_eq!(
            resolve_path(Path::new("a/b.sentinel"), &wd),
            PathBuf::from("/data/run/a/b.sentinel")
        );
        assert_eq!(
            resolve_path(Path::new("/abs/b.sentinel"), &wd),
            PathBuf::from("/abs/b.sentinel")
        );
        assert_eq!(
            resolve_path(Path::new("a/b.sentinel"), &None),
            PathBuf::from("a/b.sentinel")
        );
    }

    #[test]
    fn test_distinct_column_values() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("membership.tsv");
        fs::write(
            &table,
            "gene_id\tmodule\nG1\tblue\nG2\tbrown\nG3\tblue\nG4\tgrey\n",
        )
        .unwrap();

        let values = distinct_column_values(&table, "module").unwrap();
        assert_eq!(values, vec!["blue", "brown", "grey"]);
    }

    #[test]
    fn test_distinct_column_values_missing_column() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("membership.tsv");
        fs::write(&table, "gene_id\tcluster\nG1\tblue\n").unwrap();

        let result = distinct_column_values(&table, "module");
        assert!(matches!(result, Err(TableError::MissingColumn { .. })));
    }

    #[test]
    fn test_distinct_column_values_missing_file() {
        let result = distinct_column_values(Path::new("/nonexistent/membership.tsv"), "module");
        assert!(matches!(result, Err(TableError::Read { .. })));
    }

    #[test]
    fn test_distinct_column_values_skips_blank_rows() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("membership.tsv");
        fs::write(&table, "gene_id\tmodule\nG1\tblue\n\nG2\t\n").unwrap();

        let values = distinct_column_values(&table, "module").unwrap();
        assert_eq!(values, vec!["blue"]);
    }
}
