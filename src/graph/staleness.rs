//! Staleness Checking
//!
//! Decides whether a task needs to run by comparing its declared artifacts
//! on disk. Pure filesystem reads, no side effects.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use super::model::Task;

/// Returns true if the task must (re-)execute.
///
/// A task is stale when any declared output is missing, or when the oldest
/// output is strictly older than the newest input. A task with no declared
/// inputs is stale only while an output is missing; upstream changes it
/// does not declare never re-trigger it.
pub fn is_stale(task: &Task) -> bool {
    if !outputs_exist(task) {
        return true;
    }

    if task.inputs.is_empty() {
        return false;
    }

    let newest_input = newest_mtime(&task.inputs);
    let oldest_output = oldest_mtime(&task.outputs);

    match (newest_input, oldest_output) {
        (Some(input), Some(output)) => input > output,
        // A declared input that cannot be inspected forces a re-run.
        _ => true,
    }
}

/// Returns true if every declared output exists on disk.
pub fn outputs_exist(task: &Task) -> bool {
    if task.outputs.is_empty() {
        return false;
    }
    task.outputs.iter().all(|path| path.exists())
}

fn newest_mtime(paths: &[PathBuf]) -> Option<SystemTime> {
    paths
        .iter()
        .filter_map(|p| fs::metadata(p).ok())
        .filter_map(|m| m.modified().ok())
        .max()
}

fn oldest_mtime(paths: &[PathBuf]) -> Option<SystemTime> {
    paths
        .iter()
        .filter_map(|p| fs::metadata(p).ok())
        .filter_map(|m| m.modified().ok())
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::Action;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn task_with(inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Task {
        let sentinel = outputs
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("missing.sentinel"));
        let mut task = Task::new("probe", sentinel, Action::Exec(vec![]));
        task.inputs = inputs;
        task.outputs = outputs;
        task
    }

    #[test]
    fn test_missing_output_is_stale() {
        let dir = tempdir().unwrap();
        let task = task_with(vec![], vec![dir.path().join("absent.sentinel")]);
        assert!(is_stale(&task));
    }

    #[test]
    fn test_no_inputs_and_outputs_present_is_current() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("done.sentinel");
        fs::write(&out, "").unwrap();

        let task = task_with(vec![], vec![out]);
        assert!(!is_stale(&task));
    }

    #[test]
    fn test_any_missing_output_among_several_is_stale() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("done.sentinel");
        let absent = dir.path().join("done.RData");
        fs::write(&present, "").unwrap();

        let task = task_with(vec![], vec![present, absent]);
        assert!(is_stale(&task));
    }

    #[test]
    fn test_newer_input_makes_task_stale() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.sentinel");
        let input = dir.path().join("in.sentinel");

        fs::write(&output, "").unwrap();
        thread::sleep(Duration::from_millis(100));
        fs::write(&input, "").unwrap();

        let task = task_with(vec![input], vec![output]);
        assert!(is_stale(&task));
    }

    #[test]
    fn test_older_input_leaves_task_current() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.sentinel");
        let output = dir.path().join("out.sentinel");

        fs::write(&input, "").unwrap();
        thread::sleep(Duration::from_millis(100));
        fs::write(&output, "").unwrap();

        let task = task_with(vec![input], vec![output]);
        assert!(!is_stale(&task));
    }

    #[test]
    fn test_missing_declared_input_forces_rerun() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.sentinel");
        fs::write(&output, "").unwrap();

        let task = task_with(vec![dir.path().join("never-made.sentinel")], vec![output]);
        assert!(is_stale(&task));
    }

    #[test]
    fn test_oldest_output_governs_freshness() {
        let dir = tempdir().unwrap();
        let stale_out = dir.path().join("old.RData");
        let input = dir.path().join("in.sentinel");
        let fresh_out = dir.path().join("new.sentinel");

        fs::write(&stale_out, "").unwrap();
        thread::sleep(Duration::from_millis(100));
        fs::write(&input, "").unwrap();
        thread::sleep(Duration::from_millis(100));
        fs::write(&fresh_out, "").unwrap();

        let task = task_with(vec![input], vec![fresh_out, stale_out]);
        assert!(is_stale(&task));
    }
}
