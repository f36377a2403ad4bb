//! Bounded Invocation Pool
//!
//! Runs the independent instances of a fan-out task concurrently on worker
//! threads, bounded by the configured parallelism (a zero bound falls back
//! to the machine's core count). After a failure no further instances are
//! scheduled; instances already running are allowed to finish.

use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::thread;

use log::{debug, error};

use super::invoke::{self, InvokeError};
use crate::graph::model::Invocation;

/// Pool width used when the configured bound is zero.
fn default_width() -> usize {
    num_cpus::get().max(1)
}

/// Runs invocations concurrently and collects their outcomes.
///
/// The returned vector holds one entry per invocation that was actually
/// started, in completion order. Instances that were never scheduled
/// because an earlier one failed do not appear.
pub fn run_concurrently(
    invocations: Vec<Invocation>,
    max_parallel: usize,
    working_dir: &Option<PathBuf>,
) -> Vec<(Invocation, Result<(), InvokeError>)> {
    let limit = if max_parallel == 0 {
        default_width()
    } else {
        max_parallel
    };

    let (tx, rx) = channel();
    let mut pending = invocations.into_iter();
    let mut results = Vec::new();
    let mut running = 0usize;
    let mut failed = false;

    loop {
        while !failed && running < limit {
            let Some(invocation) = pending.next() else {
                break;
            };

            debug!("Scheduling instance: {}", invocation.command_line());

            let tx = tx.clone();
            let working_dir = working_dir.clone();

            thread::spawn(move || {
                let result = invoke::run(&invocation, &working_dir);
                if tx.send((invocation, result)).is_err() {
                    error!("Failed to send instance completion signal");
                }
            });

            running += 1;
        }

        if running == 0 {
            break;
        }

        let Ok((invocation, result)) = rx.recv() else {
            break;
        };
        running -= 1;

        if result.is_err() {
            failed = true;
        }

        results.push((invocation, result));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn shell(script: String, log: PathBuf) -> Invocation {
        Invocation::new("sh", log).raw_arg("-c").raw_arg(script)
    }

    #[test]
    fn test_all_instances_succeed() {
        let dir = tempdir().unwrap();

        let invocations: Vec<Invocation> = ["blue", "brown", "grey"]
            .iter()
            .map(|name| {
                shell(
                    format!("touch {}/out.{}", dir.path().display(), name),
                    dir.path().join(format!("{}.log", name)),
                )
            })
            .collect();

        let results = run_concurrently(invocations, 2, &None);

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert!(dir.path().join("out.blue").exists());
        assert!(dir.path().join("out.brown").exists());
        assert!(dir.path().join("out.grey").exists());
    }

    #[test]
    fn test_failure_stops_further_scheduling() {
        let dir = tempdir().unwrap();

        let invocations = vec![
            shell("exit 1".to_string(), dir.path().join("first.log")),
            shell(
                format!("touch {}/second", dir.path().display()),
                dir.path().join("second.log"),
            ),
            shell(
                format!("touch {}/third", dir.path().display()),
                dir.path().join("third.log"),
            ),
        ];

        // Width one makes scheduling strictly sequential, so nothing after
        // the failing instance may start.
        let results = run_concurrently(invocations, 1, &None);

        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_err());
        assert!(!dir.path().join("second").exists());
        assert!(!dir.path().join("third").exists());
    }

    #[test]
    fn test_running_siblings_finish_after_failure() {
        let dir = tempdir().unwrap();

        let invocations = vec![
            shell("exit 1".to_string(), dir.path().join("fail.log")),
            shell(
                format!("sleep 0.2 && touch {}/slow", dir.path().display()),
                dir.path().join("slow.log"),
            ),
        ];

        let results = run_concurrently(invocations, 2, &None);

        // Both were scheduled together; the slow sibling runs to completion.
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|(_, r)| r.is_err()));
        assert!(dir.path().join("slow").exists());
    }

    #[test]
    fn test_empty_input_returns_no_results() {
        let results = run_concurrently(Vec::new(), 4, &None);
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_parallelism_is_clamped() {
        let dir = tempdir().unwrap();
        let invocations = vec![shell("true".to_string(), dir.path().join("one.log"))];

        let results = run_concurrently(invocations, 0, &None);
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
    }

    #[test]
    fn test_log_files_written_per_instance() {
        let dir = tempdir().unwrap();

        let invocations = vec![
            shell("echo alpha".to_string(), dir.path().join("alpha.log")),
            shell("echo beta".to_string(), dir.path().join("beta.log")),
        ];

        let results = run_concurrently(invocations, 2, &None);
        assert_eq!(results.len(), 2);

        let alpha = fs::read_to_string(dir.path().join("alpha.log")).unwrap();
        let beta = fs::read_to_string(dir.path().join("beta.log")).unwrap();
        assert!(alpha.contains("alpha"));
        assert!(beta.contains("beta"));
    }
}
