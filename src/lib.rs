//! coexflow - Sentinel-Driven Coexpression Pipeline Runner
//!
//! Drives a weighted gene-coexpression network analysis as a static graph
//! of external `Rscript` and `pdflatex` invocations. Completion of each
//! task is recorded by an empty sentinel file; on a re-run, tasks whose
//! artifacts are current are skipped, so a failed run resumes after the
//! last success once the cause is fixed.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`config`]: layered YAML configuration and typed parameter sections
//! - [`graph`]: task declarations, dependency resolution and staleness
//! - [`execution`]: the run engine, subprocess handling and fan-out pool
//! - [`pipeline`]: the concrete WGCNA task graph and report publishing
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use coexflow::config;
//! use coexflow::execution::Engine;
//! use coexflow::pipeline;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = config::load(Path::new("."))?;
//!     config.validate_inputs()?;
//!
//!     let plan = pipeline::build(&config)?.resolve()?;
//!     let internals = pipeline::report::Internals::new(config, ".");
//!
//!     let mut engine = Engine::new(plan);
//!     engine.run(&internals)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod execution;
pub mod graph;
pub mod pipeline;

// Re-export commonly used types
pub use config::Config;
pub use execution::Engine;
pub use graph::{Task, TaskRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "coexflow";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "coexflow");
    }

    #[test]
    fn test_module_exports_registry() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_module_exports_config() {
        let config = Config::default();
        assert!(config.genesets.run);
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(
                part.parse::<u32>().is_ok(),
                "Version components should be numeric"
            );
        }
    }
}
