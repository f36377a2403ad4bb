//! Coexpression Pipeline Definition
//!
//! Declares the WGCNA task graph executed by the engine: annotation
//! retrieval, data cleaning, network construction, module detection and
//! characterisation, geneset analysis and the summary report build. All
//! statistical work happens in external R scripts; the definitions here
//! only wire configuration values and artifact paths into invocations.
//!
//! # Structure
//!
//! - [`tasks`]: explicit registration of the task graph
//! - [`report`]: LaTeX variable emission and report publishing

use std::env;
use std::path::PathBuf;

use log::{info, warn};
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::config::ConfigError;
use crate::graph::registry::GraphError;

pub mod report;
pub mod tasks;

pub use tasks::build;

/// Errors raised while building the pipeline graph.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Run directory layout. All paths are relative to the run directory.
pub const ANNOTATION_DIR: &str = "annotation.dir";
pub const CLEAN_DIR: &str = "wgcna.dir/clean.dir";
pub const SOFT_POWER_DIR: &str = "wgcna.dir/soft.power.dir";
pub const MODULES_DIR: &str = "wgcna.dir/modules.dir";
pub const MEMBERSHIP_DIR: &str = "wgcna.dir/membership.dir";
pub const EIGENGENES_DIR: &str = "wgcna.dir/eigengenes.dir";
pub const GENESETS_DIR: &str = "wgcna.dir/genesets.dir";
pub const LATEX_DIR: &str = "wgcna.dir/latex.dir";
pub const REPORT_DIR: &str = "report.dir";

/// Key artifacts referenced by more than one task.
pub const MEMBERSHIP_TABLE: &str = "wgcna.dir/membership.dir/membership.tsv";
pub const EIGENGENE_TABLE: &str = "wgcna.dir/membership.dir/eigengenes.tsv";
pub const EIGENGENE_HEATMAP: &str = "wgcna.dir/eigengenes.dir/eigengen_heatmap.png";
pub const GENESET_WORKBOOK: &str = "wgcna.dir/genesets.dir/cluster.genesets.xlsx";
pub const LATEX_VARS_FILE: &str = "wgcna.dir/latex.dir/report.vars.sty";
pub const GENELISTS_TEX: &str = "wgcna.dir/latex.dir/genelists.tex";
pub const REPORT_PDF: &str = "wgcna.dir/latex.dir/summaryReport.pdf";

/// Lazily-resolved default location of the R analysis scripts.
///
/// # Resolution Priority
///
/// 1. The `COEXFLOW_R_DIR` environment variable
/// 2. An `R/` directory next to the executable
/// 3. `./R` in the run directory
pub static SCRIPTS_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = env::var("COEXFLOW_R_DIR") {
        let path = PathBuf::from(dir);
        info!("Using R scripts from COEXFLOW_R_DIR: {}", path.display());
        return path;
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let bundled = exe_dir.join("R");
            if bundled.exists() {
                info!("Using bundled R scripts: {}", bundled.display());
                return bundled;
            }
        }
    }

    warn!("R scripts directory not found next to the executable, using ./R");
    PathBuf::from("R")
});

/// Default location of the LaTeX report sections, next to the scripts.
pub fn default_tex_dir(scripts_dir: &std::path::Path) -> PathBuf {
    scripts_dir
        .parent()
        .map(|p| p.join("tex"))
        .unwrap_or_else(|| PathBuf::from("tex"))
}
