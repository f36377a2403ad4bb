//! Typed Parameter Sections
//!
//! Every task parameter lives in one of the section structs below, parsed
//! once at startup. A missing required key or an unrecognized enum value is
//! a fatal configuration error before any task is considered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a configuration file.
    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid YAML.
    #[error("YAML parse error in '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The merged configuration does not match the expected schema.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A required key has no value.
    #[error("missing required configuration key: {0}")]
    MissingKey(&'static str),

    /// A configured input file does not exist on disk.
    #[error("{role} file not found: {}", .path.display())]
    MissingInput { role: &'static str, path: PathBuf },

    /// `coexflow config` refuses to clobber an existing file.
    #[error("refusing to overwrite existing file: {}", .0.display())]
    AlreadyExists(PathBuf),
}

/// Module detection strategy. Exactly one of the two detection tasks is
/// active per run; any other value is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detection {
    Stepwise,
    Blockwise,
}

impl Detection {
    /// Lowercase name as it appears in configuration and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Detection::Stepwise => "stepwise",
            Detection::Blockwise => "blockwise",
        }
    }
}

/// Input data files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputParams {
    /// Expression matrix (genes x samples). Required.
    pub expression_data: Option<PathBuf>,
    /// Optional sample trait table.
    pub trait_data: Option<PathBuf>,
    /// Optional sample metadata table.
    pub meta_data: Option<PathBuf>,
    /// Optional curated gene lists.
    pub genelists: Option<PathBuf>,
}

impl InputParams {
    /// The expression matrix path, or a missing-key error.
    pub fn expression_data(&self) -> Result<&Path, ConfigError> {
        self.expression_data
            .as_deref()
            .ok_or(ConfigError::MissingKey("input.expression_data"))
    }
}

/// Gene annotation retrieval parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnotationParams {
    pub ensembl_release: String,
    pub ensembl_host: String,
    pub species: String,
    /// Column holding the gene identifier.
    pub idcol: String,
    /// Column holding the display name.
    pub namecol: String,
}

impl Default for AnnotationParams {
    fn default() -> Self {
        Self {
            ensembl_release: "98".to_string(),
            ensembl_host: "https://www.ensembl.org".to_string(),
            species: "mm".to_string(),
            idcol: "gene_id".to_string(),
            namecol: "gene_name".to_string(),
        }
    }
}

/// Data cleaning thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanParams {
    pub min_fraction: f64,
    pub min_n_samples: u32,
    pub min_n_genes: u32,
    pub min_relative_weight: f64,
    pub cut_height: f64,
    pub min_size: u32,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            min_fraction: 0.5,
            min_n_samples: 4,
            min_n_genes: 200,
            min_relative_weight: 0.1,
            cut_height: 15000.0,
            min_size: 10,
        }
    }
}

/// Network construction and module detection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModuleParams {
    pub detection: Detection,
    pub soft_power: u32,
    pub network_type: String,
    pub adj_cor_fnc: String,
    pub adj_dist_fnc: String,
    pub tom_type: String,
    /// Maximum block size for blockwise detection.
    pub block_size: u32,
    pub min_size: u32,
    pub diss_threshold: f64,
    pub threads: u32,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            detection: Detection::Stepwise,
            soft_power: 6,
            network_type: "signed".to_string(),
            adj_cor_fnc: "bicor".to_string(),
            adj_dist_fnc: "dist".to_string(),
            tom_type: "signed".to_string(),
            block_size: 5000,
            min_size: 30,
            diss_threshold: 0.25,
            threads: 4,
        }
    }
}

/// Geneset over-enrichment analysis parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenesetParams {
    /// Whether the geneset analysis branch runs at all.
    pub run: bool,
    pub min_fg_genes: u32,
    pub pvalue_threshold: f64,
    pub padjust_method: String,
    pub use_adjusted_pvalues: bool,
    pub show_common: bool,
    pub show_detailed: bool,
    pub min_odds_ratio: f64,
}

impl Default for GenesetParams {
    fn default() -> Self {
        Self {
            run: true,
            min_fg_genes: 3,
            pvalue_threshold: 0.05,
            padjust_method: "BH".to_string(),
            use_adjusted_pvalues: true,
            show_common: true,
            show_detailed: false,
            min_odds_ratio: 1.5,
        }
    }
}

/// Named GMT geneset files, tested in addition to GO and KEGG.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GmtParams {
    pub celltype_files: BTreeMap<String, PathBuf>,
    pub pathway_files: BTreeMap<String, PathBuf>,
}

impl GmtParams {
    /// Comma-joined GMT names and file paths, in a stable order.
    ///
    /// Returns the literal `none` pair when no GMT files are configured,
    /// which the downstream analysis scripts recognize.
    pub fn names_and_files(&self) -> (String, String) {
        let entries: Vec<(&String, &PathBuf)> = self
            .celltype_files
            .iter()
            .chain(self.pathway_files.iter())
            .collect();

        if entries.is_empty() {
            return ("none".to_string(), "none".to_string());
        }

        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        let files: Vec<String> = entries
            .iter()
            .map(|(_, f)| f.display().to_string())
            .collect();

        (names.join(","), files.join(","))
    }
}

/// Figure dimensions for generated plots.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlotParams {
    pub eigengene_heatmap_width: f64,
    pub eigengene_heatmap_height: f64,
}

impl Default for PlotParams {
    fn default() -> Self {
        Self {
            eigengene_heatmap_width: 7.0,
            eigengene_heatmap_height: 9.0,
        }
    }
}

/// Report front matter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportParams {
    pub title: String,
    pub author: String,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            title: "Coexpression network analysis".to_string(),
            author: "coexflow".to_string(),
        }
    }
}

/// Runner behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunParams {
    /// Directory containing the R analysis scripts. Defaults to an `R/`
    /// directory next to the executable.
    pub scripts_dir: Option<PathBuf>,
    /// Directory containing the LaTeX report sections. Defaults to a `tex/`
    /// directory next to the scripts directory.
    pub tex_dir: Option<PathBuf>,
    /// Upper bound on concurrently running per-module invocations.
    pub max_parallel: usize,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            scripts_dir: None,
            tex_dir: None,
            max_parallel: 4,
        }
    }
}

/// The complete, merged run configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputParams,
    pub annotation: AnnotationParams,
    pub clean: CleanParams,
    pub module: ModuleParams,
    pub genesets: GenesetParams,
    pub gmt: GmtParams,
    pub plot: PlotParams,
    pub report: ReportParams,
    pub run: RunParams,
}

impl Config {
    /// Checks that every configured input file exists on disk.
    ///
    /// Runs once at startup, before the task graph is built, so a bad path
    /// fails the run before anything executes.
    pub fn validate_inputs(&self) -> Result<(), ConfigError> {
        let required = self.input.expression_data()?;
        if !required.is_file() {
            return Err(ConfigError::MissingInput {
                role: "expression data",
                path: required.to_path_buf(),
            });
        }

        let optional: [(&'static str, &Option<PathBuf>); 3] = [
            ("trait data", &self.input.trait_data),
            ("metadata", &self.input.meta_data),
            ("gene list", &self.input.genelists),
        ];

        for (role, path) in optional {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(ConfigError::MissingInput {
                        role,
                        path: path.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
