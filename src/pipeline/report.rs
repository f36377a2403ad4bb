//! Report Assembly and Publishing
//!
//! The two in-process pipeline operations: emitting the LaTeX variable
//! preamble consumed by the report sections, and linking final artifacts
//! under canonical names in the report directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::Config;
use crate::execution::engine::InternalRunner;
use crate::execution::invoke::distinct_column_values;
use crate::graph::model::{InternalOp, Task};

use super::{
    EIGENGENES_DIR, EIGENGENE_HEATMAP, EIGENGENE_TABLE, GENELISTS_TEX, GENESETS_DIR,
    GENESET_WORKBOOK, LATEX_DIR, LATEX_VARS_FILE, MEMBERSHIP_DIR, MEMBERSHIP_TABLE, REPORT_DIR,
    REPORT_PDF,
};

/// Canonical report names and the artifacts they point at. Absent
/// artifacts are skipped, they belong to branches that did not run.
const PUBLISH_TARGETS: &[(&str, &str)] = &[
    (EIGENGENE_HEATMAP, "module.eigengene.heatmap.png"),
    (GENESET_WORKBOOK, "module.genesets.xlsx"),
    (REPORT_PDF, "summary.report.pdf"),
    (EIGENGENE_TABLE, "module.eigengene.expression.matrix.tsv"),
    (MEMBERSHIP_TABLE, "module.gene.membership.tsv"),
];

/// Executes the pipeline's in-process operations against a run directory.
pub struct Internals {
    config: Config,
    base: PathBuf,
}

impl Internals {
    /// Creates a runner rooted at the run directory.
    pub fn new(config: Config, base: impl Into<PathBuf>) -> Self {
        Self {
            config,
            base: base.into(),
        }
    }
}

impl InternalRunner for Internals {
    fn run(
        &self,
        op: InternalOp,
        _task: &Task,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match op {
            InternalOp::WriteLatexVars => {
                write_latex_vars(&self.config, &self.base)?;
                if self.config.input.genelists.is_some() {
                    write_genelist_sections(&self.config, &self.base)?;
                }
                Ok(())
            }
            InternalOp::PublishReport => {
                publish_report(&self.base)?;
                Ok(())
            }
        }
    }
}

/// Writes the `\newcommand` preamble the report sections draw their
/// parameter values from.
pub fn write_latex_vars(config: &Config, base: &Path) -> std::io::Result<()> {
    fs::create_dir_all(base.join(LATEX_DIR))?;

    let vars: Vec<(&str, String)> = vec![
        ("reportTitle", config.report.title.clone()),
        ("reportAuthor", config.report.author.clone()),
        ("minFraction", config.clean.min_fraction.to_string()),
        ("minSamples", config.clean.min_n_samples.to_string()),
        ("minGenes", config.clean.min_n_genes.to_string()),
        ("cutHeight", config.clean.cut_height.to_string()),
        ("clusterMinSize", config.clean.min_size.to_string()),
        ("softPower", config.module.soft_power.to_string()),
        ("detection", config.module.detection.as_str().to_string()),
        // Underscores are not valid in LaTeX text mode.
        (
            "networkType",
            config.module.network_type.replace('_', "-"),
        ),
        ("adjCorFunction", config.module.adj_cor_fnc.clone()),
        ("adjDistFunction", config.module.adj_dist_fnc.clone()),
        ("tomType", config.module.tom_type.clone()),
        ("minSize", config.module.min_size.to_string()),
        ("dissThreshold", config.module.diss_threshold.to_string()),
        ("cleanDir", super::CLEAN_DIR.to_string()),
        ("powerDir", super::SOFT_POWER_DIR.to_string()),
        ("membershipDir", MEMBERSHIP_DIR.to_string()),
        ("moduleDir", super::MODULES_DIR.to_string()),
        ("eigengeneDir", EIGENGENES_DIR.to_string()),
        ("genesetDir", GENESETS_DIR.to_string()),
        ("clusterGenesetsDir", GENESETS_DIR.to_string()),
    ];

    let path = base.join(LATEX_VARS_FILE);
    let mut file = File::create(&path)?;
    for (command, value) in vars {
        writeln!(file, "\\newcommand{{\\{}}}{{{}}}", command, value)?;
    }

    info!("Wrote LaTeX variables to {}", path.display());
    Ok(())
}

/// Writes one report subsection per curated gene list plot group.
pub fn write_genelist_sections(
    config: &Config,
    base: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(genelists) = &config.input.genelists else {
        return Ok(());
    };

    let groups = distinct_column_values(genelists, "plot_group")?;

    fs::create_dir_all(base.join(LATEX_DIR))?;
    let path = base.join(GENELISTS_TEX);
    let mut file = File::create(&path)?;

    for group in &groups {
        let escaped = group.replace('_', "\\_");
        let heatmap = format!("{}/genelist.{}", EIGENGENES_DIR, group);

        writeln!(file, "\\subsection{{{} genes}}", escaped)?;
        writeln!(file, "\\begin{{figure}}[H]")?;
        writeln!(file, "\\includegraphics[width=\\linewidth]{{{}}}", heatmap)?;
        writeln!(
            file,
            "\\caption{{Heatmap of manually curated {} genes}}",
            escaped
        )?;
        writeln!(file, "\\end{{figure}}")?;
        writeln!(file)?;
    }

    info!(
        "Wrote {} gene list sections to {}",
        groups.len(),
        path.display()
    );
    Ok(())
}

/// Links final artifacts under their canonical names in `report.dir`.
///
/// Links are relative so the run directory can be moved as a whole.
/// Artifacts that were not produced in this run are skipped. Re-publishing
/// replaces existing links.
pub fn publish_report(base: &Path) -> std::io::Result<()> {
    let report_dir = base.join(REPORT_DIR);
    fs::create_dir_all(&report_dir)?;

    let mut published = 0;
    for (source, canonical) in PUBLISH_TARGETS {
        let source_path = base.join(source);
        if !source_path.exists() {
            debug!("Skipping absent artifact: {}", source_path.display());
            continue;
        }

        let target = report_dir.join(canonical);
        if fs::symlink_metadata(&target).is_ok() {
            fs::remove_file(&target)?;
        }

        link(Path::new("..").join(source), &source_path, &target)?;
        published += 1;
    }

    info!(
        "Published {} of {} report artifacts to {}",
        published,
        PUBLISH_TARGETS.len(),
        report_dir.display()
    );
    Ok(())
}

#[cfg(unix)]
fn link(relative: PathBuf, _source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(relative, target)
}

#[cfg(not(unix))]
fn link(_relative: PathBuf, source: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_latex_vars_contains_parameters() {
        let dir = tempdir().unwrap();
        let config = Config::default();

        write_latex_vars(&config, dir.path()).unwrap();

        let contents = fs::read_to_string(dir.path().join(LATEX_VARS_FILE)).unwrap();
        assert!(contents.contains("\\newcommand{\\softPower}{6}"));
        assert!(contents.contains("\\newcommand{\\detection}{stepwise}"));
        assert!(contents.contains("\\newcommand{\\genesetDir}{wgcna.dir/genesets.dir}"));
    }

    #[test]
    fn test_latex_vars_dashes_network_type() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.module.network_type = "signed_hybrid".to_string();

        write_latex_vars(&config, dir.path()).unwrap();

        let contents = fs::read_to_string(dir.path().join(LATEX_VARS_FILE)).unwrap();
        assert!(contents.contains("\\newcommand{\\networkType}{signed-hybrid}"));
    }

    #[test]
    fn test_genelist_sections_per_plot_group() {
        let dir = tempdir().unwrap();
        let genelists = dir.path().join("genelists.tsv");
        fs::write(
            &genelists,
            "gene\tplot_group\nFoxp3\ttreg_core\nIl2ra\ttreg_core\nCd8a\tcytotoxic\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.input.genelists = Some(genelists);

        write_genelist_sections(&config, dir.path()).unwrap();

        let contents = fs::read_to_string(dir.path().join(GENELISTS_TEX)).unwrap();
        assert!(contents.contains("\\subsection{cytotoxic genes}"));
        assert!(contents.contains("\\subsection{treg\\_core genes}"));
        assert!(contents.contains("genelist.treg_core"));
    }

    #[test]
    fn test_publish_links_present_and_skips_absent() {
        let dir = tempdir().unwrap();

        // Only two of the five canonical artifacts exist.
        fs::create_dir_all(dir.path().join(MEMBERSHIP_DIR)).unwrap();
        fs::create_dir_all(dir.path().join(LATEX_DIR)).unwrap();
        fs::write(dir.path().join(MEMBERSHIP_TABLE), "gene_id\tmodule\n").unwrap();
        fs::write(dir.path().join(REPORT_PDF), "%PDF-1.5").unwrap();

        publish_report(dir.path()).unwrap();

        let report_dir = dir.path().join(REPORT_DIR);
        assert!(report_dir.join("module.gene.membership.tsv").exists());
        assert!(report_dir.join("summary.report.pdf").exists());
        assert!(!report_dir.join("module.genesets.xlsx").exists());
        assert!(!report_dir.join("module.eigengene.heatmap.png").exists());

        // Links resolve to the actual artifact contents.
        let linked = fs::read_to_string(report_dir.join("module.gene.membership.tsv")).unwrap();
        assert_eq!(linked, "gene_id\tmodule\n");
    }

    #[test]
    fn test_publish_is_repeatable() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(MEMBERSHIP_DIR)).unwrap();
        fs::write(dir.path().join(MEMBERSHIP_TABLE), "gene_id\tmodule\n").unwrap();

        publish_report(dir.path()).unwrap();
        publish_report(dir.path()).unwrap();

        assert!(dir
            .path()
            .join(REPORT_DIR)
            .join("module.gene.membership.tsv")
            .exists());
    }

    #[test]
    fn test_internals_dispatch() {
        let dir = tempdir().unwrap();
        let internals = Internals::new(Config::default(), dir.path());

        let task = Task::new(
            "latex_vars",
            "wgcna.dir/latex.dir/report.vars.sentinel",
            crate::graph::model::Action::Internal(InternalOp::WriteLatexVars),
        );

        internals.run(InternalOp::WriteLatexVars, &task).unwrap();
        assert!(dir.path().join(LATEX_VARS_FILE).exists());

        internals.run(InternalOp::PublishReport, &task).unwrap();
        assert!(dir.path().join(REPORT_DIR).exists());
    }
}
