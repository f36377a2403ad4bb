//! Task Graph Construction
//!
//! Registers every pipeline task with its artifacts, activation flag and
//! resolved invocation. Which branches participate in a run is decided
//! here, once, from configuration: the module detection strategy selects
//! one of two alternatives, and the genelist and geneset branches only
//! exist when their inputs are configured.

use std::path::{Path, PathBuf};

use crate::config::{Config, Detection};
use crate::graph::model::{swap_suffix, Action, CategoryMode, InternalOp, Invocation, Task};
use crate::graph::registry::TaskRegistry;

use super::{
    default_tex_dir, PipelineError, ANNOTATION_DIR, CLEAN_DIR, EIGENGENES_DIR, EIGENGENE_TABLE,
    GENELISTS_TEX, GENESETS_DIR, GENESET_WORKBOOK, LATEX_DIR, LATEX_VARS_FILE, MEMBERSHIP_DIR,
    MEMBERSHIP_TABLE, MODULES_DIR, REPORT_PDF, SCRIPTS_DIR, SOFT_POWER_DIR,
};

const ANNOTATION_SENTINEL: &str = "annotation.dir/genesets.sentinel";
const ANNOTATION_ENTREZ: &str = "annotation.dir/ensembl.to.entrez.tsv.gz";
const ANNOTATION_KEGG: &str = "annotation.dir/kegg_pathways.rds";

const CLEAN_SENTINEL: &str = "wgcna.dir/clean.dir/clean.sentinel";
const CLEAN_DATA: &str = "wgcna.dir/clean.dir/clean.RData";

const SOFT_POWER_SENTINEL: &str = "wgcna.dir/soft.power.dir/soft.power.sentinel";

const ADJACENCY_SENTINEL: &str = "wgcna.dir/modules.dir/adjacency.sentinel";
const ADJACENCY_DATA: &str = "wgcna.dir/modules.dir/adjacency.RData";
const TOM_SENTINEL: &str = "wgcna.dir/modules.dir/TOM.sentinel";
const TOM_DATA: &str = "wgcna.dir/modules.dir/TOM.RData";
const MODULES_SENTINEL: &str = "wgcna.dir/modules.dir/modules.sentinel";
const MODULES_DATA: &str = "wgcna.dir/modules.dir/modules.RData";

const MEMBERSHIP_SENTINEL: &str = "wgcna.dir/membership.dir/membership.sentinel";
const EIGENGENES_SENTINEL: &str = "wgcna.dir/eigengenes.dir/eigengenes.sentinel";
const GENELISTS_SENTINEL: &str = "wgcna.dir/eigengenes.dir/eigengenes.vs.genelists.sentinel";

const GENESET_SENTINEL: &str = "wgcna.dir/genesets.dir/geneset.analysis.sentinel";
const GENESET_INSTANCE_LOG: &str = "wgcna.dir/genesets.dir/geneset.analysis.{category}.log";
const SUMMARISE_SENTINEL: &str = "wgcna.dir/genesets.dir/summarise.geneset.analysis.sentinel";

const LATEX_VARS_SENTINEL: &str = "wgcna.dir/latex.dir/report.vars.sentinel";
const REPORT_SENTINEL: &str = "wgcna.dir/latex.dir/report.sentinel";
const PUBLISH_SENTINEL: &str = "report.dir/report.sentinel";

/// Column of the membership table that drives the geneset fan-out.
const MODULE_COLUMN: &str = "module";

/// The log path paired with a sentinel.
fn sentinel_log(sentinel: &str) -> PathBuf {
    swap_suffix(Path::new(sentinel), ".sentinel", ".log")
}

/// An `Rscript` invocation for one of the analysis scripts.
fn rscript(scripts_dir: &Path, script: &str, log: PathBuf) -> Invocation {
    Invocation::new("Rscript", log).raw_arg(scripts_dir.join(script).display().to_string())
}

/// Boolean in the form the R scripts parse.
fn r_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Builds the complete task registry for a run.
///
/// The graph is static; only activation flags vary with configuration.
/// Input files must already have been checked with
/// [`Config::validate_inputs`].
pub fn build(config: &Config) -> Result<TaskRegistry, PipelineError> {
    let expression = config.input.expression_data()?.to_path_buf();
    let scripts = config
        .run
        .scripts_dir
        .clone()
        .unwrap_or_else(|| SCRIPTS_DIR.clone());
    let tex = config
        .run
        .tex_dir
        .clone()
        .unwrap_or_else(|| default_tex_dir(&scripts));

    let stepwise = config.module.detection == Detection::Stepwise;
    let with_genelists = config.input.genelists.is_some();
    let with_genesets = config.genesets.run;
    let (gmt_names, gmt_files) = config.gmt.names_and_files();

    let mut registry = TaskRegistry::new();

    // Ensembl to Entrez mappings and KEGG pathway sets. Needs network
    // access, so it runs up front and is cached by its sentinel.
    registry.register(
        Task::new(
            "fetch_annotations",
            ANNOTATION_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_fetch_geneset_annotations.R",
                sentinel_log(ANNOTATION_SENTINEL),
            )
            .arg("ensemblversion", &config.annotation.ensembl_release)
            .arg("ensemblhost", &config.annotation.ensembl_host)
            .arg("species", &config.annotation.species)
            .arg("outdir", ANNOTATION_DIR)]),
        )
        .with_output(ANNOTATION_ENTREZ)
        .with_output(ANNOTATION_KEGG),
    )?;

    let mut clean = rscript(&scripts, "wgcna_data_cleaning.R", sentinel_log(CLEAN_SENTINEL))
        .arg("input", expression.display())
        .arg("idcol", &config.annotation.idcol)
        .arg("outdir", CLEAN_DIR)
        .arg("outfilename", "clean.RData")
        .arg("minfraction", config.clean.min_fraction)
        .arg("minnsamples", config.clean.min_n_samples)
        .arg("minngenes", config.clean.min_n_genes)
        .arg("minrelativeweight", config.clean.min_relative_weight)
        .arg("cutheight", config.clean.cut_height)
        .arg("minsize", config.clean.min_size);
    if let Some(traits) = &config.input.trait_data {
        clean = clean.arg("traitdata", traits.display());
    }
    registry.register(
        Task::new("clean_data", CLEAN_SENTINEL, Action::Exec(vec![clean]))
            .with_output(CLEAN_DATA),
    )?;

    registry.register(
        Task::new(
            "soft_power",
            SOFT_POWER_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_soft_power.R",
                sentinel_log(SOFT_POWER_SENTINEL),
            )
            .arg("input", CLEAN_DATA)
            .arg("outdir", SOFT_POWER_DIR)
            .arg("networktype", &config.module.network_type)
            .arg("adjcorfnc", &config.module.adj_cor_fnc)
            .arg("adjdistfnc", &config.module.adj_dist_fnc)
            .arg("threads", config.module.threads)]),
        )
        .with_input(CLEAN_SENTINEL),
    )?;

    // Step by step module detection: adjacency, then topological overlap,
    // then tree cutting and merging.
    registry.register(
        Task::new(
            "compute_adjacency",
            ADJACENCY_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_compute_adjacency.R",
                sentinel_log(ADJACENCY_SENTINEL),
            )
            .arg("input", CLEAN_DATA)
            .arg("outdir", MODULES_DIR)
            .arg("outfilename", "adjacency.RData")
            .arg("threads", config.module.threads)
            .arg("softpower", config.module.soft_power)
            .arg("networktype", &config.module.network_type)
            .arg("adjcorfnc", &config.module.adj_cor_fnc)
            .arg("adjdistfnc", &config.module.adj_dist_fnc)]),
        )
        .with_input(CLEAN_SENTINEL)
        .with_output(ADJACENCY_DATA)
        .active_if(stepwise),
    )?;

    registry.register(
        Task::new(
            "compute_tom",
            TOM_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_compute_TOM.R",
                sentinel_log(TOM_SENTINEL),
            )
            .arg("input", ADJACENCY_DATA)
            .arg("outdir", MODULES_DIR)
            .arg("outfilename", "TOM.RData")
            .arg("threads", config.module.threads)
            .arg("tomtype", &config.module.tom_type)]),
        )
        .with_input(ADJACENCY_SENTINEL)
        .with_output(TOM_DATA)
        .active_if(stepwise),
    )?;

    registry.register(
        Task::new(
            "detect_modules",
            MODULES_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_detect_modules.R",
                sentinel_log(MODULES_SENTINEL),
            )
            .arg("cleandata", CLEAN_DATA)
            .arg("tomdata", TOM_DATA)
            .arg("outdir", MODULES_DIR)
            .arg("outfilename", "modules.RData")
            .arg("threads", config.module.threads)
            .arg("softpower", config.module.soft_power)
            .arg("minmodulesize", config.module.min_size)
            .arg("medissthreshold", config.module.diss_threshold)
            .arg("adjcorfnc", &config.module.adj_cor_fnc)]),
        )
        .with_input(TOM_SENTINEL)
        .with_input(CLEAN_SENTINEL)
        .with_output(MODULES_DATA)
        .active_if(stepwise),
    )?;

    // Blockwise alternative: one call covering adjacency, TOM and cutting.
    // Shares the module outputs with the stepwise chain; configuration
    // selects exactly one of the two.
    registry.register(
        Task::new(
            "detect_modules_blockwise",
            MODULES_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_detect_modules_blockwise.R",
                sentinel_log(MODULES_SENTINEL),
            )
            .arg("input", CLEAN_DATA)
            .arg("outdir", MODULES_DIR)
            .arg("outfilename", "modules.RData")
            .arg("threads", config.module.threads)
            .arg("maxblocksize", config.module.block_size)
            .arg("softpower", config.module.soft_power)
            .arg("networktype", &config.module.network_type)
            .arg("adjcorfnc", &config.module.adj_cor_fnc)
            .arg("adjdistfnc", &config.module.adj_dist_fnc)
            .arg("tomtype", &config.module.tom_type)
            .arg("minmodulesize", config.module.min_size)
            .arg("medissthreshold", config.module.diss_threshold)]),
        )
        .with_input(CLEAN_SENTINEL)
        .with_output(MODULES_DATA)
        .active_if(!stepwise),
    )?;

    registry.register(
        Task::new(
            "characterise_modules",
            MEMBERSHIP_SENTINEL,
            Action::Exec(vec![rscript(
                &scripts,
                "wgcna_modules_vs_traits.R",
                sentinel_log(MEMBERSHIP_SENTINEL),
            )
            .arg("input", CLEAN_DATA)
            .arg("modules", MODULES_DATA)
            .arg("annotation", ANNOTATION_ENTREZ)
            .arg("idcol", &config.annotation.idcol)
            .arg("namecol", &config.annotation.namecol)
            .arg("outdir", MEMBERSHIP_DIR)
            .arg("outfilename", "membership.tsv")
            .arg("threads", config.module.threads)]),
        )
        .with_input(MODULES_SENTINEL)
        .with_input(ANNOTATION_SENTINEL)
        .with_input(CLEAN_SENTINEL)
        .with_output(MEMBERSHIP_TABLE)
        .with_output(EIGENGENE_TABLE),
    )?;

    let mut eigengenes = rscript(
        &scripts,
        "wgcna_characterise_eigengenes.R",
        sentinel_log(EIGENGENES_SENTINEL),
    )
    .arg("eigengenes", EIGENGENE_TABLE)
    .arg("namecol", &config.annotation.namecol)
    .arg("membership", MEMBERSHIP_TABLE)
    .arg("params", "pipeline.yml");
    if let Some(traits) = &config.input.trait_data {
        eigengenes = eigengenes.arg("traitdata", traits.display());
    }
    if let Some(meta) = &config.input.meta_data {
        eigengenes = eigengenes.arg("metadata", meta.display());
    }
    eigengenes = eigengenes
        .arg("figwidth", config.plot.eigengene_heatmap_width)
        .arg("figheight", config.plot.eigengene_heatmap_height)
        .arg("outdir", EIGENGENES_DIR);
    registry.register(
        Task::new(
            "characterise_eigengenes",
            EIGENGENES_SENTINEL,
            Action::Exec(vec![eigengenes]),
        )
        .with_input(MEMBERSHIP_SENTINEL),
    )?;

    if let Some(genelists) = &config.input.genelists {
        registry.register(
            Task::new(
                "eigengenes_vs_genelists",
                GENELISTS_SENTINEL,
                Action::Exec(vec![rscript(
                    &scripts,
                    "wgcna_eigengenes_vs_genelists.R",
                    sentinel_log(GENELISTS_SENTINEL),
                )
                .arg("input", CLEAN_DATA)
                .arg("annotation", ANNOTATION_ENTREZ)
                .arg("modules", MODULES_DATA)
                .arg("genelists", genelists.display())
                .arg("idcol", &config.annotation.idcol)
                .arg("namecol", &config.annotation.namecol)
                .arg("outdir", EIGENGENES_DIR)]),
            )
            .with_input(MODULES_SENTINEL)
            .with_input(ANNOTATION_SENTINEL)
            .with_input(CLEAN_SENTINEL),
        )?;
    }

    // Over-enrichment testing, one invocation per detected module. The
    // module set is only known once the membership table exists, so the
    // expansion happens at execution time.
    registry.register(
        Task::new(
            "geneset_analysis",
            GENESET_SENTINEL,
            Action::Categorised {
                table: PathBuf::from(MEMBERSHIP_TABLE),
                column: MODULE_COLUMN.to_string(),
                template: rscript(
                    &scripts,
                    "wgcna_modules_vs_genesets.R",
                    PathBuf::from(GENESET_INSTANCE_LOG),
                )
                .arg("input", MEMBERSHIP_TABLE)
                .arg("module", "{category}")
                .arg("species", &config.annotation.species)
                .arg("annotation", ANNOTATION_ENTREZ)
                .arg("idcol", &config.annotation.idcol)
                .arg("kegg_pathways", ANNOTATION_KEGG)
                .arg("gmt_names", &gmt_names)
                .arg("gmt_files", &gmt_files)
                .arg("outdir", GENESETS_DIR),
                mode: CategoryMode::PerValue,
            },
        )
        .with_input(MEMBERSHIP_SENTINEL)
        .with_input(ANNOTATION_SENTINEL)
        .active_if(with_genesets),
    )?;

    registry.register(
        Task::new(
            "summarise_genesets",
            SUMMARISE_SENTINEL,
            Action::Categorised {
                table: PathBuf::from(MEMBERSHIP_TABLE),
                column: MODULE_COLUMN.to_string(),
                template: rscript(
                    &scripts,
                    "wgcna_summariseGenesets.R",
                    sentinel_log(SUMMARISE_SENTINEL),
                )
                .arg("genesetdir", GENESETS_DIR)
                .arg("gmt_names", &gmt_names)
                .arg("show_detailed", r_bool(config.genesets.show_detailed))
                .arg("modulelist", "{categories}")
                .arg("mingenes", config.genesets.min_fg_genes)
                .arg("pvaluethreshold", config.genesets.pvalue_threshold)
                .arg("padjustmethod", &config.genesets.padjust_method)
                .arg("useadjusted", r_bool(config.genesets.use_adjusted_pvalues))
                .arg("minoddsratio", config.genesets.min_odds_ratio)
                .arg("showcommon", r_bool(config.genesets.show_common))
                .arg("outprefix", "wgcna.dir/genesets.dir/cluster.genesets")
                .arg("prefix", "genesets")
                .arg("plotdirvar", "clusterGenesetsDir"),
                mode: CategoryMode::Joined,
            },
        )
        .with_input(GENESET_SENTINEL)
        .with_input(MEMBERSHIP_SENTINEL)
        .with_output(GENESET_WORKBOOK)
        .active_if(with_genesets),
    )?;

    // LaTeX variable preamble, written by the runner itself.
    let mut latex_vars = Task::new(
        "latex_vars",
        LATEX_VARS_SENTINEL,
        Action::Internal(InternalOp::WriteLatexVars),
    )
    .with_input(SOFT_POWER_SENTINEL)
    .with_input(MEMBERSHIP_SENTINEL)
    .with_input(EIGENGENES_SENTINEL)
    .with_output(LATEX_VARS_FILE);
    if with_genesets {
        latex_vars = latex_vars.with_input(SUMMARISE_SENTINEL);
    }
    if with_genelists {
        latex_vars = latex_vars.with_input(GENELISTS_SENTINEL);
        latex_vars = latex_vars.with_output(GENELISTS_TEX);
    }
    registry.register(latex_vars)?;

    // Two pdflatex passes over the assembled section inputs, draft first.
    let tex_program = report_tex_program(&tex, with_genelists, with_genesets);
    registry.register(
        Task::new(
            "summary_report",
            REPORT_SENTINEL,
            Action::Exec(vec![
                pdflatex(&tex_program, true),
                pdflatex(&tex_program, false),
            ]),
        )
        .with_input(LATEX_VARS_SENTINEL)
        .with_output(REPORT_PDF),
    )?;

    registry.register(
        Task::new(
            "publish_report",
            PUBLISH_SENTINEL,
            Action::Internal(InternalOp::PublishReport),
        )
        .with_input(REPORT_SENTINEL),
    )?;

    Ok(registry)
}

/// A pdflatex pass over the report inputs.
fn pdflatex(tex_program: &str, draft: bool) -> Invocation {
    let mut invocation = Invocation::new("pdflatex", sentinel_log(REPORT_SENTINEL))
        .raw_arg(format!("-output-directory={}", LATEX_DIR))
        .raw_arg("-jobname=summaryReport")
        .raw_arg("-interaction=nonstopmode");
    if draft {
        invocation = invocation.raw_arg("-draftmode");
    }
    invocation.raw_arg(tex_program.to_string())
}

/// The inline TeX program assembling the report sections in order.
fn report_tex_program(tex_dir: &Path, with_genelists: bool, with_genesets: bool) -> String {
    let mut inputs: Vec<String> = vec![LATEX_VARS_FILE.to_string()];

    let mut section = |name: &str| {
        inputs.push(tex_dir.join(name).display().to_string());
    };

    section("introReport.tex");
    section("paramSection.tex");
    section("cleanSection.tex");
    section("moduleSection.tex");
    section("eigengeneSection.tex");
    if with_genelists {
        section("genelistSection.tex");
    }
    section("membershipSection.tex");
    if with_genesets {
        section("genesetSection.tex");
    }
    section("endmatter.tex");

    inputs
        .iter()
        .map(|path| format!("\\input {}", path))
        .collect::<Vec<String>>()
        .join(" ")
}
