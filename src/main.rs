//! coexflow CLI Entry Point
//!
//! Runs the coexpression pipeline in the current (or given) run directory.
//!
//! # Usage
//!
//! ```bash
//! # Generate a default pipeline.yml and exit
//! coexflow config
//!
//! # Run the full pipeline
//! coexflow
//!
//! # Preview commands without executing
//! coexflow --dry-run
//!
//! # Run in a specific directory with more fan-out parallelism
//! coexflow --working-dir /data/analysis --parallel 8
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Local;
use colored::Colorize;
use log::{error, info};

use coexflow::config;
use coexflow::execution::Engine;
use coexflow::pipeline;
use coexflow::{APP_NAME, VERSION};

/// File written by the `config` subcommand.
const CONFIG_FILE: &str = "pipeline.yml";

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct CliOptions {
    generate_config: bool,
    dry_run: bool,
    working_dir: Option<PathBuf>,
    max_parallel: Option<usize>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Sentinel-driven coexpression pipeline runner");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: coexflow [OPTIONS] [config]");
    println!();
    println!("Subcommands:");
    println!("  config              Write a default {} and exit", CONFIG_FILE);
    println!();
    println!("Options:");
    println!("  --dry-run           Preview commands without execution");
    println!("  --working-dir PATH  Run directory (default: current directory)");
    println!("  --parallel N        Maximum concurrent fan-out instances");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  coexflow config");
    println!("  coexflow --dry-run");
    println!("  coexflow --working-dir /data/analysis --parallel 8");
}

/// Parses command-line arguments into a CliOptions struct.
fn parse_arguments(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => {
                options.dry_run = true;
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--working-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--working-dir requires a path argument".to_string());
                }
                options.working_dir = Some(PathBuf::from(&args[i]));
            }
            "--parallel" => {
                i += 1;
                if i >= args.len() {
                    return Err("--parallel requires a number argument".to_string());
                }
                options.max_parallel = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid parallel value: {}", args[i]))?,
                );
            }
            "config" => {
                options.generate_config = true;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                return Err(format!("Unexpected argument: {}", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Validates the run directory and makes it the process working directory.
fn setup_working_directory(
    working_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(dir) = working_dir else {
        info!("Run directory: {}", env::current_dir()?.display());
        return Ok(());
    };

    if !dir.exists() {
        return Err(format!("Run directory does not exist: {}", dir.display()).into());
    }

    if !dir.is_dir() {
        return Err(format!("Path is not a directory: {}", dir.display()).into());
    }

    // Change directory so relative artifact paths resolve against the run.
    env::set_current_dir(&dir)?;
    info!("Run directory: {}", env::current_dir()?.display());

    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let options = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(options.verbose);
    print_banner();

    setup_working_directory(options.working_dir)?;

    if options.generate_config {
        config::write_default(Path::new(CONFIG_FILE))?;
        println!("Wrote {}. Edit it, then run coexflow again.", CONFIG_FILE);
        return Ok(());
    }

    if options.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
        println!();
    }

    // Load and validate configuration before anything executes.
    let config = config::load(Path::new("."))?;
    config.validate_inputs()?;

    info!(
        "Configuration loaded (module detection: {})",
        config.module.detection.as_str()
    );

    // Build the graph and extract the active subgraph.
    let registry = pipeline::build(&config)?;
    let plan = registry.resolve()?;

    info!(
        "Plan: {} active tasks of {} declared",
        plan.len(),
        registry.len()
    );

    let max_parallel = options.max_parallel.unwrap_or(config.run.max_parallel);
    let internals = pipeline::report::Internals::new(config, ".");

    let mut engine = Engine::new(plan);
    engine.set_dry_run(options.dry_run);
    engine.set_max_parallel(max_parallel);

    println!("Run started at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let result = engine.run(&internals);

    println!();
    print!("{}", engine.timeline().summary());
    println!();

    match result {
        Ok(summary) => {
            println!(
                "{} ({} executed, {} up to date, {:.2?} total)",
                "Pipeline completed".green().bold(),
                summary.executed,
                summary.skipped,
                engine.timeline().elapsed()
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            println!("{}", "Pipeline failed".red().bold());
            Err(e.into())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
