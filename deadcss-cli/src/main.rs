//! deadcss CLI - unused CSS rule pruner for component templates.
//!
//! Features:
//! - Pairs `name.html` with `name.css` / `name.scss` / `name.less` per directory
//! - Angular `[ngClass]` and Vue `:class` literal detection
//! - Rayon-powered parallel processing
//! - Timestamped backups and atomic rewrites
//! - `--check` mode for CI

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};

use deadcss_core::{
    init_structured_logging, load_config, load_config_file, log_error, print_json, print_plain,
    Deadcss, DeadcssConfig, RunReport,
};

/// Exit code for a run that found (or with `--check`, would make) changes.
const EXIT_CHANGES: i32 = 1;
/// Exit code for fatal errors and panics.
const EXIT_FATAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remove unused CSS rules from component stylesheets")]
pub struct Cli {
    /// Directory to scan
    #[arg(default_value = ".")]
    path: String,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Show what would be pruned without modifying any file
    #[arg(long)]
    dry_run: bool,

    /// Do not keep a .bak copy of rewritten stylesheets
    #[arg(long)]
    no_backup: bool,

    /// Exit with code 1 if any stylesheet would change (implies --dry-run)
    #[arg(long)]
    check: bool,

    /// Extra class prefix that is always kept (repeatable, or comma-separated)
    #[arg(long, value_name = "PREFIX", action = ArgAction::Append, value_delimiter = ',')]
    ignore_prefix: Vec<String>,

    /// Extra directory name to skip (repeatable, or comma-separated)
    #[arg(long, value_name = "DIR", action = ArgAction::Append, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Configuration file (defaults to deadcss.toml in PATH)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write the JSON report to a file
    #[arg(long, value_name = "FILE")]
    report_file: Option<String>,
}

impl Cli {
    fn is_dry_run(&self) -> bool {
        self.dry_run || self.check
    }
}

/// Validates an output file path for security.
///
/// Rejects:
/// - Absolute paths (must be relative to current directory)
/// - Paths containing `..` (parent directory traversal)
/// - Paths with null bytes
fn validate_output_path(path: &str) -> Result<PathBuf> {
    if path.contains('\0') {
        return Err(anyhow!("Output path contains null bytes"));
    }

    let p = PathBuf::from(path);

    if p.is_absolute() {
        return Err(anyhow!(
            "Output path must be relative, not absolute: {}",
            path
        ));
    }

    if p
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(anyhow!(
            "Path traversal (..) not allowed in output paths: {}",
            path
        ));
    }

    Ok(p)
}

/// Config from `--config`, else `deadcss.toml` in the scanned directory.
fn resolve_config(cli: &Cli, root: &Path) -> Result<Option<DeadcssConfig>> {
    match &cli.config {
        Some(file) => load_config_file(file)
            .map(Some)
            .with_context(|| format!("Failed to load config {}", file.display())),
        None => load_config(root).context("Failed to load deadcss.toml"),
    }
}

fn build_run(cli: &Cli, root: &Path, config: Option<&DeadcssConfig>) -> Deadcss {
    let mut run = Deadcss::new(root);
    if let Some(cfg) = config {
        run = run.with_config(cfg);
    }
    run = run
        .add_ignore_prefixes(cli.ignore_prefix.iter().cloned())
        .exclude_dirs(cli.exclude.iter().cloned())
        .dry_run(cli.is_dry_run());
    if cli.no_backup {
        run = run.backup(false);
    }
    run
}

fn write_report_file(path: &str, report: &RunReport) -> Result<()> {
    let safe_path = validate_output_path(path)?;
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(&safe_path, json)
        .with_context(|| format!("Failed to write report to {}", safe_path.display()))?;
    Ok(())
}

fn exit_code(cli: &Cli, report: &RunReport) -> i32 {
    if cli.check && report.has_changes() {
        EXIT_CHANGES
    } else {
        0
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = PathBuf::from(&cli.path);
    let config = resolve_config(&cli, &root)?;

    let report = build_run(&cli, &root, config.as_ref())
        .run()
        .with_context(|| format!("Failed to process {}", root.display()))?;

    let json = cli.json || config.as_ref().is_some_and(DeadcssConfig::wants_json);
    if json {
        print_json(&report);
    } else {
        print_plain(&report);
    }

    if let Some(file) = &cli.report_file {
        // A failed report write does not undo the run
        if let Err(e) = write_report_file(file, &report) {
            eprintln!("[WARN] {:#}", e);
        }
    }

    Ok(exit_code(&cli, &report))
}

fn main() {
    // Global panic guard
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] deadcss internal error: {}", info);
        eprintln!("[PANIC] The process will exit with code {}.", EXIT_FATAL);
        std::process::exit(EXIT_FATAL);
    }));

    // Initialize structured logging (JSON to stderr, respects RUST_LOG)
    init_structured_logging();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log_error(&format!("{:#}", e));
            eprintln!("[ERROR] {:#}", e);
            std::process::exit(EXIT_FATAL);
        }
    }
}
