use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use hunktrace::{
    diagnose_patch, parse_patch_bytes, render_report, DiagnoseOptions, FsLineSource, GitHistory,
};
use log::{info, Level, LevelFilter};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_PATCH_FILE: &str = "0001.diff";

// --- Main Application Entry Point ---

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        // Using {:?} prints the full error chain from `anyhow`.
        eprintln!("{} {:?}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Contains the primary logic of the application.
fn run(args: Args) -> Result<()> {
    setup_logging(args.verbose);
    if args.no_color {
        colored::control::set_override(false);
    }

    let content = fs::read(&args.patch)
        .with_context(|| format!("Failed to read patch file '{}'", args.patch.display()))?;
    let patch = parse_patch_bytes(&content)
        .with_context(|| format!("Failed to parse patch file '{}'", args.patch.display()))?;

    if patch.hunks.is_empty() {
        info!("No hunks found in '{}'.", args.patch.display());
        return Ok(());
    }
    info!(
        "Found {} hunk(s) across {} file(s).",
        patch.hunks.len(),
        patch.files().len()
    );

    let options = DiagnoseOptions::builder()
        .keep_going(args.keep_going)
        .token_threshold(args.token_threshold)
        .rarity_threshold(args.rarity_threshold)
        .build();

    let lines = FsLineSource::new(&args.repo);
    let history = GitHistory::new(&args.repo);
    let report = diagnose_patch(&patch, &lines, &history, &options).with_context(|| {
        format!(
            "A fatal error occurred while diagnosing '{}'",
            args.patch.display()
        )
    })?;

    print!("{}", render_report(&report));
    Ok(())
}

/// Defines the command-line arguments for the application.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Explain why a patch no longer applies and suggest the commits responsible.",
    long_about = "Locates every hunk of a unified diff in the current tree. Hunks that do not apply are aligned line by line, and the missing or intruding lines are searched for in the file's git history."
)]
struct Args {
    /// Path to the unified diff to diagnose.
    #[arg(short, long, default_value = DEFAULT_PATCH_FILE)]
    patch: PathBuf,
    /// Root of the git repository the patch targets.
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,
    /// Report hunks whose target file cannot be read instead of aborting.
    #[arg(long)]
    keep_going: bool,
    /// Only search history for lines whose longest word is longer than this.
    #[arg(long, default_value_t = DiagnoseOptions::default().token_threshold)]
    token_threshold: usize,
    /// Only search history for gap lines occurring fewer times than this in the file.
    #[arg(long, default_value_t = DiagnoseOptions::default().rarity_threshold)]
    rarity_threshold: usize,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Increase logging verbosity. Can be used multiple times.
    #[arg(short, long, action = clap::ArgAction::Count, long_help = "Increase logging verbosity.\n-v for info, -vv for debug, -vvv for trace.")]
    verbose: u8,
}

/// Sets up the global logger on stderr.
fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();
}
