//! CLI argument parsing for vatio

use crate::backend::BackendKind;
use crate::compare::REGRESSION_THRESHOLD_PERCENT;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vatio")]
#[command(version)]
#[command(about = "Per-function energy attribution profiler", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Profile the energy consumption of a command
    Profile(ProfileArgs),
    /// Compare two results files and fail on regressions
    Compare(CompareArgs),
    /// Generate an SVG energy badge from a results file
    Badge(BadgeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ProfileArgs {
    /// Energy measurement backend (defaults to the configured backend)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Slice measurements at a fixed interval instead of once per call
    #[arg(long)]
    pub line: bool,

    /// Write the results document to FILE
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Suppress the results table
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to profile (everything after --)
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    /// Baseline results file
    pub old: PathBuf,

    /// Results file to check
    pub new: PathBuf,

    /// Percent change counted as a regression or improvement
    #[arg(long, value_name = "PCT", default_value_t = REGRESSION_THRESHOLD_PERCENT)]
    pub threshold: f64,
}

#[derive(clap::Args, Debug)]
pub struct BadgeArgs {
    /// Results file
    pub results: PathBuf,

    /// Target total energy in mJ
    #[arg(short, long, default_value_t = 80.0)]
    pub target: f64,

    /// Write the SVG to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// PASS/FAIL badge instead of the energy value
    #[arg(long)]
    pub status_only: bool,
}
