//! Command-line argument parsing for the `taintrace` binary.

use clap::Parser;
use std::path::PathBuf;

/// Static taint analysis for C, PHP, and Python source.
#[derive(Parser, Debug)]
#[command(name = "taintrace", author, version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to analyze.
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Language module to assume when filetype detection is ambiguous.
    #[arg(short, long, value_name = "MODULE")]
    pub fallback: Option<String>,

    /// Assume a single path through each method, trading accuracy for speed.
    #[arg(short, long)]
    pub lazy: bool,

    /// Report methods at or above this cyclomatic complexity.
    #[arg(short, long, value_name = "N")]
    pub complexity: Option<usize>,

    /// Sanitizers more than this many levels from the sink are reported as unsanitized.
    #[arg(short, long, value_name = "N")]
    pub indirection: Option<usize>,

    /// Exclude files/folders matching this pattern (repeatable).
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Write the report to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Suppress non-error output.
    #[arg(short, long)]
    pub silent: bool,

    /// Emit debug-level detail.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit the report as JSON instead of plaintext.
    #[arg(long)]
    pub json: bool,

    /// Root directory containing `modules/<lang>/{sources,sinks}` rule files.
    // Mirrors `taintrace::constants::DEFAULT_MODULES_ROOT`.
    #[arg(long, value_name = "DIR", default_value = "modules")]
    pub modules: PathBuf,
}
