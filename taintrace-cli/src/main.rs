//! Command-line entry point: discovers source files, runs the analysis
//! engine per file (reusing one ruleset per language module across files,
//! matching the original tool's module-scoped rule reuse), and writes the
//! combined report.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use taintrace::analysis::Analysis;
use taintrace::config::Config;
use taintrace::grammar;
use taintrace::method::Method;
use taintrace::report::{self, FileReport};
use taintrace::ruleset::Ruleset;
use taintrace::utils::{collect_source_files, module_for_extension, LineIndex};

fn init_tracing(verbose: bool, silent: bool) {
    use tracing_subscriber::EnvFilter;
    let level = if silent {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

struct Target {
    path: PathBuf,
    module: &'static str,
}

fn discover_targets(cli: &Cli, exclude: &[String]) -> Vec<Target> {
    let mut targets = Vec::new();
    for path in &cli.paths {
        if path.is_dir() {
            for (path, module) in collect_source_files(path, exclude, &[], cli.fallback.as_deref()) {
                targets.push(Target { path, module });
            }
        } else {
            let module = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(module_for_extension)
                .or(match cli.fallback.as_deref() {
                    Some("c") => Some("c"),
                    Some("php") => Some("php"),
                    Some("python") => Some("python"),
                    _ => None,
                });
            match module {
                Some(module) => targets.push(Target { path: path.clone(), module }),
                None => tracing::warn!(path = %path.display(), "could not detect a language module, skipping"),
            }
        }
    }
    targets
}

struct FileResult {
    path: PathBuf,
    module: &'static str,
    methods: Vec<Method>,
    lines: LineIndex,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    let verbose = cli.verbose || config.taintrace.verbose.unwrap_or(false);
    let silent = cli.silent || config.taintrace.silent.unwrap_or(false);
    init_tracing(verbose, silent);

    let lazy = cli.lazy || config.taintrace.lazy.unwrap_or(false);
    let complexity = cli.complexity.or(config.taintrace.complexity).unwrap_or(10);
    let indirection = cli.indirection.or(config.taintrace.indirection).unwrap_or(5);
    let mut exclude = cli.exclude.clone();
    if let Some(more) = &config.taintrace.exclude {
        exclude.extend(more.iter().cloned());
    }

    let targets = discover_targets(&cli, &exclude);

    let progress = if silent || cli.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::with_draw_target(Some(targets.len() as u64), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    };

    let mut rulesets: FxHashMap<&'static str, Ruleset> = FxHashMap::default();
    let mut results = Vec::with_capacity(targets.len());

    for target in &targets {
        progress.set_message(target.path.display().to_string());
        let content = std::fs::read_to_string(&target.path)
            .with_context(|| format!("reading {}", target.path.display()))?;

        let ruleset = match rulesets.remove(target.module) {
            Some(r) => r,
            None => Ruleset::load(&cli.modules, target.module)
                .with_context(|| format!("loading rules for module {}", target.module))?,
        };

        let file_grammar = grammar::build(target.module, &content)
            .with_context(|| format!("parsing {}", target.path.display()))?;
        let mut analysis = Analysis::new(file_grammar.as_ref(), ruleset);
        analysis.run(file_grammar.as_ref(), lazy);

        results.push(FileResult {
            path: target.path.clone(),
            module: target.module,
            methods: analysis.methods().to_vec(),
            lines: LineIndex::new(&content),
        });
        rulesets.insert(target.module, analysis.into_ruleset());
        progress.inc(1);
    }
    progress.finish_and_clear();

    let reports: Vec<FileReport> = results
        .iter()
        .map(|file| FileReport {
            path: &file.path,
            module: file.module,
            methods: &file.methods,
            ruleset: &rulesets[file.module],
            lines: &file.lines,
        })
        .collect();

    let mut stdout_handle;
    let mut file_handle;
    let writer: &mut dyn std::io::Write = match &cli.output {
        Some(path) => {
            file_handle = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            &mut file_handle
        }
        None => {
            stdout_handle = std::io::stdout();
            &mut stdout_handle
        }
    };

    if cli.json {
        let value = report::to_json(&reports, complexity, indirection);
        serde_json::to_writer_pretty(writer, &value)?;
    } else {
        report::write_plaintext(writer, &reports, complexity, indirection)?;
    }

    if !silent && !cli.json {
        print_summary(&results);
    }

    Ok(())
}

fn print_summary(results: &[FileResult]) {
    let taints: usize = results.iter().flat_map(|f| &f.methods).map(|m| m.taints.values().map(Vec::len).sum::<usize>()).sum();
    let sinks: usize = results.iter().flat_map(|f| &f.methods).map(|m| m.sinks.values().map(Vec::len).sum::<usize>()).sum();
    let pill = |label: &str, count: usize| {
        if count == 0 {
            format!("{label}: {}", count.to_string().green())
        } else {
            format!("{label}: {}", count.to_string().red().bold())
        }
    };
    eprintln!(
        "{}  files analyzed: {}  {}  {}",
        "Summary".cyan().bold(),
        results.len(),
        pill("taints", taints),
        pill("sinks", sinks),
    );
}
