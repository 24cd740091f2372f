//! The main entry point for the `newtext` command-line application.
//!
//! This file is responsible for parsing command-line arguments, merging them
//! with an optional config file, and running the engine from the `newtext` library.

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use newtext::cli::{self, Args};
use newtext::config::ConfigLoader;
use newtext::report::FileReport;
use newtext::{Engine, OutputFormat, OutputFormatter, PatternFlags, PatternKind, PatternSpec, RunControl, RunObserver, RunOptions};
use std::env;
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Ticks a stderr spinner as files complete.
struct Spinner(ProgressBar);

impl Spinner {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Spinner(ProgressBar::hidden());
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {pos} files {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        Spinner(pb)
    }
}

impl RunObserver for Spinner {
    fn on_file(&self, report: &FileReport) {
        self.0.inc(1);
        if let Some(name) = report.path.file_name() {
            self.0.set_message(name.to_string_lossy().into_owned());
        }
    }
}

/// `RUST_LOG` when set, otherwise a level picked by `--verbose`/`--quiet`.
fn log_filter(args: &Args) -> EnvFilter {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn init_tracing(args: &Args) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Rules from the config file first, then the one given on the command line.
fn build_specs(args: &Args, config_specs: Vec<PatternSpec>) -> anyhow::Result<Vec<PatternSpec>> {
    let mut specs = config_specs;
    if let (Some(find), Some(replace)) = (&args.find, &args.replace) {
        if find.is_empty() {
            bail!("FIND must not be empty");
        }
        specs.push(PatternSpec {
            find: find.clone(),
            replace: replace.clone(),
            kind: if args.pattern {
                PatternKind::Regex
            } else {
                PatternKind::Literal
            },
            flags: PatternFlags {
                ignore_case: args.ignore_case,
                whole_word: args.whole_word,
                multiline: args.multiline,
            },
        });
    }
    if specs.is_empty() {
        bail!("nothing to replace: give FIND and REPLACE or a config file with rules");
    }
    Ok(specs)
}

fn execute(args: Args) -> anyhow::Result<bool> {
    let mut options = RunOptions::default();
    let mut config_specs = Vec::new();

    if let Some(config_path) = &args.config {
        let cwd = env::current_dir().context("cannot determine the current directory")?;
        let path = ConfigLoader::find_config(config_path, &cwd)?;
        let config = ConfigLoader::load_replace_config(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        tracing::debug!(path = %path.display(), rules = config.rules.len(), "loaded config");
        config.apply_to(&mut options);
        config_specs = config.to_specs();
    }

    // Command-line values win over the config file.
    options.exclude_globs.extend(args.exclude.iter().cloned());
    if let Some(max) = args.max_size {
        options.max_file_size = max;
    }
    if let Some(workers) = args.workers {
        options.worker_count = workers;
    }
    if args.no_follow_symlinks {
        options.follow_file_symlinks = false;
    }
    options.skip_hidden = !args.hidden;
    options.respect_ignore_files = !args.no_ignore;
    options.dry_run = args.dry_run;

    let specs = build_specs(&args, config_specs)?;
    let engine = Engine::new(&args.dir, &specs, options)
        .with_context(|| format!("cannot start a run in {}", args.dir.display()))?;

    let mut control = RunControl::new();
    if let Some(secs) = args.timeout {
        control = control.with_timeout(Duration::from_secs(secs));
    }

    let spinner = Spinner::new(args.quiet);
    let report = engine.run(&control, &spinner)?;
    spinner.0.finish_and_clear();

    let format = OutputFormat::from(args.format.as_str());
    if !(args.quiet && format == OutputFormat::Text) {
        let formatter = OutputFormatter::new(format).verbose(args.verbose);
        formatter.write_output(&mut io::stdout().lock(), &report)?;
    } else {
        for (path, _, cause) in report.errors() {
            eprintln!("{}: {cause}", path.display());
        }
    }

    Ok(!report.has_errors())
}

/// Exit codes: 0 when every file succeeded, 1 when any file errored, 2 when the run could not start.
fn main() -> ExitCode {
    let args = cli::parse_args();
    init_tracing(&args);

    match execute(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}
