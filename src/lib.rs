//! `newtext` is a library for bulk find-and-replace across a directory tree.
//!
//! It provides the core logic for the `newtext` command-line tool but can also be used
//! as a standalone library. The main components are:
//!
//! - `walker`: Lazy, deterministic traversal honoring ignore files, hidden-file rules
//!   and exclude globs. Directory symlinks are never entered.
//! - `classifier`: Decides text versus binary from a leading content sample.
//! - `matcher`: Literal (Aho-Corasick) and regex matchers producing sorted,
//!   non-overlapping edit spans over raw bytes.
//! - `rewriter`: Applies edits and replaces files atomically through a staged
//!   temporary file in the same directory.
//! - `engine`: Runs the pipeline on a worker pool fed by a bounded queue, with
//!   cancellation and deadlines, and assembles the `RunReport`.
//! - `config`: Loads rule sets and run settings from YAML files.
//!
//! Rewrites are all-or-nothing per file: a reader sees either the old content or
//! the new content, never a mix.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod matcher;
pub mod output_formatter;
pub mod report;
pub mod rewriter;
pub mod walker;

// Re-export main types for easier access by library users.
pub use engine::{run, Engine, RunControl, RunObserver, RunOptions};
pub use errors::{Error, Result};
pub use matcher::{PatternFlags, PatternKind, PatternSpec};
pub use output_formatter::{OutputFormat, OutputFormatter};
pub use report::{FileReport, Outcome, RunReport};
