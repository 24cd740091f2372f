use std::path::{Path, PathBuf};
use thiserror::Error;

/// The primary error type for run-level failures in `newtext`.
///
/// Anything in this enum aborts a run before (or instead of) touching files.
/// Problems confined to a single file are [`FileError`]s and end up in the
/// run report instead.
#[derive(Error, Debug)]
pub enum Error {
    /// A search definition could not be compiled. Detected before any file is visited.
    #[error("Invalid pattern #{index}: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: PatternError,
    },

    /// An error related to file system I/O outside of per-file processing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred while parsing a YAML configuration file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A general configuration-related error.
    #[error("Config error: {0}")]
    Config(String),

    /// An invalid exclude glob or traversal setup error from the `ignore` crate.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An error related to CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenient type alias for `Result<T, newtext::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}

/// Why a `PatternSpec` could not be turned into a matcher.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("search text must not be empty")]
    Empty,

    #[error("{0}")]
    Regex(#[from] regex::Error),

    #[error("{0}")]
    Literal(#[from] aho_corasick::BuildError),
}

/// A failure confined to one file. The run records it and moves on.
#[derive(Error, Debug)]
pub enum FileError {
    /// The file (or its classification sample) could not be read.
    #[error("read failed for {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Staging, syncing or renaming the replacement failed. The original is intact.
    #[error("write failed for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A symlinked file resolves to a target outside the run root.
    #[error("refusing to write {path}: target {target} is outside {root}")]
    OutsideRoot {
        path: PathBuf,
        target: PathBuf,
        root: PathBuf,
    },

    /// The matcher produced spans that cannot be applied.
    #[error("invalid edits for {path}: {reason}")]
    InvalidEdits { path: PathBuf, reason: EditError },

    /// The walker could not read a directory entry.
    #[error("walk failed at {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

impl FileError {
    /// The path the failure is about.
    pub fn path(&self) -> &Path {
        match self {
            FileError::Read { path, .. }
            | FileError::Write { path, .. }
            | FileError::OutsideRoot { path, .. }
            | FileError::InvalidEdits { path, .. }
            | FileError::Walk { path, .. } => path,
        }
    }
}

/// A violation of the match span contract: sorted, non-overlapping, non-empty, in bounds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("span [{start}, {end}) is empty or reversed")]
    EmptySpan { start: usize, end: usize },

    #[error("span [{start}, {end}) overlaps or precedes the previous span ending at {previous_end}")]
    Overlap {
        start: usize,
        end: usize,
        previous_end: usize,
    },

    #[error("span [{start}, {end}) exceeds content length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },
}
