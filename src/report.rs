use crate::classifier::Classification;
use crate::errors::FileError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Why a candidate was not considered for rewriting. Informational, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The content sample looks binary.
    Binary,
    /// The file exceeds the configured size ceiling.
    TooLarge { size: u64, limit: u64 },
    /// A symlink the walk does not follow (any directory link, or a file link
    /// when file symlinks are disabled).
    Symlink,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Binary => write!(f, "binary"),
            SkipReason::TooLarge { size, limit } => write!(f, "too large ({size} > {limit} bytes)"),
            SkipReason::Symlink => write!(f, "symlink"),
        }
    }
}

/// The category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Read,
    Write,
    OutsideRoot,
    InvalidEdits,
    Walk,
}

impl From<&FileError> for ErrorKind {
    fn from(e: &FileError) -> Self {
        match e {
            FileError::Read { .. } => ErrorKind::Read,
            FileError::Write { .. } => ErrorKind::Write,
            FileError::OutsideRoot { .. } => ErrorKind::OutsideRoot,
            FileError::InvalidEdits { .. } => ErrorKind::InvalidEdits,
            FileError::Walk { .. } => ErrorKind::Walk,
        }
    }
}

/// The terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Edits were applied, or would have been in a dry run (`simulated`).
    Modified {
        edits: usize,
        new_size: u64,
        simulated: bool,
    },
    /// Text file with nothing to change.
    Unchanged,
    Skipped(SkipReason),
    Errored { kind: ErrorKind, cause: String },
}

impl From<FileError> for Outcome {
    fn from(e: FileError) -> Self {
        Outcome::Errored {
            kind: ErrorKind::from(&e),
            cause: e.to_string(),
        }
    }
}

/// What happened to a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// `None` when the file never got as far as classification.
    pub classification: Option<Classification>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>, classification: Option<Classification>, outcome: Outcome) -> Self {
        Self {
            path: path.into(),
            classification,
            outcome,
        }
    }
}

/// Why a run ended before the candidate stream was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

/// Run-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files_scanned: usize,
    pub files_text: usize,
    pub files_modified: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub files_errored: usize,
    pub total_edits: usize,
}

/// The result of a run, and the only thing a run hands back.
///
/// `files` is sorted by path regardless of the order workers finished in.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: Option<StopReason>,
    pub summary: Summary,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.summary.files_errored > 0
    }

    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_none()
    }

    pub fn get(&self, path: &Path) -> Option<&FileReport> {
        self.files
            .binary_search_by(|f| f.path.as_path().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn modified(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, Outcome::Modified { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&Path, &SkipReason)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            Outcome::Skipped(reason) => Some((f.path.as_path(), reason)),
            _ => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = (&Path, ErrorKind, &str)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            Outcome::Errored { kind, cause } => Some((f.path.as_path(), *kind, cause.as_str())),
            _ => None,
        })
    }
}

/// Accumulates file reports during a run. Workers share it behind a lock.
#[derive(Debug)]
pub struct ReportBuilder {
    root: PathBuf,
    dry_run: bool,
    started_at: DateTime<Utc>,
    stop_reason: Option<StopReason>,
    summary: Summary,
    files: Vec<FileReport>,
}

impl ReportBuilder {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
            started_at: Utc::now(),
            stop_reason: None,
            summary: Summary::default(),
            files: Vec::new(),
        }
    }

    pub fn record(&mut self, report: FileReport) {
        let s = &mut self.summary;
        s.files_scanned += 1;
        if report.classification == Some(Classification::Text) {
            s.files_text += 1;
        }
        match &report.outcome {
            Outcome::Modified { edits, .. } => {
                s.files_modified += 1;
                s.total_edits += edits;
            }
            Outcome::Unchanged => s.files_unchanged += 1,
            Outcome::Skipped(_) => s.files_skipped += 1,
            Outcome::Errored { .. } => s.files_errored += 1,
        }
        self.files.push(report);
    }

    /// Marks the run as stopped early. The first reason recorded wins.
    pub fn stop(&mut self, reason: StopReason) {
        self.stop_reason.get_or_insert(reason);
    }

    pub fn finish(mut self) -> RunReport {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        RunReport {
            root: self.root,
            dry_run: self.dry_run,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stop_reason: self.stop_reason,
            summary: self.summary,
            files: self.files,
        }
    }
}
