use crate::errors::{FileError, Result};
use crate::report::SkipReason;
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{DirEntry, WalkBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Version-control metadata directories that are never entered.
pub const ALWAYS_SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// What the walk includes and leaves out.
#[derive(Debug, Clone)]
pub struct WalkRules {
    /// Skip dot-files and dot-directories.
    pub skip_hidden: bool,
    /// Honour `.gitignore`, `.ignore` and git's global/exclude files.
    pub respect_ignore_files: bool,
    /// Directory names never descended into, in addition to [`ALWAYS_SKIPPED_DIRS`].
    pub skip_dirs: Vec<String>,
    /// Gitignore-style globs, relative to the root, for paths to leave out.
    pub exclude_globs: Vec<String>,
    /// Offer symlinks that point at regular files as candidates.
    pub follow_file_symlinks: bool,
}

impl Default for WalkRules {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            respect_ignore_files: true,
            skip_dirs: Vec::new(),
            exclude_globs: Vec::new(),
            follow_file_symlinks: true,
        }
    }
}

/// A file the walk discovered, with the metadata used for gating and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// The path itself is a symlink to a regular file.
    pub is_symlink: bool,
}

/// One item of the walk: something to process, something deliberately passed
/// over, or an entry that could not be read.
#[derive(Debug)]
pub enum WalkEntry {
    Candidate(FileCandidate),
    Skipped { path: PathBuf, reason: SkipReason },
    Error(FileError),
}

impl WalkEntry {
    pub fn path(&self) -> &Path {
        match self {
            WalkEntry::Candidate(c) => &c.path,
            WalkEntry::Skipped { path, .. } => path,
            WalkEntry::Error(err) => err.path(),
        }
    }
}

/// A configured traversal of one root.
///
/// Exclude globs are compiled up front so a bad glob fails the run before any
/// file is visited. Iterating a `Walker` yields entries lazily: depth-first,
/// siblings in byte-wise file name order, directory symlinks never entered,
/// excluded directories pruned before their contents are listed. A failure on
/// one entry is yielded as [`WalkEntry::Error`] and the walk carries on.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    rules: WalkRules,
    overrides: Override,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>, rules: WalkRules) -> Result<Self> {
        let root = root.into();
        let mut builder = OverrideBuilder::new(&root);
        for glob in &rules.exclude_globs {
            builder.add(&format!("!{}", glob.trim()))?;
        }
        let overrides = builder.build()?;
        Ok(Self { root, rules, overrides })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Walks `root` under `rules`. Shorthand for `Walker::new(root, rules)?.into_iter()`.
pub fn walk(root: impl Into<PathBuf>, rules: WalkRules) -> Result<Walk> {
    Ok(Walker::new(root, rules)?.into_iter())
}

impl IntoIterator for Walker {
    type Item = WalkEntry;
    type IntoIter = Walk;

    fn into_iter(self) -> Walk {
        let mut skip: Vec<String> = ALWAYS_SKIPPED_DIRS.iter().map(|s| s.to_string()).collect();
        skip.extend(self.rules.skip_dirs.iter().cloned());
        let skip = Arc::new(skip);

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(self.rules.respect_ignore_files)
            .hidden(self.rules.skip_hidden)
            .follow_links(false)
            .overrides(self.overrides)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !is_skipped_dir(entry, &skip));

        Walk {
            inner: builder.build(),
            follow_file_symlinks: self.rules.follow_file_symlinks,
        }
    }
}

fn is_skipped_dir(entry: &DirEntry, skip: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    skip.iter().any(|s| s.as_str() == name)
}

/// The lazy entry stream produced by a [`Walker`].
pub struct Walk {
    inner: ignore::Walk,
    follow_file_symlinks: bool,
}

impl Iterator for Walk {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(WalkEntry::Error(walk_error(err))),
            };
            if let Some(item) = self.visit(entry) {
                return Some(item);
            }
        }
    }
}

impl Walk {
    fn visit(&self, entry: DirEntry) -> Option<WalkEntry> {
        let file_type = entry.file_type()?;
        let path = entry.path().to_path_buf();

        if file_type.is_symlink() {
            // Follows the link for inspection only; the walk never descends through it.
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(source) => return Some(WalkEntry::Error(FileError::Read { path, source })),
            };
            if meta.is_dir() || (meta.is_file() && !self.follow_file_symlinks) {
                return Some(WalkEntry::Skipped {
                    path,
                    reason: SkipReason::Symlink,
                });
            }
            if !meta.is_file() {
                return None;
            }
            return Some(WalkEntry::Candidate(FileCandidate {
                path,
                size: meta.len(),
                modified: meta.modified().ok(),
                is_symlink: true,
            }));
        }

        if !file_type.is_file() {
            return None;
        }
        match entry.metadata() {
            Ok(meta) => Some(WalkEntry::Candidate(FileCandidate {
                path,
                size: meta.len(),
                modified: meta.modified().ok(),
                is_symlink: false,
            })),
            Err(err) => Some(WalkEntry::Error(FileError::Walk {
                path,
                message: err.to_string(),
            })),
        }
    }
}

fn walk_error(err: ignore::Error) -> FileError {
    let path = error_path(&err).map(Path::to_path_buf).unwrap_or_default();
    FileError::Walk {
        path,
        message: err.to_string(),
    }
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => error_path(err),
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}
