use crate::errors::{EditError, FileError};
use crate::matcher::EditSet;
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// What the rewriter did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// New content was persisted; `new_size` is its length in bytes.
    Modified { new_size: u64 },
    /// The edits reproduced the original content, so nothing was written.
    Unchanged,
}

/// Builds the edited content in a single pass over `original`.
///
/// Unedited ranges are copied through and each span's replacement is
/// substituted in ascending order. Spans violating the contract (overlap,
/// wrong order, empty, out of bounds) are rejected before anything is built.
pub fn render(original: &[u8], edits: &EditSet) -> Result<Vec<u8>, EditError> {
    edits.validate(original.len())?;

    let removed: usize = edits.spans().iter().map(|s| s.end - s.start).sum();
    let added: usize = edits.spans().iter().map(|s| s.replacement.len()).sum();
    let mut out = Vec::with_capacity(original.len() - removed + added);

    let mut cursor = 0;
    for span in edits {
        out.extend_from_slice(&original[cursor..span.start]);
        out.extend_from_slice(&span.replacement);
        cursor = span.end;
    }
    out.extend_from_slice(&original[cursor..]);
    Ok(out)
}

/// Keeps writes inside the run root.
///
/// Regular files are written where they are. A symlinked file is resolved,
/// and the write goes to its target only when the target lies under the
/// canonical root.
#[derive(Debug, Clone)]
pub struct RootGuard {
    root: PathBuf,
}

impl RootGuard {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path that should actually be replaced for `path`.
    ///
    /// Checked at write time, not trusted from the walk, so a file swapped
    /// for a symlink in between is still caught.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, FileError> {
        let meta = fs::symlink_metadata(path).map_err(|source| FileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.file_type().is_symlink() {
            return Ok(path.to_path_buf());
        }

        let target = path.canonicalize().map_err(|source| FileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        if !target.starts_with(&self.root) {
            return Err(FileError::OutsideRoot {
                path: path.to_path_buf(),
                target,
                root: self.root.clone(),
            });
        }
        Ok(target)
    }
}

/// Replacement content written and synced next to its target, not yet renamed into place.
///
/// Dropping a `StagedWrite` without calling [`StagedWrite::commit`] deletes the
/// temporary file and leaves the target exactly as it was.
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
    len: u64,
}

impl StagedWrite {
    /// Writes `content` to a temporary file in the target's directory, copies
    /// the target's permissions and ownership onto it, and syncs it to disk.
    pub fn stage(target: &Path, content: &[u8]) -> Result<Self, FileError> {
        let write_err = |source| FileError::Write {
            path: target.to_path_buf(),
            source,
        };

        let original = fs::metadata(target).map_err(write_err)?;
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".newtext-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;
        temp.write_all(content).map_err(write_err)?;
        temp.as_file()
            .set_permissions(original.permissions())
            .map_err(write_err)?;
        copy_ownership(temp.as_file(), &original);
        temp.as_file().sync_all().map_err(write_err)?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
            len: content.len() as u64,
        })
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Renames the staged file over the target. On failure the temporary file
    /// is removed and the target is untouched.
    pub fn commit(self) -> Result<u64, FileError> {
        let Self { temp, target, len } = self;
        temp.persist(&target).map_err(|e| FileError::Write {
            path: target.clone(),
            source: e.error,
        })?;
        sync_parent(&target);
        Ok(len)
    }
}

#[cfg(unix)]
fn copy_ownership(file: &File, original: &Metadata) {
    use std::os::unix::fs::{MetadataExt, fchown};

    let Ok(current) = file.metadata() else {
        return;
    };
    if current.uid() == original.uid() && current.gid() == original.gid() {
        return;
    }
    if let Err(e) = fchown(file, Some(original.uid()), Some(original.gid())) {
        tracing::debug!("could not copy ownership ({}:{}): {}", original.uid(), original.gid(), e);
    }
}

#[cfg(not(unix))]
fn copy_ownership(_file: &File, _original: &Metadata) {}

/// Flushes the directory entry so the rename itself survives a crash.
#[cfg(unix)]
fn sync_parent(target: &Path) {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}

/// Applies edit sets to files with the atomic-replace protocol.
///
/// In dry-run mode every step up to persistence runs, and `Modified` reports
/// the size the file would have had.
#[derive(Debug, Clone)]
pub struct Rewriter {
    guard: RootGuard,
    dry_run: bool,
}

impl Rewriter {
    pub fn new(guard: RootGuard) -> Self {
        Self { guard, dry_run: false }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn guard(&self) -> &RootGuard {
        &self.guard
    }

    /// Renders `edits` over `original` and persists the result to `path`.
    pub fn apply(&self, path: &Path, original: &[u8], edits: &EditSet) -> Result<RewriteOutcome, FileError> {
        if edits.is_empty() {
            return Ok(RewriteOutcome::Unchanged);
        }
        let updated = render(original, edits).map_err(|reason| FileError::InvalidEdits {
            path: path.to_path_buf(),
            reason,
        })?;
        self.replace(path, original, &updated)
    }

    /// Persists already-rendered content, unless it equals `original`.
    pub fn replace(&self, path: &Path, original: &[u8], updated: &[u8]) -> Result<RewriteOutcome, FileError> {
        if updated == original {
            return Ok(RewriteOutcome::Unchanged);
        }
        let new_size = if self.dry_run {
            updated.len() as u64
        } else {
            self.persist(path, updated)?
        };
        Ok(RewriteOutcome::Modified { new_size })
    }

    /// Atomically replaces the content at `path` (or its in-root symlink target).
    pub fn persist(&self, path: &Path, content: &[u8]) -> Result<u64, FileError> {
        let target = self.guard.resolve(path)?;
        StagedWrite::stage(&target, content)?.commit()
    }
}
