use crate::classifier::{self, Classification};
use crate::errors::{Error, FileError, Result};
use crate::matcher::{Matcher, PatternSpec};
use crate::report::{FileReport, Outcome, ReportBuilder, RunReport, SkipReason, StopReason};
use crate::rewriter::{self, RewriteOutcome, Rewriter, RootGuard};
use crate::walker::{FileCandidate, WalkEntry, WalkRules, Walker};
use crossbeam_channel::{Receiver, Sender};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Files above this size are skipped unless configured otherwise.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Queue slots per worker between the walk and the workers.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Upper bound on `RunOptions::worker_count`.
pub const MAX_WORKERS: usize = 1024;

/// Settings for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Offer symlinks to regular files as candidates.
    pub follow_file_symlinks: bool,
    /// Size ceiling in bytes; larger files are skipped as too large.
    pub max_file_size: u64,
    /// Gitignore-style globs for paths to leave out.
    pub exclude_globs: Vec<String>,
    /// Parallel workers. `0` means one per logical CPU.
    pub worker_count: usize,
    /// Compute everything but write nothing.
    pub dry_run: bool,
    pub skip_hidden: bool,
    pub respect_ignore_files: bool,
    /// Directory names never entered.
    pub skip_dirs: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            follow_file_symlinks: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            exclude_globs: Vec::new(),
            worker_count: 0,
            dry_run: false,
            skip_hidden: true,
            respect_ignore_files: true,
            skip_dirs: Vec::new(),
        }
    }
}

impl RunOptions {
    pub fn walk_rules(&self) -> WalkRules {
        WalkRules {
            skip_hidden: self.skip_hidden,
            respect_ignore_files: self.respect_ignore_files,
            skip_dirs: self.skip_dirs.clone(),
            exclude_globs: self.exclude_globs.clone(),
            follow_file_symlinks: self.follow_file_symlinks,
        }
    }

    pub fn workers(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_count
        }
    }
}

/// Cancellation and deadline for a run, checked between files only.
///
/// Clones share the same cancellation flag, so a clone handed to another
/// thread (a signal handler, a UI) can stop the run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Stops the run: files already being rewritten finish, nothing new is started.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns why the run should stop now, if it should.
    pub fn check(&self) -> Option<StopReason> {
        if self.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StopReason::DeadlineExceeded)
        } else {
            None
        }
    }
}

/// Receives each file's report as soon as it is final. Called from worker threads.
pub trait RunObserver: Sync {
    fn on_file(&self, report: &FileReport);
}

impl RunObserver for () {
    fn on_file(&self, _report: &FileReport) {}
}

/// Runs every pattern over every text file under `root`.
///
/// Malformed patterns and bad options fail here, before any file is opened.
/// Everything that goes wrong with individual files is in the returned report.
pub fn run(root: impl Into<PathBuf>, specs: &[PatternSpec], options: &RunOptions) -> Result<RunReport> {
    Engine::new(root, specs, options.clone())?.run(&RunControl::new(), &())
}

/// Sequences walk, classification, matching and rewriting for one root.
pub struct Engine {
    root: PathBuf,
    matchers: Vec<Box<dyn Matcher>>,
    options: RunOptions,
    rewriter: Rewriter,
}

impl Engine {
    /// Compiles `specs` in order. The first malformed pattern aborts with [`Error::Pattern`].
    pub fn new(root: impl Into<PathBuf>, specs: &[PatternSpec], options: RunOptions) -> Result<Self> {
        let matchers = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.compile().map_err(|source| Error::Pattern { index, source }))
            .collect::<Result<Vec<_>>>()?;
        Self::with_matchers(root, matchers, options)
    }

    /// Builds an engine around already-constructed matchers.
    pub fn with_matchers(root: impl Into<PathBuf>, matchers: Vec<Box<dyn Matcher>>, options: RunOptions) -> Result<Self> {
        if matchers.is_empty() {
            return Err("at least one search pattern is required".into());
        }
        if options.max_file_size == 0 {
            return Err("max file size must be greater than zero".into());
        }
        if options.worker_count > MAX_WORKERS {
            return Err(format!("worker count {} exceeds the maximum of {MAX_WORKERS}", options.worker_count).into());
        }
        let root = root.into();
        let guard = RootGuard::new(&root)?;
        if !guard.root().is_dir() {
            return Err(format!("{} is not a directory", root.display()).into());
        }
        let rewriter = Rewriter::new(guard).dry_run(options.dry_run);
        Ok(Self {
            root,
            matchers,
            options,
            rewriter,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the root and processes every candidate.
    pub fn run(&self, control: &RunControl, observer: &dyn RunObserver) -> Result<RunReport> {
        let walker = Walker::new(&self.root, self.options.walk_rules())?;
        self.run_entries(walker, control, observer)
    }

    /// Processes an arbitrary entry stream instead of walking the root.
    ///
    /// The stream is consumed on its own thread and handed to the workers
    /// through a bounded queue, so a fast producer waits for the workers
    /// instead of buffering the whole tree.
    ///
    /// Every real file is processed at most once. A file symlink whose target
    /// lies in the root is held back until the stream ends, and is processed
    /// only if nothing else reached that target.
    pub fn run_entries<I>(&self, entries: I, control: &RunControl, observer: &dyn RunObserver) -> Result<RunReport>
    where
        I: IntoIterator<Item = WalkEntry> + Send,
    {
        let workers = self.options.workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("newtext-worker-{i}"))
            .build()?;
        let report = Mutex::new(ReportBuilder::new(&self.root, self.options.dry_run));

        info!(
            root = %self.root.display(),
            workers,
            patterns = self.matchers.len(),
            dry_run = self.options.dry_run,
            "starting run"
        );

        let capacity = workers.saturating_mul(QUEUE_DEPTH_PER_WORKER);
        let (tx, rx) = crossbeam_channel::bounded::<WalkEntry>(capacity);
        std::thread::scope(|threads| {
            let report = &report;
            let producer = threads.spawn(move || {
                let mut links = LinkTargets::new(&self.root, self.rewriter.guard().root());
                let walked = entries.into_iter().filter_map(|entry| links.admit(entry));
                if feed(walked, &tx, control, report) {
                    feed(links.into_deferred(), &tx, control, report);
                }
            });

            // Each worker owns a receiver so that, once they all stop, a
            // producer blocked on a full queue is released.
            let receivers: Vec<_> = (0..workers).map(|_| rx.clone()).collect();
            drop(rx);
            pool.scope(|s| {
                for rx in receivers {
                    s.spawn(move |_| self.drain(rx, control, observer, report));
                }
            });

            if let Err(panic) = producer.join() {
                std::panic::resume_unwind(panic);
            }
        });

        let report = report.into_inner().unwrap_or_else(PoisonError::into_inner).finish();
        info!(
            scanned = report.summary.files_scanned,
            modified = report.summary.files_modified,
            skipped = report.summary.files_skipped,
            errored = report.summary.files_errored,
            stopped = ?report.stop_reason,
            "run finished"
        );
        Ok(report)
    }

    fn drain(&self, rx: Receiver<WalkEntry>, control: &RunControl, observer: &dyn RunObserver, report: &Mutex<ReportBuilder>) {
        loop {
            if let Some(reason) = control.check() {
                lock(report).stop(reason);
                return;
            }
            let Ok(entry) = rx.recv() else {
                return;
            };
            let file = self.process(entry);
            observer.on_file(&file);
            lock(report).record(file);
        }
    }

    /// Drives one entry to its terminal state.
    pub fn process(&self, entry: WalkEntry) -> FileReport {
        match entry {
            WalkEntry::Candidate(candidate) => self.process_candidate(candidate),
            WalkEntry::Skipped { path, reason } => skipped(path, None, reason),
            WalkEntry::Error(err) => errored(err.path().to_path_buf(), None, err),
        }
    }

    fn process_candidate(&self, candidate: FileCandidate) -> FileReport {
        let FileCandidate { path, size, .. } = candidate;
        let limit = self.options.max_file_size;
        if size > limit {
            return skipped(path, None, SkipReason::TooLarge { size, limit });
        }

        let (classification, content) = match read_text(&path, size) {
            Ok(read) => read,
            Err(err) => return errored(path, None, err),
        };
        let Some(content) = content else {
            return skipped(path, Some(classification), SkipReason::Binary);
        };
        // The file may have grown since it was listed.
        if content.len() as u64 > limit {
            let size = content.len() as u64;
            return skipped(path, Some(classification), SkipReason::TooLarge { size, limit });
        }

        match self.rewrite(&path, &content) {
            Ok(outcome) => {
                debug!(path = %path.display(), ?outcome, "processed");
                FileReport::new(path, Some(classification), outcome)
            }
            Err(err) => errored(path, Some(classification), err),
        }
    }

    /// Applies every matcher in order to the in-memory content, then persists once.
    fn rewrite(&self, path: &Path, original: &[u8]) -> std::result::Result<Outcome, FileError> {
        let mut current = Cow::Borrowed(original);
        let mut edits = 0;
        for matcher in &self.matchers {
            let set = matcher.find_edits(&current);
            if set.is_empty() {
                continue;
            }
            edits += set.len();
            let next = rewriter::render(&current, &set).map_err(|reason| FileError::InvalidEdits {
                path: path.to_path_buf(),
                reason,
            })?;
            current = Cow::Owned(next);
        }
        if edits == 0 {
            return Ok(Outcome::Unchanged);
        }

        Ok(match self.rewriter.replace(path, original, &current)? {
            RewriteOutcome::Unchanged => Outcome::Unchanged,
            RewriteOutcome::Modified { new_size } => Outcome::Modified {
                edits,
                new_size,
                simulated: self.options.dry_run,
            },
        })
    }
}

/// Sends entries to the workers until the stream ends (`true`) or the run
/// stops or every worker has gone (`false`).
fn feed(
    entries: impl Iterator<Item = WalkEntry>,
    tx: &Sender<WalkEntry>,
    control: &RunControl,
    report: &Mutex<ReportBuilder>,
) -> bool {
    for entry in entries {
        if let Some(reason) = control.check() {
            lock(report).stop(reason);
            return false;
        }
        if tx.send(entry).is_err() {
            return false;
        }
    }
    true
}

/// Tracks which real files the stream has reached, keyed by canonical path.
struct LinkTargets {
    root: PathBuf,
    canonical_root: PathBuf,
    seen: HashSet<PathBuf>,
    /// In-root file links with their resolved targets, in stream order.
    deferred: Vec<(PathBuf, FileCandidate)>,
}

impl LinkTargets {
    fn new(root: &Path, canonical_root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            canonical_root: canonical_root.to_path_buf(),
            seen: HashSet::new(),
            deferred: Vec::new(),
        }
    }

    /// Passes an entry through, or holds back a file link into the root.
    fn admit(&mut self, entry: WalkEntry) -> Option<WalkEntry> {
        let candidate = match entry {
            WalkEntry::Candidate(candidate) => candidate,
            other => return Some(other),
        };

        if !candidate.is_symlink {
            let real = self.canonical(&candidate.path);
            self.seen.insert(real);
            return Some(WalkEntry::Candidate(candidate));
        }

        // Unresolvable or out-of-root links go straight on; reading or the
        // root guard reports them.
        let Ok(target) = fs::canonicalize(&candidate.path) else {
            return Some(WalkEntry::Candidate(candidate));
        };
        if !target.starts_with(&self.canonical_root) {
            return Some(WalkEntry::Candidate(candidate));
        }
        if self.seen.contains(&target) {
            return Some(duplicate_link(candidate.path, &target));
        }
        self.deferred.push((target, candidate));
        None
    }

    /// The held-back links: the first link to a target nothing else reached
    /// is processed, every other one is skipped.
    fn into_deferred(self) -> impl Iterator<Item = WalkEntry> {
        let mut seen = self.seen;
        self.deferred.into_iter().map(move |(target, candidate)| {
            if seen.insert(target.clone()) {
                WalkEntry::Candidate(candidate)
            } else {
                duplicate_link(candidate.path, &target)
            }
        })
    }

    /// The canonical form of a non-link path from the stream. Walked paths
    /// sit under the root with no links in between, so no syscall is needed.
    fn canonical(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) => self.canonical_root.join(rel),
            Err(_) => fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
        }
    }
}

fn duplicate_link(path: PathBuf, target: &Path) -> WalkEntry {
    debug!(path = %path.display(), target = %target.display(), "link target already processed");
    WalkEntry::Skipped {
        path,
        reason: SkipReason::Symlink,
    }
}

/// Opens `path` once, classifies its leading sample, and reads the rest only
/// for text files. Returns `None` content for binary files.
fn read_text(path: &Path, size_hint: u64) -> std::result::Result<(Classification, Option<Vec<u8>>), FileError> {
    let read_err = |source| FileError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;
    let mut buf = Vec::with_capacity(size_hint.min(classifier::SAMPLE_SIZE as u64) as usize);
    let classification = classifier::sniff(&mut file, &mut buf).map_err(read_err)?;
    if classification == Classification::Binary {
        return Ok((classification, None));
    }
    buf.reserve((size_hint as usize).saturating_sub(buf.len()));
    file.read_to_end(&mut buf).map_err(read_err)?;
    Ok((classification, Some(buf)))
}

fn skipped(path: PathBuf, classification: Option<Classification>, reason: SkipReason) -> FileReport {
    debug!(path = %path.display(), %reason, "skipped");
    FileReport::new(path, classification, Outcome::Skipped(reason))
}

fn errored(path: PathBuf, classification: Option<Classification>, err: FileError) -> FileReport {
    warn!(path = %path.display(), "{err}");
    FileReport::new(path, classification, Outcome::from(err))
}

fn lock(report: &Mutex<ReportBuilder>) -> std::sync::MutexGuard<'_, ReportBuilder> {
    report.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EditError;
    use crate::matcher::{EditSet, MatchSpan};
    use crate::report::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    /// Emits the same two overlapping spans for any non-empty content.
    struct OverlappingMatcher;

    impl Matcher for OverlappingMatcher {
        fn find_edits(&self, content: &[u8]) -> EditSet {
            if content.len() < 3 {
                return EditSet::default();
            }
            let span = |start, end| MatchSpan {
                start,
                end,
                replacement: b"!".to_vec(),
            };
            EditSet::new(vec![span(0, 2), span(1, 3)])
        }
    }

    struct CancelAfterFirst(RunControl);

    impl RunObserver for CancelAfterFirst {
        fn on_file(&self, _report: &FileReport) {
            self.0.cancel();
        }
    }

    fn candidate(path: PathBuf) -> WalkEntry {
        let size = fs::metadata(&path).unwrap().len();
        WalkEntry::Candidate(FileCandidate {
            path,
            size,
            modified: None,
            is_symlink: false,
        })
    }

    fn single_worker() -> RunOptions {
        RunOptions {
            worker_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_contract_violation_is_rejected_before_writing() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "abcdef").unwrap();

        let engine = Engine::with_matchers(tmp.path(), vec![Box::new(OverlappingMatcher)], single_worker()).unwrap();
        let report = engine.run(&RunControl::new(), &()).unwrap();

        let entry = report.get(&file).unwrap();
        assert!(matches!(entry.outcome, Outcome::Errored { kind: ErrorKind::InvalidEdits, .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "abcdef");
        assert!(report.has_errors());

        let err = FileError::InvalidEdits {
            path: file.clone(),
            reason: EditError::Overlap {
                start: 1,
                end: 3,
                previous_end: 2,
            },
        };
        assert_eq!(Outcome::from(err), entry.outcome);
    }

    #[test]
    fn test_specs_apply_in_order_and_write_once() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "alpha beta").unwrap();

        let specs = [PatternSpec::literal("alpha", "beta"), PatternSpec::regex("beta", "gamma")];
        let report = run(tmp.path(), &specs, &single_worker()).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "gamma gamma");
        assert_eq!(
            report.get(&file).unwrap().outcome,
            Outcome::Modified {
                edits: 3,
                new_size: 11,
                simulated: false
            }
        );
    }

    #[test]
    fn test_edits_that_cancel_out_leave_file_unchanged() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let specs = [PatternSpec::literal("x", "y"), PatternSpec::literal("y", "x")];
        let report = run(tmp.path(), &specs, &single_worker()).unwrap();

        assert_eq!(report.get(&file).unwrap().outcome, Outcome::Unchanged);
        assert_eq!(report.summary.files_modified, 0);
    }

    #[test]
    fn test_size_ceiling_skips_large_files() {
        let tmp = TempDir::new().unwrap();
        let big = tmp.path().join("big.txt");
        let small = tmp.path().join("small.txt");
        fs::write(&big, "foo ".repeat(100)).unwrap();
        fs::write(&small, "foo").unwrap();

        let options = RunOptions {
            max_file_size: 64,
            ..single_worker()
        };
        let report = run(tmp.path(), &[PatternSpec::literal("foo", "bar")], &options).unwrap();

        assert_eq!(
            report.get(&big).unwrap().outcome,
            Outcome::Skipped(SkipReason::TooLarge { size: 400, limit: 64 })
        );
        assert_eq!(fs::read_to_string(&small).unwrap(), "bar");
        assert!(fs::read_to_string(&big).unwrap().starts_with("foo"));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::new(tmp.path(), &[PatternSpec::literal("a", "b")], single_worker()).unwrap();
        let gone = WalkEntry::Candidate(FileCandidate {
            path: tmp.path().join("gone.txt"),
            size: 1,
            modified: None,
            is_symlink: false,
        });

        let report = engine.run_entries(vec![gone], &RunControl::new(), &()).unwrap();
        let (_, kind, _) = report.errors().next().unwrap();
        assert_eq!(kind, ErrorKind::Read);
        assert_eq!(report.summary.files_scanned, 1);
    }

    #[test]
    fn test_cancellation_stops_dequeuing() {
        let tmp = TempDir::new().unwrap();
        let mut entries = Vec::new();
        for i in 0..20 {
            let path = tmp.path().join(format!("f{i:02}.txt"));
            fs::write(&path, "foo").unwrap();
            entries.push(candidate(path));
        }

        let control = RunControl::new();
        let observer = CancelAfterFirst(control.clone());
        let engine = Engine::new(tmp.path(), &[PatternSpec::literal("foo", "bar")], single_worker()).unwrap();
        let report = engine.run_entries(entries, &control, &observer).unwrap();

        assert_eq!(report.stop_reason, Some(StopReason::Cancelled));
        assert_eq!(report.files.len(), 1);
        let done = &report.files[0].path;
        for i in 0..20 {
            let path = tmp.path().join(format!("f{i:02}.txt"));
            let expected = if &path == done { "bar" } else { "foo" };
            assert_eq!(fs::read_to_string(&path).unwrap(), expected);
        }
    }

    #[test]
    fn test_expired_deadline_processes_nothing() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "foo").unwrap();

        let control = RunControl::new().with_deadline(Instant::now());
        let engine = Engine::new(tmp.path(), &[PatternSpec::literal("foo", "bar")], RunOptions::default()).unwrap();
        let report = engine.run(&control, &()).unwrap();

        assert_eq!(report.stop_reason, Some(StopReason::DeadlineExceeded));
        assert!(report.files.is_empty());
        assert_eq!(fs::read_to_string(&file).unwrap(), "foo");
    }

    #[test]
    fn test_report_order_is_stable_across_worker_counts() {
        let tmp = TempDir::new().unwrap();
        for name in ["d.txt", "a.txt", "c/b.txt", "c/a.txt", "e.bin"] {
            let path = tmp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let content: &[u8] = if name.ends_with(".bin") { b"\0foo" } else { b"foo" };
            fs::write(path, content).unwrap();
        }
        let specs = [PatternSpec::literal("foo", "bar")];

        let options = RunOptions {
            dry_run: true,
            worker_count: 4,
            ..Default::default()
        };
        let parallel = run(tmp.path(), &specs, &options).unwrap();
        let sequential = run(tmp.path(), &specs, &RunOptions { worker_count: 1, ..options }).unwrap();

        let paths = |r: &RunReport| r.files.iter().map(|f| f.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&parallel), paths(&sequential));
        assert_eq!(parallel.summary, sequential.summary);
        assert_eq!(parallel.summary.files_modified, 4);
        assert_eq!(parallel.summary.files_skipped, 1);
    }

    #[cfg(unix)]
    fn link(tmp: &Path, target: &str, name: &str) -> WalkEntry {
        std::os::unix::fs::symlink(tmp.join(target), tmp.join(name)).unwrap();
        WalkEntry::Candidate(FileCandidate {
            path: tmp.join(name),
            size: fs::metadata(tmp.join(name)).unwrap().len(),
            modified: None,
            is_symlink: true,
        })
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_file_is_rewritten_once() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("z/target.txt");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        // Sorts before its target, so the walk reaches the link first.
        std::os::unix::fs::symlink(&target, tmp.path().join("a-link.txt")).unwrap();

        for worker_count in [1, 4] {
            fs::write(&target, "x").unwrap();
            let options = RunOptions {
                worker_count,
                ..Default::default()
            };
            let report = run(tmp.path(), &[PatternSpec::literal("x", "xy")], &options).unwrap();

            assert_eq!(fs::read_to_string(&target).unwrap(), "xy");
            assert_eq!(report.summary.files_modified, 1);
            assert_eq!(
                report.get(&tmp.path().join("a-link.txt")).unwrap().outcome,
                Outcome::Skipped(SkipReason::Symlink)
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_link_to_unwalked_target_is_processed_once() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("hidden.txt"), "x").unwrap();
        let entries = vec![link(tmp.path(), "hidden.txt", "one.txt"), link(tmp.path(), "hidden.txt", "two.txt")];

        let engine = Engine::new(tmp.path(), &[PatternSpec::literal("x", "xy")], single_worker()).unwrap();
        let report = engine.run_entries(entries, &RunControl::new(), &()).unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("hidden.txt")).unwrap(), "xy");
        assert_eq!(report.summary.files_modified, 1);
        assert!(matches!(
            report.get(&tmp.path().join("one.txt")).unwrap().outcome,
            Outcome::Modified { edits: 1, .. }
        ));
        assert_eq!(
            report.get(&tmp.path().join("two.txt")).unwrap().outcome,
            Outcome::Skipped(SkipReason::Symlink)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_link_after_its_target_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("real.txt"), "x").unwrap();
        let entries = vec![
            candidate(tmp.path().join("real.txt")),
            link(tmp.path(), "real.txt", "alias.txt"),
        ];

        let engine = Engine::new(tmp.path(), &[PatternSpec::literal("x", "xy")], single_worker()).unwrap();
        let report = engine.run_entries(entries, &RunControl::new(), &()).unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("real.txt")).unwrap(), "xy");
        assert_eq!(report.summary.files_modified, 1);
        assert_eq!(report.summary.files_skipped, 1);
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let options = RunOptions {
            worker_count: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            Engine::new(tmp.path(), &[PatternSpec::literal("a", "b")], options),
            Err(Error::Config(_))
        ));
        let options = RunOptions {
            worker_count: MAX_WORKERS,
            ..Default::default()
        };
        assert!(Engine::new(tmp.path(), &[PatternSpec::literal("a", "b")], options).is_ok());
    }

    #[test]
    fn test_invalid_setup_is_fatal() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Engine::new(tmp.path(), &[], RunOptions::default()),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Engine::new(tmp.path().join("missing"), &[PatternSpec::literal("a", "b")], RunOptions::default()),
            Err(Error::Io(_))
        ));
        let options = RunOptions {
            exclude_globs: vec!["[".into()],
            ..Default::default()
        };
        let engine = Engine::new(tmp.path(), &[PatternSpec::literal("a", "b")], options).unwrap();
        assert!(matches!(engine.run(&RunControl::new(), &()), Err(Error::Walk(_))));
    }
}
