//! End-to-end runs over real temporary directory trees.

use newtext::engine::RunControl;
use newtext::report::{ErrorKind, Outcome, SkipReason, StopReason};
use newtext::{run, Engine, Error, PatternFlags, PatternSpec, RunOptions};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

#[test]
fn replaces_every_occurrence_in_text_files() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.txt", b"foo bar foo");

    let report = run(tmp.path(), &[PatternSpec::literal("foo", "baz")], &RunOptions::default()).unwrap();

    assert_eq!(read(tmp.path(), "a.txt"), "baz bar baz");
    assert_eq!(report.summary.files_modified, 1);
    assert_eq!(report.summary.total_edits, 2);
    assert_eq!(
        report.get(&tmp.path().join("a.txt")).unwrap().outcome,
        Outcome::Modified {
            edits: 2,
            new_size: 11,
            simulated: false
        }
    );
    assert!(report.is_complete());
}

#[test]
fn binary_files_are_skipped_untouched() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "img.bin", &[0, 1, 2]);

    let report = run(tmp.path(), &[PatternSpec::literal("\u{1}", "x")], &RunOptions::default()).unwrap();

    assert_eq!(fs::read(tmp.path().join("img.bin")).unwrap(), vec![0, 1, 2]);
    assert_eq!(
        report.get(&tmp.path().join("img.bin")).unwrap().outcome,
        Outcome::Skipped(SkipReason::Binary)
    );
    assert_eq!(report.summary.files_modified, 0);
}

#[test]
fn malformed_regex_fails_before_touching_files() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.txt", b"foo");
    let specs = [PatternSpec::literal("foo", "bar"), PatternSpec::regex("(unclosed", "x")];

    let err = run(tmp.path(), &specs, &RunOptions::default()).unwrap_err();

    assert!(matches!(err, Error::Pattern { index: 1, .. }));
    assert_eq!(read(tmp.path(), "a.txt"), "foo");
}

#[test]
fn empty_search_text_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let err = run(tmp.path(), &[PatternSpec::literal("", "x")], &RunOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Pattern { index: 0, .. }));
}

#[test]
fn dry_run_reports_without_writing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.txt", b"foo bar foo");
    let options = RunOptions {
        dry_run: true,
        ..Default::default()
    };

    let report = run(tmp.path(), &[PatternSpec::literal("foo", "quux")], &options).unwrap();

    assert_eq!(read(tmp.path(), "a.txt"), "foo bar foo");
    assert!(report.dry_run);
    assert_eq!(
        report.get(&tmp.path().join("a.txt")).unwrap().outcome,
        Outcome::Modified {
            edits: 2,
            new_size: 13,
            simulated: true
        }
    );
}

#[test]
fn second_run_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/lib.rs", b"fn old_name() {}\nold_name();\n");
    write(tmp.path(), "README.md", b"call old_name\n");
    let specs = [PatternSpec::literal("old_name", "new_name")];

    let first = run(tmp.path(), &specs, &RunOptions::default()).unwrap();
    let second = run(tmp.path(), &specs, &RunOptions::default()).unwrap();

    assert_eq!(first.summary.files_modified, 2);
    assert_eq!(second.summary.files_modified, 0);
    assert_eq!(second.summary.files_unchanged, 2);
    assert_eq!(read(tmp.path(), "src/lib.rs"), "fn new_name() {}\nnew_name();\n");
}

#[test]
fn regex_captures_and_flags() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "v.txt", b"Version 1.2 and version 3.4; subversion 5.6\n");
    let spec = PatternSpec::regex(r"version (?P<major>\d+)\.(\d+)", "v${major}-$2").with_flags(PatternFlags {
        ignore_case: true,
        whole_word: true,
        multiline: false,
    });

    run(tmp.path(), &[spec], &RunOptions::default()).unwrap();

    assert_eq!(read(tmp.path(), "v.txt"), "v1-2 and v3-4; subversion 5.6\n");
}

#[test]
fn non_utf8_text_is_rewritten_bytewise() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "latin1.txt", b"caf\xe9 foo caf\xe9\n");

    run(tmp.path(), &[PatternSpec::literal("foo", "bar")], &RunOptions::default()).unwrap();

    assert_eq!(fs::read(tmp.path().join("latin1.txt")).unwrap(), b"caf\xe9 bar caf\xe9\n");
}

#[test]
fn ignored_hidden_and_excluded_paths_are_not_visited() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), ".ignore", b"ignored.txt\n");
    write(tmp.path(), "ignored.txt", b"foo");
    write(tmp.path(), ".hidden/a.txt", b"foo");
    write(tmp.path(), ".git/config", b"foo");
    write(tmp.path(), "vendor/lib.txt", b"foo");
    write(tmp.path(), "keep.txt", b"foo");
    let options = RunOptions {
        exclude_globs: vec!["vendor/**".into()],
        ..Default::default()
    };

    let report = run(tmp.path(), &[PatternSpec::literal("foo", "bar")], &options).unwrap();

    assert_eq!(report.summary.files_modified, 1);
    assert_eq!(read(tmp.path(), "keep.txt"), "bar");
    for untouched in ["ignored.txt", ".hidden/a.txt", ".git/config", "vendor/lib.txt"] {
        assert_eq!(read(tmp.path(), untouched), "foo", "{untouched}");
    }
}

#[test]
fn oversized_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "big.txt", &b"foo\n".repeat(64));
    let options = RunOptions {
        max_file_size: 100,
        ..Default::default()
    };

    let report = run(tmp.path(), &[PatternSpec::literal("foo", "bar")], &options).unwrap();

    assert_eq!(
        report.get(&tmp.path().join("big.txt")).unwrap().outcome,
        Outcome::Skipped(SkipReason::TooLarge { size: 256, limit: 100 })
    );
    assert!(read(tmp.path(), "big.txt").starts_with("foo"));
}

#[test]
fn cancelled_run_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    for i in 0..8 {
        write(tmp.path(), &format!("f{i}.txt"), b"foo");
    }
    let control = RunControl::new();
    control.cancel();

    let engine = Engine::new(tmp.path(), &[PatternSpec::literal("foo", "bar")], RunOptions::default()).unwrap();
    let report = engine.run(&control, &()).unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::Cancelled));
    assert!(report.files.is_empty());
    for i in 0..8 {
        assert_eq!(read(tmp.path(), &format!("f{i}.txt")), "foo");
    }
}

#[test]
fn many_files_across_workers() {
    let tmp = TempDir::new().unwrap();
    for i in 0..200 {
        write(tmp.path(), &format!("d{}/f{i:03}.txt", i % 7), b"alpha beta alpha\n");
    }
    let options = RunOptions {
        worker_count: 8,
        ..Default::default()
    };

    let report = run(tmp.path(), &[PatternSpec::literal("alpha", "omega")], &options).unwrap();

    assert_eq!(report.summary.files_modified, 200);
    assert_eq!(report.summary.total_edits, 400);
    assert!(report.files.windows(2).all(|w| w[0].path < w[1].path));
    assert_eq!(read(tmp.path(), "d3/f003.txt"), "omega beta omega\n");
}

#[cfg(unix)]
mod symlinks {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn directory_symlinks_are_never_entered() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "secret.txt", b"foo");
        write(tmp.path(), "a.txt", b"foo");
        symlink(outside.path(), tmp.path().join("link")).unwrap();
        symlink(tmp.path(), tmp.path().join("loop")).unwrap();

        let report = run(tmp.path(), &[PatternSpec::literal("foo", "bar")], &RunOptions::default()).unwrap();

        assert_eq!(read(outside.path(), "secret.txt"), "foo");
        assert_eq!(read(tmp.path(), "a.txt"), "bar");
        assert_eq!(
            report.get(&tmp.path().join("link")).unwrap().outcome,
            Outcome::Skipped(SkipReason::Symlink)
        );
        assert_eq!(report.summary.files_modified, 1);
    }

    #[test]
    fn file_symlink_escaping_root_is_refused() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "target.txt", b"foo");
        symlink(outside.path().join("target.txt"), tmp.path().join("escape.txt")).unwrap();

        let report = run(tmp.path(), &[PatternSpec::literal("foo", "bar")], &RunOptions::default()).unwrap();

        assert_eq!(read(outside.path(), "target.txt"), "foo");
        let (path, kind, _) = report.errors().next().unwrap();
        assert_eq!(path, tmp.path().join("escape.txt"));
        assert_eq!(kind, ErrorKind::OutsideRoot);
        assert!(report.has_errors());
    }

    #[test]
    fn file_symlink_inside_root_rewrites_target_once() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", b"x");
        symlink(tmp.path().join("a.txt"), tmp.path().join("b.txt")).unwrap();

        let report = run(tmp.path(), &[PatternSpec::literal("x", "xy")], &RunOptions::default()).unwrap();

        assert!(fs::symlink_metadata(tmp.path().join("b.txt")).unwrap().file_type().is_symlink());
        assert_eq!(read(tmp.path(), "a.txt"), "xy");
        assert_eq!(report.summary.files_modified, 1);
        assert_eq!(
            report.get(&tmp.path().join("b.txt")).unwrap().outcome,
            Outcome::Skipped(SkipReason::Symlink)
        );
    }

    #[test]
    fn file_symlink_to_excluded_target_is_processed() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "gen/out.txt", b"x");
        symlink(tmp.path().join("gen/out.txt"), tmp.path().join("out.txt")).unwrap();
        let options = RunOptions {
            exclude_globs: vec!["gen/**".into()],
            ..Default::default()
        };

        let report = run(tmp.path(), &[PatternSpec::literal("x", "xy")], &options).unwrap();

        assert_eq!(read(tmp.path(), "gen/out.txt"), "xy");
        assert_eq!(report.summary.files_modified, 1);
    }
}
