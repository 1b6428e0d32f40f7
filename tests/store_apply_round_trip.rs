#![cfg(unix)]

mod common;

use common::{mode_of, mtime_of, record_set, set_mode, touch, CountingAttrs, FakeVcs, Tree};
use git_store_meta::store::Field;
use git_store_meta::{run_apply, run_store, NativeAttrs};
use std::fs;
use std::os::unix::fs::symlink;

#[test]
fn apply_restores_what_store_recorded() {
    let tree = Tree::new();
    let a = tree.file("a.txt", 0o640, 1_000_000);
    let b = tree.file("dir/b.sh", 0o755, 2_000_000);
    let vcs = FakeVcs::with_files(&["a.txt", "dir/b.sh"]);
    let cfg = tree.config();

    let summary = run_store(&cfg, &vcs, &NativeAttrs).unwrap();
    assert_eq!(summary.recorded, 2);

    set_mode(&a, 0o600);
    touch(&a, 42);
    set_mode(&b, 0o644);
    touch(&b, 43);

    let applied = run_apply(&cfg, &NativeAttrs).unwrap();
    assert_eq!(applied.failed, 0);
    assert_eq!(mode_of(&a), 0o640);
    assert_eq!(mode_of(&b), 0o755);
    assert_eq!(mtime_of(&a), 1_000_000);
    assert_eq!(mtime_of(&b), 2_000_000);
}

#[test]
fn store_file_has_header_and_sorted_records() {
    let tree = Tree::new();
    tree.file("b", 0o644, 0);
    tree.file("a/x", 0o644, 86_400);
    tree.file("a.txt", 0o600, 1_700_000_000);
    let vcs = FakeVcs::with_files(&["b", "a/x", "a.txt"]);
    let cfg = tree.config();
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();

    let text = tree.store_text(&cfg);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "# generated by\tgit-store-meta\t1.2.0");
    assert_eq!(lines[1], "<file>\t<type>\t<mtime>\t<atime>\t<mode>");
    assert_eq!(lines[2], "a.txt\tf\t2023-11-14T22:13:20Z\t2023-11-14T22:13:20Z\t0600");
    assert_eq!(lines[3], "a/x\tf\t1970-01-02T00:00:00Z\t1970-01-02T00:00:00Z\t0644");
    assert!(lines[4].starts_with("b\tf\t1970-01-01T00:00:00Z"));
    assert_eq!(lines.len(), 5);
}

#[test]
fn two_stores_of_an_unchanged_tree_are_identical() {
    let tree = Tree::new();
    tree.file("one", 0o644, 10);
    tree.file("sub/two", 0o600, 20);
    symlink("one", tree.root.join("link")).unwrap();
    let vcs = FakeVcs::with_files(&["one", "sub/two", "link"]);
    let mut cfg = tree.config();
    cfg.directories = true;

    run_store(&cfg, &vcs, &NativeAttrs).unwrap();
    let first = fs::read(cfg.store_path()).unwrap();
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();
    let second = fs::read(cfg.store_path()).unwrap();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.contains("\nlink\tl\t"));
    assert!(text.contains("\t0664\n"), "symlink mode is normalized");
    assert!(text.contains("\nsub\td\t"));
}

#[test]
fn directories_are_restored_only_with_directory_tracking() {
    let tree = Tree::new();
    tree.file("d/f", 0o644, 5);
    let d = tree.root.join("d");
    set_mode(&d, 0o750);
    touch(&d, 777);
    let vcs = FakeVcs::with_files(&["d/f"]);
    let mut cfg = tree.config();
    cfg.directories = true;
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();

    set_mode(&d, 0o700);
    cfg.directories = false;
    run_apply(&cfg, &NativeAttrs).unwrap();
    assert_eq!(mode_of(&d), 0o700);

    cfg.directories = true;
    run_apply(&cfg, &NativeAttrs).unwrap();
    assert_eq!(mode_of(&d), 0o750);
    assert_eq!(mtime_of(&d), 777);
}

#[test]
fn apply_can_be_limited_to_some_fields() {
    let tree = Tree::new();
    let f = tree.file("f", 0o640, 1000);
    let vcs = FakeVcs::with_files(&["f"]);
    let mut cfg = tree.config();
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();

    set_mode(&f, 0o600);
    touch(&f, 5);
    cfg.fields = Some(vec![Field::File, Field::Type, Field::Mode]);
    run_apply(&cfg, &NativeAttrs).unwrap();
    assert_eq!(mode_of(&f), 0o640);
    assert_eq!(mtime_of(&f), 5);
}

#[test]
fn dry_run_changes_nothing() {
    let tree = Tree::new();
    let f = tree.file("f", 0o640, 1000);
    let vcs = FakeVcs::with_files(&["f"]);
    let mut cfg = tree.config();

    cfg.dry_run = true;
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();
    assert!(!cfg.store_path().exists());

    cfg.dry_run = false;
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();
    set_mode(&f, 0o600);
    cfg.dry_run = true;
    let summary = run_apply(&cfg, &NativeAttrs).unwrap();
    assert!(summary.applied > 0);
    assert_eq!(mode_of(&f), 0o600);
}

#[test]
fn missing_and_retyped_paths_are_skipped_not_fatal() {
    let tree = Tree::new();
    let gone = tree.file("gone", 0o644, 1);
    let became_dir = tree.file("became_dir", 0o644, 1);
    let keep = tree.file("keep", 0o640, 99);
    let vcs = FakeVcs::with_files(&["gone", "became_dir", "keep"]);
    let cfg = tree.config();
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();

    fs::remove_file(&gone).unwrap();
    fs::remove_file(&became_dir).unwrap();
    fs::create_dir(&became_dir).unwrap();
    touch(&keep, 3);

    let summary = run_apply(&cfg, &CountingAttrs::default()).unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(mtime_of(&keep), 99);
    assert_eq!(record_set(&tree.store_text(&cfg)).len(), 3);
}

#[test]
fn odd_file_names_survive_the_round_trip() {
    let tree = Tree::new();
    let names = ["tab\there", "new\nline", "back\\slash", "sp ace"];
    for n in names {
        tree.file(n, 0o604, 12345);
    }
    let vcs = FakeVcs::with_files(&names);
    let cfg = tree.config();
    run_store(&cfg, &vcs, &NativeAttrs).unwrap();

    let text = tree.store_text(&cfg);
    assert_eq!(text.lines().count(), 2 + names.len());
    assert!(text.contains("tab\\x09here\tf"));
    assert!(text.contains("new\\x0Aline\tf"));
    assert!(text.contains("back\\x5Cslash\tf"));

    for n in names {
        set_mode(&tree.root.join(n), 0o600);
    }
    let summary = run_apply(&cfg, &NativeAttrs).unwrap();
    assert_eq!(summary.skipped, 0);
    for n in names {
        assert_eq!(mode_of(&tree.root.join(n)), 0o604, "{n:?}");
    }
}
