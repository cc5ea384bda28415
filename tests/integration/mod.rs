//! Integration tests for flushvc
//!
//! Replays complete add / flush / plunge sessions against a real working
//! directory and checks the on-disk ledger, refs and objects byte for byte.

use super::TestRepo;
use ::flushvc::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;

const TWO_LINES: &str = "197fa33f64bfce7ac12607ad567ea8573a38a823";
const ANOTHER_FILE: &str = "aff9a3a04647a47feed6d1c64e023397daff1191";
const YET_ANOTHER_FILE: &str = "caa2b67db4872c7027aff70c5f7676ee3417ad50";
const A_TEST: &str = "c4a5964fd224738514ccd7354a45d37a5ef1a8b3";
const HELLO: &str = "be12174911e3aae8c2ed6ef5cb66b32893b3bd21";

fn hash(hex: &str) -> ObjectHash {
    ObjectHash::from_hex(hex).unwrap()
}

#[test]
fn test_add_updates_ledger_and_objects() {
    let t = TestRepo::new();

    t.write("test.txt", "A test file\nWith two lines\n");
    t.add(&["test.txt"]);
    assert_eq!(t.control_file("bowl"), format!("{} test.txt", TWO_LINES));
    assert_eq!(t.object_names(), vec![TWO_LINES]);
    assert_eq!(
        t.repo.show_object_bytes(TWO_LINES).unwrap(),
        b"file\n\nA test file\nWith two lines\n"
    );

    t.write("other.txt", "Another file");
    t.add(&["other.txt"]);
    assert_eq!(
        t.control_file("bowl"),
        format!("{} other.txt\n{} test.txt", ANOTHER_FILE, TWO_LINES)
    );

    t.write("other.txt", "yet another file");
    let report = t.add(&["other.txt"]);
    assert_eq!(report.edited, vec!["other.txt"]);
    assert_eq!(
        t.control_file("bowl"),
        format!("{} other.txt\n{} test.txt", YET_ANOTHER_FILE, TWO_LINES)
    );
    // The superseded blob stays in the store
    assert_eq!(t.object_names(), vec![TWO_LINES, ANOTHER_FILE, YET_ANOTHER_FILE]);
}

#[test]
fn test_add_all_nested() {
    let t = TestRepo::new();
    t.write("file1.txt", "A test");
    t.write("file2.txt", "Hello");
    t.write("a/b/c/file3.txt", "A test");
    t.write("a/b/c/file4.txt", "Hello");

    t.add_all();

    let expected = [
        format!("{} a/b/c/file3.txt", A_TEST),
        format!("{} a/b/c/file4.txt", HELLO),
        format!("{} file1.txt", A_TEST),
        format!("{} file2.txt", HELLO),
    ]
    .join("\n");
    assert_eq!(t.control_file("bowl"), expected);
    // Identical content is stored once
    assert_eq!(t.object_names().len(), 2);
}

#[test]
fn test_add_all_drops_removed_files() {
    let t = TestRepo::new();
    t.write("file1.txt", "A test");
    t.write("file2.txt", "Hello");
    t.add_all();

    t.remove("file2.txt");
    let report = t.add_all();

    assert_eq!(report.removed, vec!["file2.txt"]);
    assert_eq!(t.control_file("bowl"), format!("{} file1.txt", A_TEST));
}

#[test]
fn test_add_directory_reconciles_only_that_subtree() {
    let t = TestRepo::new();
    t.write("src/a.rs", "a");
    t.write("src/b.rs", "b");
    t.write("docs/readme.md", "r");
    t.add_all();

    t.remove("src/b.rs");
    t.remove("docs/readme.md");
    t.write("src/c.rs", "c");
    let report = t.add(&["src"]);

    assert_eq!(report.added, vec!["src/c.rs"]);
    assert_eq!(report.removed, vec!["src/b.rs"]);
    let staged: Vec<_> = t.repo.load_bowl().unwrap().snapshot().into_keys().collect();
    assert_eq!(staged, vec!["docs/readme.md", "src/a.rs", "src/c.rs"]);
}

#[test]
fn test_flush_from_hand_written_ledger() {
    let t = TestRepo::new();
    t.repo.store().put(ObjectKind::Blob, b"A test").unwrap();
    t.repo.store().put(ObjectKind::Blob, b"Hello").unwrap();

    let ledger = format!(
        "{a} file1.txt\n{h} file2.txt\n{a} dir1/file3.txt\n{h} dir1/file4.txt\n",
        a = A_TEST,
        h = HELLO
    );
    fs::write(t.root().join(CONTROL_DIR).join("bowl"), &ledger).unwrap();

    let result = t.repo.commit_staged("A flush").unwrap();

    // The ledger is left exactly as written
    assert_eq!(t.control_file("bowl"), ledger);
    assert_eq!(t.control_file("refs/main"), result.commit.to_hex());
    assert_eq!(result.tree, hash("fe9c7e13c56414a169b5d77afdc7d66f4a128317"));

    let bytes = t.repo.show_object_bytes(&result.commit.to_hex()).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "flush");
    assert_eq!(lines[1], "");
    assert_eq!(lines[2], "tree fe9c7e13c56414a169b5d77afdc7d66f4a128317");
    assert_eq!(lines[3], "parent ");
    assert!(lines[4].starts_with("time "));
    assert_eq!(lines[5], "");
    assert_eq!(lines[6], "A flush");

    let root = t.repo.store().get(&result.tree).unwrap().as_tree().unwrap();
    let names: Vec<_> = root.entries.iter().map(|e| (e.kind, e.name.as_str())).collect();
    assert_eq!(
        names,
        vec![
            (EntryKind::Tree, "dir1"),
            (EntryKind::File, "file1.txt"),
            (EntryKind::File, "file2.txt"),
        ]
    );
}

#[test]
fn test_add_and_flush_multiple_times() {
    let t = TestRepo::new();

    t.write("file1.txt", "File 1");
    t.add(&["file1.txt"]);
    let c1 = t.flush("A flush");

    t.write("file2.txt", "File 2");
    t.add(&["file2.txt"]);
    let c2 = t.flush("Another flush");

    t.write("file2.txt", "File 2 changed");
    t.add(&["file2.txt"]);
    let c3 = t.flush("A third flush");

    let store = t.repo.store();
    let f1 = history::read_commit(store, &c1).unwrap();
    let f2 = history::read_commit(store, &c2).unwrap();
    let f3 = history::read_commit(store, &c3).unwrap();
    assert_eq!(f1.parent, None);
    assert_eq!(f2.parent, Some(c1));
    assert_eq!(f3.parent, Some(c2));

    let t1 = tree::read_tree(store, &f1.tree).unwrap();
    let t2 = tree::read_tree(store, &f2.tree).unwrap();
    let t3 = tree::read_tree(store, &f3.tree).unwrap();
    assert_eq!(t1.entries.len(), 1);
    assert_eq!(t1.entries[0].name, "file1.txt");
    assert_eq!(t2.entries.len(), 2);
    assert_eq!(t3.entries.len(), 2);
    assert_eq!(t2.entries[0].hash, t3.entries[0].hash);
    assert_ne!(t2.entries[1].hash, t3.entries[1].hash);

    let log: Vec<_> = t.repo.show_log().unwrap().into_iter().map(|e| e.hash).collect();
    assert_eq!(log, vec![c3, c2, c1]);
    assert_eq!(
        history::find_path_in_commit(store, &f2, "file2.txt").unwrap(),
        Some(hash("baf23d73c661ab959cf23989dd89fba51d3bcc93"))
    );
}

#[test]
fn test_plunge_back_and_forth() {
    let t = TestRepo::new();

    t.write("file1.txt", "File 1");
    t.add(&["file1.txt"]);
    let c1 = t.flush("A flush");

    t.write("file2.txt", "File 2");
    t.write("nested/deep/file3.txt", "File 3");
    t.add_all();
    let c2 = t.flush("Another flush");

    t.repo.checkout_commit(&c1.to_hex()).unwrap();
    assert_eq!(t.read("file1.txt"), "File 1");
    assert!(!t.exists("file2.txt"));
    assert!(!t.exists("nested"));
    assert_eq!(t.control_file("bowl"), "c403164ceb08cdd1405f2aff23acc7b9baf898e8 file1.txt");
    assert_eq!(t.control_file("refs/main"), c2.to_hex());

    // Short prefixes and ref names both resolve
    t.repo.checkout_commit(&c2.to_hex()[..8]).unwrap();
    assert_eq!(t.read("nested/deep/file3.txt"), "File 3");
    t.repo.checkout_commit(&c1.to_hex()).unwrap();
    t.repo.checkout_commit("main").unwrap();
    assert_eq!(t.read("file2.txt"), "File 2");
    assert!(t.repo.show_staging_summary().unwrap().is_clean());
}

#[test]
fn test_plunge_keeps_untracked_and_ignored_files() {
    let t = TestRepo::with_builder(RepositoryBuilder::new().ignore_patterns(vec!["*.log".to_string()]));
    t.write("tracked.txt", "v1");
    t.add_all();
    let c1 = t.flush("v1");

    t.write("tracked.txt", "v2");
    t.write("scratch.txt", "mine");
    t.write("build.log", "noise");
    t.add(&["tracked.txt"]);
    t.flush("v2");

    t.repo.checkout_commit(&c1.to_hex()).unwrap();

    assert_eq!(t.read("tracked.txt"), "v1");
    assert_eq!(t.read("scratch.txt"), "mine");
    assert_eq!(t.read("build.log"), "noise");
    assert_eq!(t.repo.show_staging_summary().unwrap().untracked, vec!["scratch.txt"]);
}

#[test]
fn test_plunge_rejects_non_commit_targets() {
    let t = TestRepo::new();
    t.write("a.txt", "A test");
    t.add_all();
    let result = t.repo.commit_staged("first").unwrap();

    let err = t.repo.checkout_commit(A_TEST).unwrap_err();
    assert!(matches!(err, FlushError::UnexpectedKind { .. }));
    let err = t.repo.checkout_commit(&result.tree.to_hex()).unwrap_err();
    assert!(matches!(err, FlushError::UnexpectedKind { .. }));
    let err = t.repo.checkout_commit("0000000000000000000000000000000000000000").unwrap_err();
    assert!(matches!(err, FlushError::ObjectNotFound(_)));

    assert_eq!(t.read("a.txt"), "A test");
}

#[test]
fn test_track_changes_session() {
    let t = TestRepo::with_builder(RepositoryBuilder::new().track_changes(true));
    t.write("keep.txt", "keep");
    t.write("drop.txt", "drop");
    t.add_all();
    assert_eq!(
        t.control_file("bowl"),
        format!(
            "add {} drop.txt\nadd {} keep.txt",
            codec::content_hash(&codec::encode(ObjectKind::Blob, b"drop")),
            codec::content_hash(&codec::encode(ObjectKind::Blob, b"keep"))
        )
    );

    t.flush("first");
    assert!(t.control_file("bowl").lines().all(|line| !line.starts_with("add ")));

    t.remove("drop.txt");
    t.write("keep.txt", "kept");
    t.add_all();
    let summary = t.repo.show_staging_summary().unwrap();
    assert_eq!(summary.markers.get("drop.txt"), Some(&Change::Delete));
    assert_eq!(summary.markers.get("keep.txt"), Some(&Change::Edit));
    assert_eq!(summary.deleted, vec!["drop.txt"]);

    let second = t.repo.commit_staged("second").unwrap();
    assert_eq!(second.files, 1);
    assert!(!t.control_file("bowl").contains("drop.txt"));
}

#[test]
fn test_random_sessions_restore_exact_snapshots() {
    let t = TestRepo::new();
    let mut rng = StdRng::seed_from_u64(42);
    let mut snapshots: Vec<(ObjectHash, BTreeMap<String, String>)> = Vec::new();
    let mut current: BTreeMap<String, String> = BTreeMap::new();

    for round in 0..8 {
        for _ in 0..rng.random_range(1..6) {
            let dir = rng.random_range(0..3);
            let file = rng.random_range(0..6);
            let rel = if dir == 0 {
                format!("file{}.txt", file)
            } else {
                format!("dir{}/file{}.txt", dir, file)
            };
            if rng.random_bool(0.25) && current.contains_key(&rel) {
                t.remove(&rel);
                current.remove(&rel);
            } else {
                let content = format!("round {} value {}", round, rng.random::<u32>());
                t.write(&rel, &content);
                current.insert(rel, content);
            }
        }
        if current.is_empty() {
            continue;
        }

        t.add_all();
        let commit = t.flush(&format!("round {}", round));
        snapshots.push((commit, current.clone()));
    }
    info!("Recorded {} snapshots", snapshots.len());

    for (commit, expected) in snapshots.iter().rev() {
        t.repo.checkout_commit(&commit.to_hex()).unwrap();
        let files = t.working_files().unwrap();
        assert_eq!(&files, expected, "snapshot {} differs", commit.short());
    }
}

#[test]
fn test_absolute_paths_inside_workdir() {
    let t = TestRepo::new();
    t.write("sub/a.txt", "a");

    let absolute: PathBuf = t.root().join("sub").join("a.txt");
    let report = t.repo.stage_paths(&[absolute], false).unwrap();
    assert_eq!(report.added, vec!["sub/a.txt"]);

    let outside = tempfile::TempDir::new().unwrap();
    let err = t
        .repo
        .stage_paths(&[outside.path().to_path_buf()], false)
        .unwrap_err();
    assert!(matches!(err, FlushError::InvalidPath { .. }));
}
