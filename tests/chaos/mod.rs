//! Chaos tests for flushvc
//!
//! Damages the control directory in the ways real disks and careless users
//! do, and checks that every failure surfaces as a typed error instead of a
//! silently wrong snapshot.

use super::TestRepo;
use ::flushvc::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use tracing::warn;
use tracing_test::traced_test;

fn object_path(t: &TestRepo, hash: &ObjectHash) -> PathBuf {
    t.root().join(CONTROL_DIR).join("objects").join(hash.to_hex())
}

/// Repository with two flushes over a small nested tree
fn seeded_repo() -> (TestRepo, CommitResult, CommitResult) {
    let t = TestRepo::new();
    t.write("a.txt", "alpha");
    t.write("dir/b.txt", "beta");
    t.add_all();
    let first = t.repo.commit_staged("first").unwrap();

    t.write("dir/c.txt", "gamma");
    t.add_all();
    let second = t.repo.commit_staged("second").unwrap();
    (t, first, second)
}

#[test]
#[traced_test]
fn test_random_byte_corruption_is_detected() {
    let (t, first, _) = seeded_repo();
    let mut rng = StdRng::seed_from_u64(7);

    let blob = tree::find_path(t.repo.store(), &first.tree, "dir/b.txt").unwrap().unwrap();
    let path = object_path(&t, &blob);
    let mut bytes = fs::read(&path).unwrap();
    for _ in 0..4 {
        let idx = rng.random_range(0..bytes.len());
        bytes[idx] ^= rng.random_range(1..=255u8);
    }
    fs::write(&path, &bytes).unwrap();

    let err = t.repo.verify_object(&blob.to_hex()).unwrap_err();
    warn!("corrupted blob reported as: {}", err);
    assert!(err.is_corruption(), "unexpected error {:?}", err);
}

#[test]
fn test_swapped_object_files_fail_verification() {
    let (t, first, second) = seeded_repo();

    // Store the first commit's bytes under the second commit's name
    fs::copy(object_path(&t, &first.commit), object_path(&t, &second.commit)).unwrap();

    let err = t.repo.verify_object(&second.commit.to_hex()).unwrap_err();
    assert!(matches!(err, FlushError::CorruptObject { .. }));
}

#[test]
fn test_truncated_tree_aborts_plunge_before_touching_files() {
    let (t, first, _) = seeded_repo();
    fs::write(object_path(&t, &first.tree), b"").unwrap();

    let err = t.repo.checkout_commit(&first.commit.to_hex()).unwrap_err();

    assert!(err.is_corruption());
    assert_eq!(t.read("dir/c.txt"), "gamma");
    assert_eq!(t.repo.load_bowl().unwrap().len(), 3);
}

#[test]
fn test_missing_blob_is_reported() {
    let (t, first, _) = seeded_repo();
    let blob = tree::find_path(t.repo.store(), &first.tree, "a.txt").unwrap().unwrap();
    fs::remove_file(object_path(&t, &blob)).unwrap();

    let err = t.repo.checkout_commit(&first.commit.to_hex()).unwrap_err();
    assert!(matches!(err, FlushError::ObjectNotFound(_)));
}

#[test]
fn test_garbage_ledger_is_malformed() {
    let t = TestRepo::new();
    fs::write(t.root().join(CONTROL_DIR).join("bowl"), "not a ledger line").unwrap();

    let err = t.repo.commit_staged("nope").unwrap_err();
    assert!(matches!(err, FlushError::MalformedLedger(_)));
    assert!(err.is_corruption());
}

#[test]
fn test_dangling_ref_is_not_found() {
    let (t, _, _) = seeded_repo();
    let dangling = "0123456789abcdef0123456789abcdef01234567";
    fs::write(t.root().join(CONTROL_DIR).join("refs").join("main"), dangling).unwrap();

    let err = t.repo.show_log().unwrap_err();
    assert!(matches!(err, FlushError::ObjectNotFound(_)));
}

#[test]
fn test_broken_parent_stops_log_after_valid_entries() {
    let (t, first, second) = seeded_repo();
    fs::remove_file(object_path(&t, &first.commit)).unwrap();

    let mut log = t.repo.log().unwrap();
    assert_eq!(log.next().unwrap().unwrap().hash, second.commit);
    assert!(log.next().unwrap().is_err());
    assert!(log.next().is_none());
}

#[test]
fn test_missing_control_dir_parts() {
    let (t, _, _) = seeded_repo();
    fs::remove_file(t.root().join(CONTROL_DIR).join("HEAD")).unwrap();

    let err = Repository::open(t.root().to_path_buf()).unwrap_err();
    assert!(matches!(err, FlushError::RepositoryNotInitialized(_)));
}

#[test]
fn test_two_handles_last_writer_wins() {
    let (t, _, second) = seeded_repo();
    let other = Repository::open(t.root().to_path_buf()).unwrap();

    t.write("mine.txt", "from first handle");
    t.add(&["mine.txt"]);
    t.write("theirs.txt", "from second handle");
    other.stage_paths(&[PathBuf::from("theirs.txt")], false).unwrap();

    // Each handle reloads the ledger per call, so both stagings land
    let staged = t.repo.load_bowl().unwrap().snapshot();
    assert!(staged.contains_key("mine.txt"));
    assert!(staged.contains_key("theirs.txt"));

    let a = t.repo.commit_staged("from first").unwrap();
    let b = other.commit_staged("from second").unwrap();

    // No lock: the second flush chains on whatever the ref held when it ran
    assert_eq!(a.parent, Some(second.commit));
    assert_eq!(b.parent, Some(a.commit));
    assert_eq!(t.repo.head().unwrap(), Some(b.commit));
}

#[test]
fn test_concurrent_puts_of_same_content() {
    let t = TestRepo::new();
    let store = t.repo.store();
    let payload = b"shared content".to_vec();

    let hashes: Vec<ObjectHash> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| store.put(ObjectKind::Blob, &payload).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(store.list_objects().unwrap(), vec![hashes[0]]);
    assert_eq!(store.verify(&hashes[0]).unwrap().payload(), payload.as_slice());
}
