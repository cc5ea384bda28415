//! Property-based testing for flushvc
//!
//! Uses proptest to check the content addressing, tree building and staging
//! invariants across randomly generated payloads and file sets.

use ::flushvc::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn kind_strategy() -> impl Strategy<Value = ObjectKind> {
    prop_oneof![
        Just(ObjectKind::Blob),
        Just(ObjectKind::Tree),
        Just(ObjectKind::Commit),
    ]
}

/// Relative file paths, at most three directories deep
fn path_strategy() -> impl Strategy<Value = String> {
    let dirs = prop::collection::vec("d[a-c]", 0..=3);
    let file = prop_oneof!["f[0-9]{1,2}\\.txt", "[a-z]{1,6}\\.(rs|md)"];
    (dirs, file).prop_map(|(dirs, file)| {
        let mut parts = dirs;
        parts.push(file);
        parts.join("/")
    })
}

/// A file set; directory names never carry an extension, so no file shadows a directory
fn file_set_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(path_strategy(), prop::collection::vec(any::<u8>(), 0..256), 1..12)
}

fn scratch_store() -> (TempDir, ObjectStore) {
    let temp = TempDir::new().unwrap();
    let store = ObjectStore::init(temp.path().join("objects"), CompressionEngine::default()).unwrap();
    (temp, store)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Storing the same payload twice yields one hash and one object
    #[test]
    fn idempotent_put(kind in kind_strategy(), payload in prop::collection::vec(any::<u8>(), 0..2048)) {
        let (_temp, store) = scratch_store();

        let first = store.put(kind, &payload).unwrap();
        let second = store.put(kind, &payload).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(store.list_objects().unwrap().len(), 1);
    }

    /// Whatever goes in comes back out with the same kind
    #[test]
    fn put_get_round_trip(kind in kind_strategy(), payload in prop::collection::vec(any::<u8>(), 0..2048)) {
        let (_temp, store) = scratch_store();

        let hash = store.put(kind, &payload).unwrap();
        let object = store.get(&hash).unwrap();

        prop_assert_eq!(object.kind, kind);
        prop_assert_eq!(object.payload(), payload.as_slice());
        prop_assert_eq!(codec::content_hash(&object.bytes), hash);
    }

    /// Tree hashes depend only on the listing, and every entry is recoverable
    #[test]
    fn deterministic_tree(files in file_set_strategy()) {
        let (_temp, store) = scratch_store();
        let listing: BTreeMap<String, ObjectHash> = files
            .iter()
            .map(|(path, content)| (path.clone(), store.put(ObjectKind::Blob, content).unwrap()))
            .collect();

        let build = |listing: &BTreeMap<String, ObjectHash>| {
            tree::build_tree(&store, listing.iter().map(|(p, h)| (p.as_str(), *h)))
        };

        let first = build(&listing).unwrap();
        prop_assert_eq!(build(&listing).unwrap(), first);
        prop_assert_eq!(&tree::flatten_tree(&store, &first).unwrap(), &listing);

        if listing.len() > 1 {
            let mut smaller = listing.clone();
            let removed = smaller.keys().next().cloned().unwrap();
            smaller.remove(&removed);
            prop_assert_ne!(build(&smaller).unwrap(), first);
        }
    }

    /// Re-staging a path keeps exactly one entry holding the latest content
    #[test]
    fn staging_merges_on_path(
        path in path_strategy(),
        first in prop::collection::vec(any::<u8>(), 0..128),
        second in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path().to_path_buf()).unwrap();
        let file = temp.path().join(&path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();

        fs::write(&file, &first).unwrap();
        repo.stage_paths(&[PathBuf::from(&path)], false).unwrap();
        fs::write(&file, &second).unwrap();
        repo.stage_paths(&[PathBuf::from(&path)], false).unwrap();

        let bowl = repo.load_bowl().unwrap();
        let expected = codec::content_hash(&codec::encode(ObjectKind::Blob, &second));
        prop_assert_eq!(bowl.len(), 1);
        prop_assert_eq!(bowl.get(&path).map(|e| e.blob_hash), Some(expected));
    }

    /// Flush then plunge reproduces the working files exactly
    #[test]
    fn flush_plunge_identity(files in file_set_strategy(), extra in prop::collection::vec(any::<u8>(), 1..64)) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path().to_path_buf()).unwrap();

        for (path, content) in &files {
            let file = temp.path().join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }
        repo.stage_paths(&[], true).unwrap();
        let commit = repo.commit_staged("snapshot").unwrap().commit;

        let (first_path, _) = files.iter().next().unwrap();
        fs::write(temp.path().join(first_path), &extra).unwrap();
        repo.checkout_commit(&commit.to_hex()).unwrap();

        for (path, content) in &files {
            prop_assert_eq!(&fs::read(temp.path().join(path)).unwrap(), content);
        }
    }
}
