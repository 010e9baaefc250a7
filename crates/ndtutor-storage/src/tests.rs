//! Tests for the local store

use super::*;
use ndtutor_core::{Formula, Rule, Statement, DEFAULT_ROOT_ID};
use proptest::prelude::*;
use tempfile::tempdir;
use uuid::Uuid;

fn test_store() -> (LocalStore, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = LocalStore::open(StoreConfig::new(dir.path().join("store"))).unwrap();
    (store, dir)
}

#[test]
fn test_empty_store_has_defaults() {
    let (store, _dir) = test_store();
    assert_eq!(store.progress().unwrap(), Progress::default());
    assert!(!store.welcome_collapsed().unwrap());
    assert!(store.load_tree().unwrap().is_none());
}

#[test]
fn test_favorites() {
    let (store, _dir) = test_store();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    store.add_favorite(a).unwrap();
    store.add_favorite(a).unwrap();
    store.add_favorite(b).unwrap();
    assert_eq!(store.favorites().unwrap(), vec![a, b]);

    assert!(!store.toggle_favorite(a).unwrap());
    assert!(!store.is_favorite(a).unwrap());
    assert!(store.toggle_favorite(a).unwrap());
    assert_eq!(store.favorites().unwrap(), vec![b, a]);

    store.remove_favorite(b).unwrap();
    store.remove_favorite(b).unwrap();
    assert_eq!(store.favorites().unwrap(), vec![a]);
}

#[test]
fn test_feedback_completed_and_welcome() {
    let (store, _dir) = test_store();
    let id = Uuid::new_v4();

    assert!(!store.has_feedback(id).unwrap());
    store.add_feedback(id).unwrap();
    assert!(store.has_feedback(id).unwrap());

    store.add_completed(id).unwrap();
    store.add_completed(id).unwrap();
    assert!(store.is_completed(id).unwrap());
    assert_eq!(store.completed().unwrap(), vec![id]);

    store.set_welcome_collapsed(true).unwrap();
    assert!(store.welcome_collapsed().unwrap());
}

#[test]
fn test_blob_layout_matches_browser_format() {
    let (store, _dir) = test_store();
    let id = Uuid::new_v4();
    store.add_completed(id).unwrap();

    let raw = std::fs::read_to_string(store.dir().join("data.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "feedback_items": [],
            "favorite_items": [],
            "completed": [id.to_string()],
            "welcome_collapsed": false,
        })
    );
}

#[test]
fn test_corrupt_blob_is_treated_as_defaults() {
    let (store, _dir) = test_store();
    std::fs::write(store.dir().join("data.json"), "{not json").unwrap();
    assert_eq!(store.progress().unwrap(), Progress::default());

    // The next write replaces the unreadable blob.
    let id = Uuid::new_v4();
    store.add_favorite(id).unwrap();
    assert_eq!(store.favorites().unwrap(), vec![id]);
}

#[test]
fn test_partial_blob_fills_missing_fields() {
    let (store, _dir) = test_store();
    std::fs::write(store.dir().join("data.json"), r#"{"welcome_collapsed": true}"#).unwrap();
    let progress = store.progress().unwrap();
    assert!(progress.welcome_collapsed);
    assert!(progress.completed.is_empty());
}

#[test]
fn test_tree_snapshot_roundtrip() {
    let (store, _dir) = test_store();
    let mut tree = ProofTree::new(
        DEFAULT_ROOT_ID,
        Statement::goal(Formula::and(Formula::True, Formula::True)),
    );
    let kids = tree
        .graft_children(
            DEFAULT_ROOT_ID,
            Rule::AndIntro,
            vec![Statement::goal(Formula::True), Statement::goal(Formula::True)],
        )
        .unwrap();
    for kid in kids {
        tree.graft_children(kid, Rule::Ax, vec![]).unwrap();
    }

    store.save_tree(tree.root_id(), &tree.to_snapshot()).unwrap();
    let restored = store.load_tree().unwrap().unwrap();
    assert_eq!(restored.root_id(), DEFAULT_ROOT_ID);
    assert_eq!(restored.to_snapshot(), tree.to_snapshot());
    assert!(restored.is_root_complete());
}

#[test]
fn test_invalid_tree_snapshot_is_an_error() {
    let (store, _dir) = test_store();
    let orphan = ProofNode::open(Uuid::new_v4(), Statement::goal(Formula::True));
    store.save_tree(DEFAULT_ROOT_ID, &[orphan]).unwrap();
    assert!(matches!(
        store.load_tree(),
        Err(StorageError::Tree(TreeError::MissingRoot(_)))
    ));
}

#[test]
fn test_no_temp_files_left_behind() {
    let (store, _dir) = test_store();
    store.add_feedback(Uuid::new_v4()).unwrap();
    store.set_welcome_collapsed(true).unwrap();
    let mut names: Vec<String> = std::fs::read_dir(store.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["data.json".to_string()]);
}

#[test]
fn test_config_lookup() {
    let config = StoreConfig::from_lookup(|key| match key {
        "HOME" => Some(PathBuf::from("/home/ada")),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.dir, PathBuf::from("/home/ada/.ndtutor"));

    let config = StoreConfig::from_lookup(|key| match key {
        "NDTUTOR_HOME" => Some(PathBuf::from("/srv/nd")),
        "HOME" => Some(PathBuf::from("/home/ada")),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.dir, PathBuf::from("/srv/nd"));

    assert!(matches!(
        StoreConfig::from_lookup(|_| None),
        Err(StorageError::NoStoreDir)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Favorites behave like an insertion-ordered set under any sequence of
    /// add/remove/toggle.
    #[test]
    fn test_favorites_match_set_model(ops in proptest::collection::vec((0u8..3, 0usize..4), 0..24)) {
        let (store, _dir) = test_store();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut model: Vec<Uuid> = Vec::new();

        for (op, which) in ops {
            let id = ids[which];
            match op {
                0 => {
                    store.add_favorite(id).unwrap();
                    if !model.contains(&id) {
                        model.push(id);
                    }
                }
                1 => {
                    store.remove_favorite(id).unwrap();
                    model.retain(|m| *m != id);
                }
                _ => {
                    let now = store.toggle_favorite(id).unwrap();
                    if model.contains(&id) {
                        model.retain(|m| *m != id);
                    } else {
                        model.push(id);
                    }
                    prop_assert_eq!(now, model.contains(&id));
                }
            }
        }
        prop_assert_eq!(store.favorites().unwrap(), model);
    }
}
