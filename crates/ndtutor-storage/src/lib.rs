//! ndtutor Local Storage
//!
//! Per-user bookkeeping that never leaves the machine:
//!
//! ```text
//! <store dir>/
//! ├── data.json     {feedback_items, favorite_items, completed, welcome_collapsed}
//! ├── rootId.json   root id of the last completed proof
//! └── nodes.json    node list of the last completed proof
//! ```
//!
//! Each key is one JSON file. Updates read the whole blob, modify it and write
//! it back through a temporary file that is renamed over the old one, so a
//! reader never sees a half-written file. Within a process, updates are
//! serialized by a lock; across processes the last write wins.
//!
//! A `data.json` that does not parse is reported and treated as empty
//! progress rather than failing every operation.

#[cfg(test)]
mod tests;

use ndtutor_core::{ExerciseId, NodeId, ProofNode, ProofTree, TreeError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const DATA_KEY: &str = "data";
const ROOT_ID_KEY: &str = "rootId";
const NODES_KEY: &str = "nodes";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl StoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `NDTUTOR_HOME`, else `$HOME/.ndtutor`.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|key| std::env::var_os(key).map(PathBuf::from))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<PathBuf>) -> Result<Self, StorageError> {
        if let Some(dir) = lookup("NDTUTOR_HOME") {
            return Ok(Self::new(dir));
        }
        lookup("HOME")
            .map(|home| Self::new(home.join(".ndtutor")))
            .ok_or(StorageError::NoStoreDir)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no store directory: set NDTUTOR_HOME or HOME")]
    NoStoreDir,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored proof tree is invalid: {0}")]
    Tree(#[from] TreeError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// Progress blob
// ============================================================================

/// Everything stored under the `data` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub feedback_items: Vec<ExerciseId>,
    #[serde(default)]
    pub favorite_items: Vec<ExerciseId>,
    #[serde(default)]
    pub completed: Vec<ExerciseId>,
    #[serde(default)]
    pub welcome_collapsed: bool,
}

/// Append `id` unless present. Returns whether the list changed.
fn insert_unique(list: &mut Vec<ExerciseId>, id: ExerciseId) -> bool {
    if list.contains(&id) {
        return false;
    }
    list.push(id);
    true
}

// ============================================================================
// Store
// ============================================================================

pub struct LocalStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Open (and create if needed) the store directory.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.dir).map_err(io_error(&config.dir))?;
        Ok(Self {
            dir: config.dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Raw contents of `key`, `None` when it was never written.
    fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_of(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    /// Decode `key`, falling back to `None` (with a warning) when the stored
    /// bytes do not parse.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(bytes) = self.read_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(
                    path = %self.path_of(key).display(),
                    error = %err,
                    "ignoring unreadable stored value"
                );
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &'static str, value: &T) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode { key, source })?;
        let path = self.path_of(key);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_error(&self.dir))?;
        tmp.write_all(&bytes).map_err(io_error(tmp.path()))?;
        tmp.as_file().sync_all().map_err(io_error(&path))?;
        tmp.persist(&path)
            .map_err(|err| io_error(&path)(err.error))?;
        tracing::debug!(key, path = %path.display(), "stored value");
        Ok(())
    }

    /// Current progress; defaults when nothing was stored yet.
    pub fn progress(&self) -> Result<Progress, StorageError> {
        Ok(self.read_json(DATA_KEY)?.unwrap_or_default())
    }

    /// Read-modify-write of the progress blob. The blob is only written when
    /// `f` reports a change.
    fn update<R>(&self, f: impl FnOnce(&mut Progress) -> (bool, R)) -> Result<R, StorageError> {
        let _guard = self.write_lock.lock();
        let mut progress = self.progress()?;
        let (changed, result) = f(&mut progress);
        if changed {
            self.write_json(DATA_KEY, &progress)?;
        }
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------------

    pub fn add_favorite(&self, id: ExerciseId) -> Result<(), StorageError> {
        self.update(|p| (insert_unique(&mut p.favorite_items, id), ()))
    }

    pub fn remove_favorite(&self, id: ExerciseId) -> Result<(), StorageError> {
        self.update(|p| {
            let before = p.favorite_items.len();
            p.favorite_items.retain(|f| *f != id);
            (p.favorite_items.len() != before, ())
        })
    }

    /// Flip the favorite flag; returns the new state.
    pub fn toggle_favorite(&self, id: ExerciseId) -> Result<bool, StorageError> {
        self.update(|p| {
            if p.favorite_items.contains(&id) {
                p.favorite_items.retain(|f| *f != id);
                (true, false)
            } else {
                p.favorite_items.push(id);
                (true, true)
            }
        })
    }

    pub fn is_favorite(&self, id: ExerciseId) -> Result<bool, StorageError> {
        Ok(self.progress()?.favorite_items.contains(&id))
    }

    pub fn favorites(&self) -> Result<Vec<ExerciseId>, StorageError> {
        Ok(self.progress()?.favorite_items)
    }

    // ------------------------------------------------------------------------
    // Feedback and completion
    // ------------------------------------------------------------------------

    pub fn add_feedback(&self, id: ExerciseId) -> Result<(), StorageError> {
        self.update(|p| (insert_unique(&mut p.feedback_items, id), ()))
    }

    pub fn has_feedback(&self, id: ExerciseId) -> Result<bool, StorageError> {
        Ok(self.progress()?.feedback_items.contains(&id))
    }

    pub fn add_completed(&self, id: ExerciseId) -> Result<(), StorageError> {
        self.update(|p| (insert_unique(&mut p.completed, id), ()))
    }

    pub fn is_completed(&self, id: ExerciseId) -> Result<bool, StorageError> {
        Ok(self.progress()?.completed.contains(&id))
    }

    pub fn completed(&self) -> Result<Vec<ExerciseId>, StorageError> {
        Ok(self.progress()?.completed)
    }

    // ------------------------------------------------------------------------
    // Welcome panel
    // ------------------------------------------------------------------------

    pub fn welcome_collapsed(&self) -> Result<bool, StorageError> {
        Ok(self.progress()?.welcome_collapsed)
    }

    pub fn set_welcome_collapsed(&self, collapsed: bool) -> Result<(), StorageError> {
        self.update(|p| {
            let changed = p.welcome_collapsed != collapsed;
            p.welcome_collapsed = collapsed;
            (changed, ())
        })
    }

    // ------------------------------------------------------------------------
    // Tree snapshot
    // ------------------------------------------------------------------------

    /// Remember the last completed proof.
    pub fn save_tree(&self, root_id: NodeId, nodes: &[ProofNode]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        self.write_json(NODES_KEY, &nodes)?;
        self.write_json(ROOT_ID_KEY, &root_id)?;
        Ok(())
    }

    /// The last saved proof, if any. Unreadable snapshots count as absent;
    /// a snapshot that parses but does not form a tree is an error.
    pub fn load_tree(&self) -> Result<Option<ProofTree>, StorageError> {
        let Some(root_id) = self.read_json::<NodeId>(ROOT_ID_KEY)? else {
            return Ok(None);
        };
        let Some(nodes) = self.read_json::<Vec<ProofNode>>(NODES_KEY)? else {
            return Ok(None);
        };
        Ok(Some(ProofTree::from_snapshot(root_id, nodes)?))
    }
}
