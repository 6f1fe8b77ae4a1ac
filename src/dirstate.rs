//! Directory snapshot: an unordered mapping from file key to (size, mtime,
//! content fingerprint), and the diff between two such snapshots.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scan::snapshot_entries;

/// Per-file metadata recorded in a [`DirState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    pub mtime: i64,
    /// BLAKE3 hex digest of the file's content at scan time.
    pub fingerprint: String,
}

/// A directory snapshot: file key -> metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirState(pub HashMap<String, FileMeta>);

impl DirState {
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&FileMeta> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: String, meta: FileMeta) {
        self.0.insert(key, meta);
    }

    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    pub fn key_set(&self) -> HashSet<String> {
        self.0.keys().cloned().collect()
    }
}

/// The result of diffing two directory snapshots.
#[derive(Debug, Clone, Default)]
pub struct DirDiff {
    pub created: HashSet<String>,
    pub updated: HashSet<String>,
    pub deleted: HashSet<String>,
}

/// Recursively snapshot `root`, recording every regular file by key.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub fn snapshot(root: &std::path::Path) -> Result<DirState> {
    let entries = snapshot_entries(root)?;
    let mut map = HashMap::with_capacity(entries.len());
    for (key, meta) in entries {
        map.insert(key, meta);
    }
    tracing::debug!(files = map.len(), "directory snapshot complete");
    Ok(DirState(map))
}

/// Diff two directory snapshots by key, classifying by fingerprint
/// inequality (not mtime alone) so touched-but-unchanged files are not
/// treated as updates.
pub fn diff(old: &DirState, new: &DirState) -> DirDiff {
    let mut out = DirDiff::default();

    for key in new.keys() {
        match old.get(key) {
            None => {
                out.created.insert(key.clone());
            }
            Some(old_meta) => {
                let new_meta = new.get(key).expect("key came from new.keys()");
                if old_meta.fingerprint != new_meta.fingerprint {
                    out.updated.insert(key.clone());
                }
            }
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            out.deleted.insert(key.clone());
        }
    }

    out
}
