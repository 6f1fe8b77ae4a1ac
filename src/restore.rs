// ─────────────────────────────────────────────────────────────────────────────
// vaultchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
// ─────────────────────────────────────────────────────────────────────────────
//! Restore engine: walk a vault chain from a tip back to its full base,
//! then replay forward into a working tree before copying it to the
//! caller's output directory.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::archive::safe_join;
use crate::dirstate::{self, DirState};
use crate::error::{Result, VaultError};
use crate::vault::{VaultKind, VaultReader};

/// Reconstruct the source directory at `vault_file_name`'s point in the
/// chain into `output_dir`, which must exist and be empty.
pub fn expand_vault(vault_dir: &Path, vault_file_name: &str, passphrase: &str, output_dir: &Path) -> Result<()> {
    if output_dir.exists() {
        let mut entries = fs::read_dir(output_dir).map_err(|e| VaultError::io(output_dir.to_path_buf(), e))?;
        if entries.next().is_some() {
            return Err(VaultError::OutputNotEmpty(output_dir.to_path_buf()));
        }
    } else {
        fs::create_dir_all(output_dir).map_err(|e| VaultError::io(output_dir.to_path_buf(), e))?;
    }

    let chain = walk_chain(vault_dir, vault_file_name, passphrase)?;
    let working = TempDir::new().map_err(|e| VaultError::io("<restore working tree>", e))?;

    let mut iter = chain.into_iter();
    let mut base = iter.next().expect("walk_chain always returns at least the base");
    {
        let _span = tracing::info_span!("initializing_from_base", id = %base.id()).entered();
        initialize_from_base(&mut base, working.path())?;
    }
    let mut current_state = base.dir_state().clone();
    drop(base);

    {
        let _span = tracing::info_span!("patching").entered();
        for mut successor in iter {
            apply_successor(&mut successor, working.path(), &current_state)?;
            current_state = successor.dir_state().clone();
            drop(successor);
        }
    }

    {
        let _span = tracing::info_span!("dumping", output = %output_dir.display()).entered();
        copy_tree(working.path(), output_dir)?;
    }

    tracing::info!(vault = vault_file_name, output = %output_dir.display(), "expand_vault complete");
    Ok(())
}

/// Open `tip`, walk its predecessor chain verifying each hop's recorded
/// hash, and return the chain base-first.
fn walk_chain(vault_dir: &Path, tip_file_name: &str, passphrase: &str) -> Result<Vec<VaultReader>> {
    let mut work = Vec::new();
    let mut current = {
        let _span = tracing::info_span!("opening_chain", tip = tip_file_name).entered();
        VaultReader::open(vault_dir.join(tip_file_name), passphrase)?
    };

    let _span = tracing::info_span!("walking_back", tip = tip_file_name).entered();
    loop {
        match current.kind() {
            VaultKind::Full => {
                work.push(current);
                break;
            }
            VaultKind::Incremental => {
                let previous = current
                    .previous()
                    .ok_or_else(|| VaultError::BrokenChain(format!("{tip_file_name} is incremental with no predecessor recorded")))?
                    .clone();
                let predecessor_path = vault_dir.join(&previous.file_name);
                if !predecessor_path.exists() {
                    return Err(VaultError::BrokenChain(format!("predecessor {} not found", previous.file_name)));
                }
                let predecessor = VaultReader::open(&predecessor_path, passphrase)?;
                if predecessor.hash_value() != previous.hash {
                    return Err(VaultError::HashMismatch {
                        expected_name: previous.file_name.clone(),
                        expected: previous.hash.clone(),
                        actual: predecessor.hash_value().to_string(),
                    });
                }
                work.push(current);
                current = predecessor;
            }
        }
    }

    work.reverse();
    Ok(work)
}

fn initialize_from_base(base: &mut VaultReader, working: &Path) -> Result<()> {
    let keys: Vec<String> = base.file_set().iter().cloned().collect();
    for key in keys {
        let bytes = base.get("created", &key)?;
        write_working_file(working, &key, &bytes)?;
    }
    Ok(())
}

fn apply_successor(successor: &mut VaultReader, working: &Path, current_state: &DirState) -> Result<()> {
    let diff = dirstate::diff(current_state, successor.dir_state());

    for key in &diff.deleted {
        let path = safe_join(working, key)?;
        let _ = fs::remove_file(&path);
    }

    for key in &diff.created {
        let bytes = successor.get("created", key)?;
        write_working_file(working, key, &bytes)?;
    }

    for key in &diff.updated {
        let path = safe_join(working, key)?;
        let old_bytes = fs::read(&path).map_err(|e| VaultError::io(path.clone(), e))?;
        let delta_bytes = successor.get("updated", key)?;
        let new_bytes = crate::delta::patch(&old_bytes, &delta_bytes, &path)?;
        fs::write(&path, &new_bytes).map_err(|e| VaultError::io(path, e))?;
    }

    Ok(())
}

fn write_working_file(working: &Path, key: &str, bytes: &[u8]) -> Result<()> {
    let path = safe_join(working, key)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| VaultError::io(parent.to_path_buf(), e))?;
    }
    fs::write(&path, bytes).map_err(|e| VaultError::io(path, e))
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src).into_iter() {
        let entry = entry.map_err(|e| VaultError::io(src.to_path_buf(), std::io::Error::other(e)))?;
        let rel = entry.path().strip_prefix(src).expect("walked under src");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let dest = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| VaultError::io(dest, e))?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| VaultError::io(parent.to_path_buf(), e))?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| VaultError::io(dest, e))?;
        }
    }
    Ok(())
}
