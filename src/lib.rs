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
//! Incremental, chained, encrypted directory-backup vaults.
//!
//! Given a source directory and a passphrase, this crate can create a full
//! vault of all current file contents, create an incremental vault
//! expressing only the changes since a prior vault, and reconstruct the
//! source directory at any point in a vault chain.
//!
//! The caller owns configuration loading, command dispatch, and transport;
//! this crate is the vault subsystem only.

pub mod archive;
pub mod cipher;
pub mod compress;
pub mod config;
pub mod delta;
pub mod dirstate;
pub mod error;
pub mod hash;
pub mod restore;
pub mod scan;
pub mod vault;

use std::path::{Path, PathBuf};

use config::EngineConfig;
use error::Result;
use vault::writer::PredecessorInfo;
use vault::{VaultReader, VaultWriter};

/// Create a full vault of `source_dir` under `vault_dir`, returning the
/// written vault file's path.
pub fn create_vault(vault_dir: impl AsRef<Path>, source_dir: impl AsRef<Path>, passphrase: &str) -> Result<PathBuf> {
    let source_dir = source_dir.as_ref();
    let state = dirstate::snapshot(source_dir)?;
    let config = EngineConfig::load();

    let mut writer = VaultWriter::new(vault_dir.as_ref(), source_dir, passphrase, None, config);
    for key in state.keys() {
        writer.create(key)?;
    }
    writer.close(&state)
}

/// Create an incremental vault expressing only the changes in
/// `source_dir` since `predecessor_file_name`, chained to it.
pub fn increment_vault(
    vault_dir: impl AsRef<Path>,
    predecessor_file_name: &str,
    passphrase: &str,
    source_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let vault_dir = vault_dir.as_ref();
    let source_dir = source_dir.as_ref();

    let predecessor_reader = VaultReader::open(vault_dir.join(predecessor_file_name), passphrase)?;
    let predecessor_hash = predecessor_reader.hash_value().to_string();
    let old_state = predecessor_reader.dir_state().clone();
    let predecessor_info = PredecessorInfo {
        file_name: predecessor_file_name.to_string(),
        hash: predecessor_hash,
        signatures: predecessor_reader.signatures().clone(),
        file_set: predecessor_reader.file_set().clone(),
    };
    predecessor_reader.close();

    let new_state = dirstate::snapshot(source_dir)?;
    let diff = dirstate::diff(&old_state, &new_state);
    let config = EngineConfig::load();

    let mut writer = VaultWriter::new(vault_dir, source_dir, passphrase, Some(predecessor_info), config);
    for key in &diff.created {
        writer.create(key)?;
    }
    for key in &diff.updated {
        writer.update(key)?;
    }
    for key in &diff.deleted {
        writer.delete(key);
    }
    writer.close(&new_state)
}

/// Open a vault for reading, verifying its integrity hash and decoding its
/// metadata, signatures, file set, and dir state.
pub fn open_vault(vault_file_path: impl AsRef<Path>, passphrase: &str) -> Result<VaultReader> {
    VaultReader::open(vault_file_path.as_ref(), passphrase)
}

/// Reconstruct `vault_file_name`'s point in its chain into `output_dir`,
/// which must exist and be empty.
pub fn expand_vault(
    vault_dir: impl AsRef<Path>,
    vault_file_name: &str,
    passphrase: &str,
    output_dir: impl AsRef<Path>,
) -> Result<()> {
    restore::expand_vault(vault_dir.as_ref(), vault_file_name, passphrase, output_dir.as_ref())
}
