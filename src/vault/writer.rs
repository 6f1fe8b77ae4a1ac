//! Vault writer: assembles a full or incremental vault from scanner output
//! plus, for an incremental, the predecessor's signature table and file
//! set.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::archive::ArchiveBuilder;
use crate::cipher;
use crate::compress;
use crate::config::EngineConfig;
use crate::delta::{self, RollingSignature};
use crate::dirstate::DirState;
use crate::error::{Result, VaultError};
use crate::vault::{
    PreviousVaultRef, SigEntry, VaultKind, VaultMetadata, DATA_CREATED_PREFIX, DATA_UPDATED_PREFIX,
    MEMBER_LIST, MEMBER_METADATA, MEMBER_SIGS, MEMBER_STATE,
};

/// What an incremental writer needs from its predecessor, copied by value
/// so the predecessor reader can be closed immediately at construction.
pub struct PredecessorInfo {
    pub file_name: String,
    pub hash: String,
    pub signatures: HashMap<String, RollingSignature>,
    pub file_set: HashSet<String>,
}

pub struct VaultWriter {
    output_dir: PathBuf,
    source_dir: PathBuf,
    passphrase: String,
    config: EngineConfig,
    created_at: DateTime<Utc>,
    id: String,
    predecessor: Option<PredecessorInfo>,
    signatures: HashMap<String, RollingSignature>,
    file_set: HashSet<String>,
    data: ArchiveBuilder,
}

impl VaultWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        passphrase: impl Into<String>,
        predecessor: Option<PredecessorInfo>,
        config: EngineConfig,
    ) -> Self {
        let (signatures, file_set) = match &predecessor {
            Some(p) => (p.signatures.clone(), p.file_set.clone()),
            None => (HashMap::new(), HashSet::new()),
        };
        let created_at = Utc::now();
        Self {
            output_dir: output_dir.into(),
            source_dir: source_dir.into(),
            passphrase: passphrase.into(),
            config,
            created_at,
            id: created_at.to_rfc3339(),
            predecessor,
            signatures,
            file_set,
            data: ArchiveBuilder::new(),
        }
    }

    /// Override the auto-generated UTC-timestamp id, e.g. for deterministic
    /// test fixtures or a caller-assigned naming scheme. `close()`'s
    /// `metadata.timestamp` still reflects the instant this writer was
    /// constructed, not the overridden id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn kind(&self) -> VaultKind {
        if self.predecessor.is_some() {
            VaultKind::Incremental
        } else {
            VaultKind::Full
        }
    }

    /// Stream `key`'s current bytes into the vault, compute its rolling
    /// signature, and add it to `file_set`.
    pub fn create(&mut self, key: &str) -> Result<()> {
        let path = self.source_dir.join(key);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaultError::MissingFile(path.clone()),
            _ => VaultError::io(path.clone(), e),
        })?;
        let sig = delta::signature(&bytes, self.config.block_size, self.config.crypto_hash_len as u32)?;

        self.data.append(&format!("{DATA_CREATED_PREFIX}/{key}"), &bytes)?;
        self.signatures.insert(key.to_string(), sig);
        self.file_set.insert(key.to_string());
        Ok(())
    }

    /// Compute a delta of `key` against its recorded predecessor signature,
    /// store the delta, and recompute the signature from the new content.
    pub fn update(&mut self, key: &str) -> Result<()> {
        let old_sig = self
            .signatures
            .get(key)
            .ok_or_else(|| VaultError::NoPredecessorSignature(PathBuf::from(key)))?
            .clone();

        let path = self.source_dir.join(key);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaultError::MissingFile(path.clone()),
            _ => VaultError::io(path.clone(), e),
        })?;

        let delta_bytes = delta::delta(&bytes, &old_sig, &path)?;
        self.data.append(&format!("{DATA_UPDATED_PREFIX}/{key}"), &delta_bytes)?;

        let new_sig = delta::signature(&bytes, self.config.block_size, self.config.crypto_hash_len as u32)?;
        self.signatures.insert(key.to_string(), new_sig);
        Ok(())
    }

    /// Drop `key` from the vault. A no-op if `key` is not currently tracked.
    pub fn delete(&mut self, key: &str) {
        self.signatures.remove(key);
        self.file_set.remove(key);
    }

    /// Finalize the vault atomically: compress+encrypt the data archive,
    /// assemble the five fixed outer members, and rename into place. Never
    /// leaves a partial vault file behind on failure.
    #[tracing::instrument(skip_all, fields(id = %self.id, kind = ?self.kind()))]
    pub fn close(mut self, dir_state: &DirState) -> Result<PathBuf> {
        let dir_name = self
            .source_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        let metadata = VaultMetadata {
            id: self.id.clone(),
            timestamp: self.created_at.to_rfc3339(),
            kind: self.kind(),
            dir_name,
            previous_vault: self.predecessor.as_ref().map(|p| PreviousVaultRef {
                file_name: p.file_name.clone(),
                hash: p.hash.clone(),
            }),
        };

        let list: Vec<&String> = self.file_set.iter().collect();
        let sigs: Vec<SigEntry> = self
            .signatures
            .iter()
            .map(|(file, sig)| SigEntry {
                file: file.clone(),
                sig: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &sig.0),
            })
            .collect();

        let metadata_json = serde_json::to_vec(&metadata)
            .map_err(|e| VaultError::MalformedVault(format!("metadata serialization: {e}")))?;
        let list_json = serde_json::to_vec(&list)
            .map_err(|e| VaultError::MalformedVault(format!("list serialization: {e}")))?;
        let sigs_json = serde_json::to_vec(&sigs)
            .map_err(|e| VaultError::MalformedVault(format!("sigs serialization: {e}")))?;
        let state_json = serde_json::to_vec(dir_state)
            .map_err(|e| VaultError::MalformedVault(format!("state serialization: {e}")))?;

        let data_raw = std::mem::take(&mut self.data).finish()?;
        let data_compressed = compress::compress(&data_raw, self.config.zstd_level)?;

        let scrypt_n = self.config.scrypt_log_n;
        let metadata_enc = cipher::encrypt(MEMBER_METADATA, &metadata_json, &self.passphrase, self.config.cipher, scrypt_n)?;
        let list_enc = cipher::encrypt(MEMBER_LIST, &list_json, &self.passphrase, self.config.cipher, scrypt_n)?;
        let sigs_enc = cipher::encrypt(MEMBER_SIGS, &sigs_json, &self.passphrase, self.config.cipher, scrypt_n)?;
        let state_enc = cipher::encrypt(MEMBER_STATE, &state_json, &self.passphrase, self.config.cipher, scrypt_n)?;
        let data_enc = cipher::encrypt(crate::vault::MEMBER_DATA, &data_compressed, &self.passphrase, self.config.cipher, scrypt_n)?;

        let mut outer = ArchiveBuilder::new();
        outer.append(MEMBER_METADATA, &metadata_enc)?;
        outer.append(MEMBER_LIST, &list_enc)?;
        outer.append(MEMBER_SIGS, &sigs_enc)?;
        outer.append(MEMBER_STATE, &state_enc)?;
        outer.append(crate::vault::MEMBER_DATA, &data_enc)?;
        let outer_bytes = outer.finish()?;

        fs::create_dir_all(&self.output_dir).map_err(|e| VaultError::io(self.output_dir.clone(), e))?;
        let final_path = self.output_dir.join(format!("{}.tar", self.id));
        let temp_path = self.output_dir.join(format!(".{}.tar.tmp", self.id));
        fs::write(&temp_path, &outer_bytes).map_err(|e| VaultError::io(temp_path.clone(), e))?;
        fs::rename(&temp_path, &final_path).map_err(|e| VaultError::io(final_path.clone(), e))?;

        tracing::info!(vault = %final_path.display(), kind = ?self.kind(), "vault closed");
        Ok(final_path)
    }
}

impl Drop for VaultWriter {
    fn drop(&mut self) {
        // No scratch directory is held open by the writer today (the data
        // archive is built in memory), but the drop impl is the scoped exit
        // point a future on-disk scratch area would release through.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_on_untracked_key_is_a_no_op() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut writer = VaultWriter::new(output.path(), source.path(), "pw", None, EngineConfig::default());

        assert!(writer.file_set.is_empty());
        writer.delete("never-existed.txt");
        assert!(writer.file_set.is_empty());
        assert!(writer.signatures.is_empty());
    }

    #[test]
    fn create_then_delete_removes_key_from_file_set() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"hi").unwrap();

        let mut writer = VaultWriter::new(output.path(), source.path(), "pw", None, EngineConfig::default());
        writer.create("a.txt").unwrap();
        assert!(writer.file_set.contains("a.txt"));

        writer.delete("a.txt");
        assert!(!writer.file_set.contains("a.txt"));
        assert!(!writer.signatures.contains_key("a.txt"));
    }
}
