//! Vault reader: opens a vault, verifies integrity, and exposes metadata,
//! signatures, file set, dir state, and the data-access operations.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::archive;
use crate::cipher;
use crate::compress;
use crate::delta::RollingSignature;
use crate::dirstate::DirState;
use crate::error::{Result, VaultError};
use crate::hash::{vault_integrity_digest, IntegrityDigest};
use crate::vault::{
    PreviousVaultRef, SigEntry, VaultKind, VaultMetadata, MEMBER_DATA, MEMBER_LIST, MEMBER_METADATA,
    MEMBER_SIGS, MEMBER_STATE,
};

pub struct VaultReader {
    path: PathBuf,
    integrity: IntegrityDigest,
    metadata: VaultMetadata,
    file_set: HashSet<String>,
    signatures: HashMap<String, RollingSignature>,
    dir_state: DirState,
    /// Populated by `unfold()`; `get()` prefers this once present.
    unfolded: Option<HashMap<String, Vec<u8>>>,
    passphrase: String,
}

impl VaultReader {
    /// Open `path`, computing its integrity hash once and eagerly decoding
    /// the four small JSON members. The data archive is left untouched
    /// until [`VaultReader::get`] or [`VaultReader::unfold`] is called.
    pub fn open(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let passphrase = passphrase.into();
        let _span = tracing::info_span!("vault_reader_open", path = %path.display()).entered();

        let integrity = vault_integrity_digest(&path)?;
        let raw = fs::read(&path).map_err(|e| VaultError::io(path.clone(), e))?;

        let metadata_enc = archive::extract_member(&raw, MEMBER_METADATA)?
            .ok_or_else(|| VaultError::MalformedVault(format!("missing {MEMBER_METADATA}")))?;
        let list_enc = archive::extract_member(&raw, MEMBER_LIST)?
            .ok_or_else(|| VaultError::MalformedVault(format!("missing {MEMBER_LIST}")))?;
        let sigs_enc = archive::extract_member(&raw, MEMBER_SIGS)?
            .ok_or_else(|| VaultError::MalformedVault(format!("missing {MEMBER_SIGS}")))?;
        let state_enc = archive::extract_member(&raw, MEMBER_STATE)?
            .ok_or_else(|| VaultError::MalformedVault(format!("missing {MEMBER_STATE}")))?;

        let metadata_json = cipher::decrypt(MEMBER_METADATA, &metadata_enc, &passphrase)?;
        let list_json = cipher::decrypt(MEMBER_LIST, &list_enc, &passphrase)?;
        let sigs_json = cipher::decrypt(MEMBER_SIGS, &sigs_enc, &passphrase)?;
        let state_json = cipher::decrypt(MEMBER_STATE, &state_enc, &passphrase)?;

        let metadata: VaultMetadata = serde_json::from_slice(&metadata_json)
            .map_err(|e| VaultError::MalformedVault(format!("metadata: {e}")))?;
        let list: Vec<String> = serde_json::from_slice(&list_json)
            .map_err(|e| VaultError::MalformedVault(format!("list: {e}")))?;
        let sig_entries: Vec<SigEntry> = serde_json::from_slice(&sigs_json)
            .map_err(|e| VaultError::MalformedVault(format!("sigs: {e}")))?;
        let dir_state: DirState = serde_json::from_slice(&state_json)
            .map_err(|e| VaultError::MalformedVault(format!("state: {e}")))?;

        let mut signatures = HashMap::with_capacity(sig_entries.len());
        for entry in sig_entries {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&entry.sig)
                .map_err(|e| VaultError::MalformedVault(format!("sig base64 for {}: {e}", entry.file)))?;
            signatures.insert(entry.file, RollingSignature(bytes));
        }

        tracing::info!(vault = %path.display(), kind = ?metadata.kind, "vault opened");

        Ok(Self {
            path,
            integrity,
            metadata,
            file_set: list.into_iter().collect(),
            signatures,
            dir_state,
            unfolded: None,
            passphrase,
        })
    }

    pub fn kind(&self) -> VaultKind {
        self.metadata.kind
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn timestamp(&self) -> &str {
        &self.metadata.timestamp
    }

    pub fn source_dir_name(&self) -> &str {
        &self.metadata.dir_name
    }

    pub fn hash_value(&self) -> &str {
        &self.integrity.md5_hex
    }

    pub fn blake3_digest(&self) -> &str {
        &self.integrity.blake3_hex
    }

    pub fn file_set(&self) -> &HashSet<String> {
        &self.file_set
    }

    pub fn signatures(&self) -> &HashMap<String, RollingSignature> {
        &self.signatures
    }

    pub fn dir_state(&self) -> &DirState {
        &self.dir_state
    }

    pub fn previous(&self) -> Option<&PreviousVaultRef> {
        self.metadata.previous_vault.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract the entire data archive into memory once; subsequent
    /// `get()` calls read from this cache instead of re-scanning the tar.
    pub fn unfold(&mut self) -> Result<()> {
        if self.unfolded.is_some() {
            return Ok(());
        }
        let raw = fs::read(&self.path).map_err(|e| VaultError::io(self.path.clone(), e))?;
        let data_enc = archive::extract_member(&raw, MEMBER_DATA)?
            .ok_or_else(|| VaultError::MalformedVault(format!("missing {MEMBER_DATA}")))?;
        let data_compressed = cipher::decrypt(MEMBER_DATA, &data_enc, &self.passphrase)?;
        let data_raw = compress::decompress(&data_compressed)?;
        self.unfolded = Some(archive::extract_all(&data_raw)?);
        Ok(())
    }

    /// Stream the bytes of `data/<category>/<key>`. Calls [`Self::unfold`]
    /// on first use if it has not already been called.
    pub fn get(&mut self, category: &str, key: &str) -> Result<Vec<u8>> {
        if category != "created" && category != "updated" {
            return Err(VaultError::InvalidCategory(category.to_string()));
        }
        self.unfold()?;
        let member = format!("{category}/{key}");
        self.unfolded
            .as_ref()
            .expect("unfold() just ran")
            .get(&member)
            .cloned()
            .ok_or_else(|| VaultError::MissingEntry { category: category.to_string(), key: key.to_string() })
    }

    /// Release the reader's in-memory scratch area. Idempotent.
    pub fn close(self) {
        drop(self);
    }
}
