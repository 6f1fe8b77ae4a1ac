//! Archive codec: a sequential file archive with named members, built on
//! `tar`. Used both for the inner `data/<category>/<key>` archive and, by
//! the vault writer/reader, for the outer fixed-member vault container.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use tar::{Builder, Header};

use crate::error::{Result, VaultError};

/// Guard against a tar member escaping `base` via an absolute path or a
/// `..` component.
pub fn safe_join(base: &Path, member: &str) -> Result<PathBuf> {
    let path = Path::new(member);
    if path.is_absolute() {
        return Err(VaultError::MalformedVault(format!("archive member is absolute: {member}")));
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(VaultError::MalformedVault(format!("archive member contains '..': {member}")));
        }
    }
    Ok(base.join(path))
}

/// An in-progress archive being built in memory, one member at a time.
pub struct ArchiveBuilder {
    builder: Builder<Vec<u8>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self { builder: Builder::new(Vec::new()) }
    }

    /// Append `data` under `member` (e.g. `created/<key>` or
    /// `backup/metadata.json.gpg`).
    pub fn append(&mut self, member: &str, data: &[u8]) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder
            .append_data(&mut header, member, Cursor::new(data))
            .map_err(|e| VaultError::io(member, e))
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        let mut builder = self.builder;
        builder.finish().map_err(|e| VaultError::io("<archive>", e))?;
        builder.into_inner().map_err(|e| VaultError::io("<archive>", e))
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract every member of an in-memory archive into a name->bytes map.
/// Used for `unfold()` semantics without touching disk.
pub fn extract_all(data: &[u8]) -> Result<HashMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(Cursor::new(data));
    let mut out = HashMap::new();
    for entry in archive.entries().map_err(|e| VaultError::io("<archive>", e))? {
        let mut entry = entry.map_err(|e| VaultError::io("<archive>", e))?;
        let path = entry
            .path()
            .map_err(|e| VaultError::io("<archive>", e))?
            .to_string_lossy()
            .into_owned();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf).map_err(|e| VaultError::io(path.clone(), e))?;
        out.insert(path, buf);
    }
    Ok(out)
}

/// Extract a single named member's bytes from an in-memory archive, without
/// materializing the others. Used when a reader wants just one of the five
/// fixed outer members.
pub fn extract_member(data: &[u8], wanted: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = tar::Archive::new(Cursor::new(data));
    for entry in archive.entries().map_err(|e| VaultError::io("<archive>", e))? {
        let mut entry = entry.map_err(|e| VaultError::io("<archive>", e))?;
        let path = entry.path().map_err(|e| VaultError::io("<archive>", e))?.to_string_lossy().into_owned();
        if path == wanted {
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf).map_err(|e| VaultError::io(wanted.to_string(), e))?;
            return Ok(Some(buf));
        }
    }
    Ok(None)
}
