//! Streaming hashes: BLAKE3 content fingerprints for the directory scanner,
//! and the legacy MD5 vault integrity hash plus its BLAKE3 companion digest.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::{Result, VaultError};

const CHUNK_LEN: usize = 131_072; // 128 KiB

/// Stream-hash a file with BLAKE3. Used as the per-file fingerprint in
/// [`crate::dirstate::DirState`].
pub fn blake3_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| VaultError::io(path.to_path_buf(), e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; CHUNK_LEN];
    loop {
        let n = reader.read(&mut buf).map_err(|e| VaultError::io(path.to_path_buf(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// The vault's integrity hash: legacy MD5 over the final on-disk vault
/// bytes, plus an additional BLAKE3 digest exposed for callers that want a
/// stronger check. Chain verification uses MD5 only, per the legacy
/// requirement.
pub struct IntegrityDigest {
    pub md5_hex: String,
    pub blake3_hex: String,
}

pub fn vault_integrity_digest(path: &Path) -> Result<IntegrityDigest> {
    let file = File::open(path).map_err(|e| VaultError::io(path.to_path_buf(), e))?;
    let mut reader = BufReader::new(file);
    let mut md5 = Md5::new();
    let mut b3 = blake3::Hasher::new();
    let mut buf = [0u8; CHUNK_LEN];
    loop {
        let n = reader.read(&mut buf).map_err(|e| VaultError::io(path.to_path_buf(), e))?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        b3.update(&buf[..n]);
    }
    Ok(IntegrityDigest {
        md5_hex: hex::encode(md5.finalize()),
        blake3_hex: b3.finalize().to_hex().to_string(),
    })
}
