use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the vault engine.
///
/// Every top-level operation in [`crate`] returns one of these on failure;
/// callers that only need to report an error can rely on `Display`, callers
/// that need to branch on it (retry, surface a specific message) can match
/// on the variant.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found: {0}")]
    MissingFile(PathBuf),

    #[error("path is not representable as UTF-8: {0}")]
    UnsupportedPath(PathBuf),

    #[error("failed to compute or apply rolling signature for {path}: {reason}")]
    SignatureFailure { path: PathBuf, reason: String },

    #[error("delta for {path} is corrupt or references unknown blocks: {reason}")]
    CorruptDelta { path: PathBuf, reason: String },

    #[error("no predecessor signature recorded for {0}; cannot compute delta")]
    NoPredecessorSignature(PathBuf),

    #[error("failed to decrypt vault member {member}: wrong passphrase or corrupt data")]
    DecryptionFailure { member: String },

    #[error("vault is malformed: {0}")]
    MalformedVault(String),

    #[error("integrity hash mismatch for predecessor {expected_name}: recorded {expected}, computed {actual}")]
    HashMismatch {
        expected_name: String,
        expected: String,
        actual: String,
    },

    #[error("vault chain is broken: {0}")]
    BrokenChain(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("no entry for key {key} in category {category}")]
    MissingEntry { category: String, key: String },

    #[error("output directory {0} is not empty")]
    OutputNotEmpty(PathBuf),

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaultError::Io {
            path: path.into(),
            source,
        }
    }
}
