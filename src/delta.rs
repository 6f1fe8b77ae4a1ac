//! Delta codec: rolling signature, delta, and patch over opaque byte
//! streams, built on `fast_rsync`.
//!
//! The vault format's signatures use a block size of 4 bytes — unusually
//! small for rsync-style signatures, but the literal constant the format
//! has always used, so an implementation must preserve it for
//! cross-version delta compatibility.

use std::io::Read;
use std::path::Path;

use fast_rsync::{apply, Signature, SignatureOptions};

use crate::error::{Result, VaultError};

/// A file's rolling signature. Opaque to everything except this module;
/// callers store and transmit it as bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingSignature(pub Vec<u8>);

fn signature_options(block_size: u32, crypto_hash_len: u32) -> SignatureOptions {
    SignatureOptions {
        block_size,
        crypto_hash_size: crypto_hash_len,
    }
}

/// Compute the rolling signature of `content` with the given block size and
/// strong-hash length (bytes of the crypto hash carried per signature block).
pub fn signature(content: &[u8], block_size: u32, crypto_hash_len: u32) -> Result<RollingSignature> {
    let sig = Signature::calculate(content, signature_options(block_size, crypto_hash_len));
    Ok(RollingSignature(sig.into_serialized()))
}

/// Compute the rolling signature of a file's contents.
pub fn signature_of_file(path: &Path, block_size: u32, crypto_hash_len: u32) -> Result<RollingSignature> {
    let mut buf = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut buf))
        .map_err(|e| VaultError::io(path.to_path_buf(), e))?;
    signature(&buf, block_size, crypto_hash_len)
}

/// Compute a delta such that applying it to the content described by
/// `old_signature` yields `new_content`.
pub fn delta(new_content: &[u8], old_signature: &RollingSignature, path_for_errors: &Path) -> Result<Vec<u8>> {
    let parsed = Signature::deserialize(old_signature.0.clone()).map_err(|e| VaultError::SignatureFailure {
        path: path_for_errors.to_path_buf(),
        reason: format!("could not parse predecessor signature: {e}"),
    })?;
    let index = parsed.index();
    let mut out = Vec::new();
    fast_rsync::diff(&index, new_content, &mut out).map_err(|e| VaultError::SignatureFailure {
        path: path_for_errors.to_path_buf(),
        reason: format!("delta computation failed: {e}"),
    })?;
    Ok(out)
}

/// Apply `delta_bytes` to `old_content`, producing the new content.
pub fn patch(old_content: &[u8], delta_bytes: &[u8], path_for_errors: &Path) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    apply(old_content, delta_bytes, &mut out).map_err(|e| VaultError::CorruptDelta {
        path: path_for_errors.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(out)
}
