//! Integration tests for the vault engine's core contract: round-trip
//! fidelity across full and incremental vaults, chain integrity under
//! tampering, delta minimality, and the restore-target precondition.
//!
//! ## Coverage
//!
//! - Round-trip identity, full vault and a short incremental chain
//! - Chain integrity: a corrupted predecessor fails the tip's restore
//! - Idempotent delete
//! - Empty-output precondition on `expand_vault`
//! - Delta minimality for a small change to a large file
//! - Signature coverage across a full vault and its incremental successor

use std::fs;
use std::path::Path;

use tempfile::tempdir;
use vaultchain::error::VaultError;

const PASSPHRASE: &str = "correct horse battery staple";

fn write_file(dir: &Path, name: &str, contents: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn read_dir_contents(dir: &Path) -> std::collections::BTreeMap<String, Vec<u8>> {
    let mut out = std::collections::BTreeMap::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(dir).unwrap().to_string_lossy().into_owned();
            out.insert(rel, fs::read(entry.path()).unwrap());
        }
    }
    out
}

#[test]
fn round_trip_full_vault() {
    let source = tempdir().unwrap();
    let vaults = tempdir().unwrap();
    let output = tempdir().unwrap();

    write_file(source.path(), "a.txt", b"hello");
    write_file(source.path(), "b.txt", b"world");

    let vault_path = vaultchain::create_vault(vaults.path(), source.path(), PASSPHRASE).unwrap();
    let vault_name = vault_path.file_name().unwrap().to_str().unwrap();

    vaultchain::expand_vault(vaults.path(), vault_name, PASSPHRASE, output.path()).unwrap();

    let expected = read_dir_contents(source.path());
    let actual = read_dir_contents(output.path());
    assert_eq!(expected, actual);
}

#[test]
fn round_trip_incremental_chain() {
    let source = tempdir().unwrap();
    let vaults = tempdir().unwrap();

    write_file(source.path(), "a.txt", b"hello");
    write_file(source.path(), "b.txt", b"world");
    let v0 = vaultchain::create_vault(vaults.path(), source.path(), PASSPHRASE).unwrap();
    let v0_name = v0.file_name().unwrap().to_str().unwrap().to_string();

    write_file(source.path(), "a.txt", b"HELLO");
    write_file(source.path(), "c.txt", b"new");
    fs::remove_file(source.path().join("b.txt")).unwrap();

    let v1 = vaultchain::increment_vault(vaults.path(), &v0_name, PASSPHRASE, source.path()).unwrap();
    let v1_name = v1.file_name().unwrap().to_str().unwrap().to_string();

    let out_v1 = tempdir().unwrap();
    vaultchain::expand_vault(vaults.path(), &v1_name, PASSPHRASE, out_v1.path()).unwrap();
    let mut expected_v1 = std::collections::BTreeMap::new();
    expected_v1.insert("a.txt".to_string(), b"HELLO".to_vec());
    expected_v1.insert("c.txt".to_string(), b"new".to_vec());
    assert_eq!(expected_v1, read_dir_contents(out_v1.path()));

    let out_v0 = tempdir().unwrap();
    vaultchain::expand_vault(vaults.path(), &v0_name, PASSPHRASE, out_v0.path()).unwrap();
    let mut expected_v0 = std::collections::BTreeMap::new();
    expected_v0.insert("a.txt".to_string(), b"hello".to_vec());
    expected_v0.insert("b.txt".to_string(), b"world".to_vec());
    assert_eq!(expected_v0, read_dir_contents(out_v0.path()));
}

#[test]
fn chain_integrity_detects_tampered_predecessor() {
    let source = tempdir().unwrap();
    let vaults = tempdir().unwrap();

    write_file(source.path(), "a.txt", b"hello");
    let v0 = vaultchain::create_vault(vaults.path(), source.path(), PASSPHRASE).unwrap();
    let v0_name = v0.file_name().unwrap().to_str().unwrap().to_string();

    write_file(source.path(), "a.txt", b"HELLO");
    let v1 = vaultchain::increment_vault(vaults.path(), &v0_name, PASSPHRASE, source.path()).unwrap();
    let v1_name = v1.file_name().unwrap().to_str().unwrap().to_string();

    // Flip one byte in the middle of the full vault.
    let mut bytes = fs::read(&v0).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&v0, bytes).unwrap();

    let out = tempdir().unwrap();
    let err = vaultchain::expand_vault(vaults.path(), &v1_name, PASSPHRASE, out.path()).unwrap_err();
    assert!(
        matches!(err, VaultError::HashMismatch { .. } | VaultError::DecryptionFailure { .. } | VaultError::MalformedVault(_)),
        "unexpected error variant: {err:?}"
    );
}

#[test]
fn empty_output_precondition() {
    let source = tempdir().unwrap();
    let vaults = tempdir().unwrap();
    let output = tempdir().unwrap();

    write_file(source.path(), "a.txt", b"hello");
    let v0 = vaultchain::create_vault(vaults.path(), source.path(), PASSPHRASE).unwrap();
    let v0_name = v0.file_name().unwrap().to_str().unwrap().to_string();

    write_file(output.path(), "preexisting.txt", b"do not touch");

    let err = vaultchain::expand_vault(vaults.path(), &v0_name, PASSPHRASE, output.path()).unwrap_err();
    assert!(matches!(err, VaultError::OutputNotEmpty(_)));

    // No files were written beyond what was already there.
    let contents = read_dir_contents(output.path());
    assert_eq!(contents.len(), 1);
    assert!(contents.contains_key("preexisting.txt"));
}

#[test]
fn delta_minimality_for_large_mostly_unchanged_file() {
    let source = tempdir().unwrap();
    let vaults = tempdir().unwrap();

    let mut big = vec![0u8; 10 * 1024 * 1024];
    write_file(source.path(), "big.bin", &big);
    let v0 = vaultchain::create_vault(vaults.path(), source.path(), PASSPHRASE).unwrap();
    let v0_name = v0.file_name().unwrap().to_str().unwrap().to_string();

    for b in big.iter_mut().skip(5 * 1024 * 1024).take(4) {
        *b = 0xAB;
    }
    write_file(source.path(), "big.bin", &big);

    let v1 = vaultchain::increment_vault(vaults.path(), &v0_name, PASSPHRASE, source.path()).unwrap();
    let v1_size = fs::metadata(&v1).unwrap().len();
    assert!(v1_size < 64 * 1024, "incremental vault unexpectedly large: {v1_size} bytes");
}

#[test]
fn signature_coverage_holds_across_a_chain() {
    let source = tempdir().unwrap();
    let vaults = tempdir().unwrap();

    write_file(source.path(), "a.txt", b"hello");
    write_file(source.path(), "b.txt", b"world");
    let v0 = vaultchain::create_vault(vaults.path(), source.path(), PASSPHRASE).unwrap();
    let v0_name = v0.file_name().unwrap().to_str().unwrap().to_string();

    let reader0 = vaultchain::open_vault(&v0, PASSPHRASE).unwrap();
    let sig_keys0: std::collections::BTreeSet<_> = reader0.signatures().keys().cloned().collect();
    let file_set0: std::collections::BTreeSet<_> = reader0.file_set().iter().cloned().collect();
    let state_keys0: std::collections::BTreeSet<_> = reader0.dir_state().keys().cloned().collect();
    assert_eq!(sig_keys0, file_set0);
    assert_eq!(file_set0, state_keys0);

    write_file(source.path(), "a.txt", b"HELLO");
    write_file(source.path(), "c.txt", b"new");
    fs::remove_file(source.path().join("b.txt")).unwrap();
    let v1 = vaultchain::increment_vault(vaults.path(), &v0_name, PASSPHRASE, source.path()).unwrap();

    let reader1 = vaultchain::open_vault(&v1, PASSPHRASE).unwrap();
    let sig_keys1: std::collections::BTreeSet<_> = reader1.signatures().keys().cloned().collect();
    let file_set1: std::collections::BTreeSet<_> = reader1.file_set().iter().cloned().collect();
    let state_keys1: std::collections::BTreeSet<_> = reader1.dir_state().keys().cloned().collect();
    assert_eq!(sig_keys1, file_set1);
    assert_eq!(file_set1, state_keys1);

    let mut expected = std::collections::BTreeSet::new();
    expected.insert("a.txt".to_string());
    expected.insert("c.txt".to_string());
    assert_eq!(file_set1, expected);
}
