//! Directory scanner: recursive snapshot of regular files under a root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::dirstate::FileMeta;
use crate::error::{Result, VaultError};

/// Walk `root` recursively and return `(key, FileMeta)` pairs for every
/// regular file found. Only regular files are tracked; directories are not
/// part of the returned set.
///
/// Symlinks are followed at most one level: a symlink target is stat'd and,
/// if itself a regular file, included; a symlink reached by following
/// another symlink is not followed further. Cycles are broken by checking
/// that a followed target does not resolve back inside a path already on
/// the current descent chain.
pub fn snapshot_entries(root: &Path) -> Result<Vec<(String, FileMeta)>> {
    let mut out = Vec::new();
    let canonical_root = root.canonicalize().map_err(|e| VaultError::io(root.to_path_buf(), e))?;

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            VaultError::io(path, e.into_io_error().unwrap_or_else(|| std::io::Error::other("walk error")))
        })?;

        let path = entry.path();
        if path == root {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .map_err(|_| VaultError::MalformedVault(format!("{} not under {}", path.display(), root.display())))?;

        let key = rel
            .to_str()
            .map(|s| s.replace(std::path::MAIN_SEPARATOR, "/"))
            .ok_or_else(|| VaultError::UnsupportedPath(path.to_path_buf()))?;

        let meta = fs::symlink_metadata(path).map_err(|e| VaultError::io(path.to_path_buf(), e))?;

        if meta.is_symlink() {
            if let Some(resolved) = resolve_one_level(path, &canonical_root, &mut HashSet::new()) {
                if resolved.is_file() {
                    let file_meta = read_file_meta(&resolved)?;
                    out.push((key, file_meta));
                }
            }
            continue;
        }

        if meta.is_file() {
            let file_meta = read_file_meta(path)?;
            out.push((key, file_meta));
        }
    }

    Ok(out)
}

/// Resolve a single level of symlink indirection for `path`, refusing to
/// follow a chain that would re-enter a directory already walked on this
/// descent (cycle guard). `root` must already be canonicalized.
fn resolve_one_level(path: &Path, root: &Path, seen: &mut HashSet<PathBuf>) -> Option<PathBuf> {
    let target = fs::read_link(path).ok()?;
    let resolved = if target.is_absolute() {
        target
    } else {
        path.parent()?.join(target)
    };
    let canonical = resolved.canonicalize().ok()?;
    if !canonical.starts_with(root) {
        return None;
    }
    if seen.contains(&canonical) {
        return None;
    }
    seen.insert(canonical.clone());
    Some(canonical)
}

fn read_file_meta(path: &Path) -> Result<FileMeta> {
    let meta = fs::metadata(path).map_err(|e| VaultError::io(path.to_path_buf(), e))?;
    let size = meta.len();
    let mtime = mtime_secs(&meta);
    let fingerprint = crate::hash::blake3_file(path)?;
    Ok(FileMeta { size, mtime, fingerprint })
}

#[cfg(unix)]
fn mtime_secs(meta: &fs::Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    meta.mtime()
}

#[cfg(not(unix))]
fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
