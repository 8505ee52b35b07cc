//! Filesystem operations

use std::path::Path;
use walkdir::WalkDir;

use crate::error::PackageError;

/// Recursively copy a directory tree.
///
/// Returns the number of files copied. Symlinks are followed; missing
/// parents under the destination are created as needed.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize, PackageError> {
    copy_tree_excluding(src, dest, &[])
}

/// Copy a directory tree, skipping entries with an excluded file name.
///
/// An excluded directory name prunes its whole subtree.
pub fn copy_tree_excluding(
    src: &Path,
    dest: &Path,
    excluded: &[&str],
) -> Result<usize, PackageError> {
    let mut copied = 0;
    let walker = WalkDir::new(src).follow_links(true).into_iter().filter_entry(|e| {
        e.file_name()
            .to_str()
            .map(|name| !excluded.contains(&name))
            .unwrap_or(true)
    });
    for entry in walker {
        let entry = entry.map_err(|e| PackageError::IoError {
            path: src.to_path_buf(),
            error: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PackageError::IoError {
                path: entry.path().to_path_buf(),
                error: e.to_string(),
            })?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| PackageError::IoError {
                path: target.clone(),
                error: e.to_string(),
            })?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PackageError::IoError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| PackageError::IoError {
                path: target.clone(),
                error: e.to_string(),
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove a directory tree if it exists
pub fn remove_tree(path: &Path) -> Result<(), PackageError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| PackageError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Whether a directory exists and contains at least one entry
pub fn dir_is_nonempty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
