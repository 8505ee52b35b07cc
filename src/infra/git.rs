//! Git checkouts
//!
//! Clones module repositories with gix and pins them to the requested
//! version. Each checkout carries a version stamp file so a re-run can
//! tell a matching checkout, a stale one and a foreign directory apart.

use gix::remote::fetch::Shallow;
use std::path::Path;

use crate::config::defaults;
use crate::config::ConflictPolicy;
use crate::error::CloneError;

/// Result of ensuring a module checkout
#[derive(Debug, Clone)]
pub struct Checkout {
    /// Resolved commit SHA, when the version mapped to a known ref
    pub commit: Option<String>,
    /// Whether sources were actually fetched (false = reused as-is)
    pub refreshed: bool,
}

/// Read the version stamp of an existing checkout
pub fn read_stamp(dest: &Path) -> Option<String> {
    std::fs::read_to_string(dest.join(defaults::VERSION_STAMP_FILE))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Write the version stamp into a checkout
pub fn write_stamp(dest: &Path, version: &str) -> Result<(), CloneError> {
    let path = dest.join(defaults::VERSION_STAMP_FILE);
    std::fs::write(&path, format!("{version}\n")).map_err(|e| CloneError::IoError {
        path,
        error: e.to_string(),
    })
}

/// Ensure `dest` holds a checkout of `url` at `version`.
///
/// An existing checkout with a matching stamp is reused without any
/// network traffic. A stale checkout is replaced or rejected according
/// to the conflict policy. A non-empty destination without a stamp is
/// never touched.
pub fn ensure_checkout(
    module: &str,
    url: &str,
    version: &str,
    dest: &Path,
    policy: ConflictPolicy,
) -> Result<Checkout, CloneError> {
    if dest.exists() {
        match read_stamp(dest) {
            Some(found) if found == version => {
                tracing::debug!("Module '{module}' already at '{version}', reusing checkout");
                return Ok(Checkout {
                    commit: None,
                    refreshed: false,
                });
            }
            Some(found) => match policy {
                ConflictPolicy::Overwrite => {
                    tracing::info!(
                        "Module '{module}': replacing version '{found}' with '{version}'"
                    );
                    std::fs::remove_dir_all(dest).map_err(|e| CloneError::IoError {
                        path: dest.to_path_buf(),
                        error: e.to_string(),
                    })?;
                }
                ConflictPolicy::Abort => {
                    return Err(CloneError::VersionConflict {
                        module: module.to_string(),
                        path: dest.to_path_buf(),
                        expected: version.to_string(),
                        found,
                    });
                }
            },
            None => {
                let occupied = std::fs::read_dir(dest)
                    .map(|mut entries| entries.next().is_some())
                    .unwrap_or(false);
                if occupied {
                    return Err(CloneError::DestinationConflict {
                        path: dest.to_path_buf(),
                    });
                }
                std::fs::remove_dir_all(dest).map_err(|e| CloneError::IoError {
                    path: dest.to_path_buf(),
                    error: e.to_string(),
                })?;
            }
        }
    }

    let commit = clone_and_pin(url, version, dest)?;
    write_stamp(dest, version)?;
    Ok(Checkout {
        commit: Some(commit),
        refreshed: true,
    })
}

/// Clone a repository and resolve the requested version to a commit
fn clone_and_pin(url: &str, version: &str, dest: &Path) -> Result<String, CloneError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CloneError::IoError {
            path: parent.to_path_buf(),
            error: e.to_string(),
        })?;
    }

    let mut prepare = gix::prepare_clone(url, dest).map_err(|e| CloneError::CloneFailed {
        url: url.to_string(),
        error: e.to_string(),
    })?;
    prepare = prepare.with_shallow(Shallow::DepthAtRemote(
        1.try_into().map_err(|_| CloneError::CloneFailed {
            url: url.to_string(),
            error: "invalid shallow depth".to_string(),
        })?,
    ));

    let (mut checkout, _outcome) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| CloneError::CloneFailed {
            url: url.to_string(),
            error: e.to_string(),
        })?;

    let (repo, _outcome) = checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| CloneError::CloneFailed {
            url: url.to_string(),
            error: e.to_string(),
        })?;

    let commit = resolve_version(&repo, url, version)?;
    pin_worktree(dest, &commit)?;
    Ok(commit)
}

/// Move the worktree to the resolved commit.
///
/// The initial clone leaves the worktree at the remote HEAD; the build
/// must run against the requested version, so the commit is checked out
/// detached before the stamp is written.
fn pin_worktree(dest: &Path, commit: &str) -> Result<(), CloneError> {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(dest)
        .args(["checkout", "--quiet", "--detach", commit])
        .output()
        .map_err(|e| CloneError::CheckoutFailed {
            reference: commit.to_string(),
            error: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(CloneError::CheckoutFailed {
            reference: commit.to_string(),
            error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Resolve a version string to a commit SHA.
///
/// Tried as a tag first, then a remote branch, then a raw object id.
fn resolve_version(
    repo: &gix::Repository,
    url: &str,
    version: &str,
) -> Result<String, CloneError> {
    for candidate in [
        format!("refs/tags/{version}"),
        format!("refs/remotes/origin/{version}"),
        format!("refs/heads/{version}"),
    ] {
        if let Ok(mut reference) = repo.find_reference(&candidate) {
            if let Ok(commit) = reference.peel_to_commit() {
                return Ok(commit.id().to_hex().to_string());
            }
        }
    }

    if version.len() >= 7 && version.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Ok(oid) = gix::ObjectId::from_hex(version.as_bytes()) {
            if repo.find_object(oid).is_ok() {
                return Ok(oid.to_hex().to_string());
            }
        }
    }

    Err(CloneError::RefNotFound {
        url: url.to_string(),
        reference: version.to_string(),
    })
}
