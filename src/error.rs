//! Error types for modforge
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration store errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Module table file not found
    #[error("Module table not found at '{path}'")]
    TableNotFound { path: PathBuf },

    /// Module table failed to parse
    #[error("Failed to parse module table: {source}")]
    TableParse { source: toml::de::Error },

    /// Module table failed to serialize
    #[error("Failed to serialize module table: {source}")]
    TableSerialize { source: toml::ser::Error },

    /// Configuration directory missing or not a directory
    #[error("Configuration directory '{path}' does not exist")]
    DirectoryNotFound { path: PathBuf },

    /// No install root given by flag or table
    #[error("No install root: set 'install_root' in the module table or pass --install-root")]
    MissingInstallRoot,

    /// IO error while reading the store
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Module table validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Two table entries share a name
    #[error("Duplicate module name '{name}'")]
    DuplicateName { name: String },

    /// A dependency names a module that is not in the table
    #[error("Module '{module}' depends on '{dependency}', which is not in the table")]
    DanglingDependency { module: String, dependency: String },

    /// A module lists itself as a dependency
    #[error("Module '{module}' depends on itself")]
    SelfDependency { module: String },

    /// Install path is empty
    #[error("Module '{module}' has an empty install path")]
    EmptyInstallPath { module: String },
}

/// Dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Dependency cycle, no valid total order exists
    #[error("Dependency cycle involving: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    /// A build-enabled module depends on a build-disabled one
    #[error("Module '{module}' depends on '{dependency}', which is not enabled for build")]
    DisabledDependency { module: String, dependency: String },
}

/// Source checkout errors
#[derive(Error, Debug)]
pub enum CloneError {
    /// Clone could not reach or authenticate against the remote
    #[error("Failed to clone '{url}': {error}")]
    CloneFailed { url: String, error: String },

    /// The requested ref does not exist in the repository
    #[error("Ref '{reference}' not found in repository '{url}'")]
    RefNotFound { url: String, reference: String },

    /// The worktree could not be pinned to the resolved commit
    #[error("Failed to check out '{reference}': {error}")]
    CheckoutFailed { reference: String, error: String },

    /// Destination holds content that is not a checkout of this module
    #[error("Destination '{path}' already exists and is not a checkout of this module")]
    DestinationConflict { path: PathBuf },

    /// Destination holds a different version and the policy is to abort
    #[error("Module '{module}' at '{path}' holds version '{found}', expected '{expected}'")]
    VersionConflict {
        module: String,
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Archive download failed
    #[error("Failed to download '{url}': {error}")]
    DownloadFailed { url: String, error: String },

    /// Downloaded archive failed checksum verification
    #[error("Checksum mismatch for '{url}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// Archive unpack failed
    #[error("Failed to unpack archive for module '{module}': {error}")]
    UnpackFailed { module: String, error: String },

    /// Module has clone disabled but its sources are missing
    #[error("Module '{module}' has clone disabled and no sources at '{path}'")]
    SourcesMissing { module: String, path: PathBuf },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Build-configuration patching errors
///
/// These never halt a module's build; the orchestrator downgrades them
/// to per-module warnings.
#[derive(Error, Debug)]
pub enum PatchError {
    /// Injection target file does not exist
    #[error("Injection target '{path}' does not exist")]
    TargetMissing { path: PathBuf },

    /// IO error while patching
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Build invocation errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// External build tool returned a non-zero exit status
    #[error("Build of module '{module}' exited with status {status}")]
    ExitStatus { module: String, status: i32 },

    /// Build exceeded the configured timeout
    #[error("Build of module '{module}' timed out after {seconds}s")]
    Timeout { module: String, seconds: u64 },

    /// Build was cancelled
    #[error("Build of module '{module}' was cancelled")]
    Cancelled { module: String },

    /// The build tool or script could not be started
    #[error("Failed to start build for module '{module}': {error}")]
    SpawnFailed { module: String, error: String },
}

/// Bundle assembly errors
#[derive(Error, Debug)]
pub enum PackageError {
    /// No successfully built modules to include
    #[error("No successfully built modules to package")]
    NothingToPackage,

    /// A module recorded as succeeded has no output on disk
    #[error("Module '{module}' has no build output at '{path}'")]
    OutputMissing { module: String, path: PathBuf },

    /// IO error during bundle assembly
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Top-level modforge error type
#[derive(Error, Debug)]
pub enum ModforgeError {
    /// Configuration store error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Module table validation failed
    #[error("Invalid module table:\n{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<ValidationError>),

    /// Resolver error
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Clone error
    #[error("Clone error: {0}")]
    Clone(#[from] CloneError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Package error
    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    /// IO error
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
