//! Module table handling
//!
//! The module table is the declarative heart of a configuration store:
//! an ordered list of modules with source locations, versions, flags and
//! explicit dependency lists. Authored order is kept as a tie-break hint
//! for the resolver, never as the authoritative build order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::{ConfigError, ValidationError};

/// How a module's sources are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Git repository, checked out at the module's version
    #[default]
    Git,
    /// Downloadable archive, unpacked into the install path
    Archive,
}

/// A single module entry in the table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Module {
    /// Unique module name
    pub name: String,

    /// Version to check out: tag, branch or rev for git sources,
    /// a plain version string for archives
    pub version: String,

    /// Repository or download URL
    pub url: String,

    /// Source kind
    #[serde(default)]
    pub source: SourceKind,

    /// Install path relative to the install root
    pub install_path: String,

    /// Whether sources are fetched (false = already on disk)
    #[serde(default = "default_true")]
    pub clone: bool,

    /// Whether the module is built
    #[serde(default = "default_true")]
    pub build: bool,

    /// Whether the module is included in the bundle
    #[serde(default = "default_true")]
    pub package: bool,

    /// Names of modules that must be built before this one
    #[serde(default)]
    pub depends: Vec<String>,

    /// Custom build script reference, relative to the scripts directory
    #[serde(default)]
    pub script: Option<String>,

    /// Failure criticality override; unset derives it from the graph
    #[serde(default)]
    pub critical: Option<bool>,

    /// Expected SHA256 of the downloaded archive
    #[serde(default)]
    pub sha256: Option<String>,

    /// Per-module environment overrides for build subprocesses
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resolved custom build script path, filled in at load time
    #[serde(skip)]
    pub script_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Module {
    /// Absolute checkout path under the given install root
    pub fn abs_path(&self, install_root: &Path) -> PathBuf {
        install_root.join(&self.install_path)
    }
}

/// Bundle-related table metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BundleConfig {
    /// Module whose version names the bundle; defaults to the first
    /// table entry
    #[serde(default)]
    pub version_of: Option<String>,
}

/// The parsed module table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleTable {
    /// Default install root; the CLI may override it
    #[serde(default)]
    pub install_root: Option<PathBuf>,

    /// Bundle metadata
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Modules in authored order
    #[serde(rename = "module", default)]
    pub modules: Vec<Module>,
}

impl ModuleTable {
    /// Parse a table from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TableParse { source })
    }

    /// Serialize the table to TOML text
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::TableSerialize { source })
    }

    /// Load the table from a configuration directory.
    ///
    /// Resolves the custom-build-script registry once: an explicit
    /// `script` field wins, otherwise a `scripts/<name>.sh` file is
    /// picked up by module name.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        if !config_dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: config_dir.to_path_buf(),
            });
        }
        let table_path = config_dir.join(defaults::MODULE_TABLE_FILE);
        if !table_path.exists() {
            return Err(ConfigError::TableNotFound { path: table_path });
        }
        let content =
            std::fs::read_to_string(&table_path).map_err(|e| ConfigError::IoError {
                path: table_path.clone(),
                error: e.to_string(),
            })?;
        let mut table = Self::from_toml(&content)?;
        table.resolve_scripts(&config_dir.join(defaults::SCRIPTS_DIR));
        Ok(table)
    }

    /// Write the table back as TOML.
    ///
    /// Pure function of (table, path): no side effects beyond the write.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    fn resolve_scripts(&mut self, scripts_dir: &Path) {
        for module in &mut self.modules {
            let candidate = match &module.script {
                Some(script) => {
                    let p = PathBuf::from(script);
                    if p.is_absolute() {
                        p
                    } else {
                        scripts_dir.join(script)
                    }
                }
                None => scripts_dir.join(format!("{}.sh", module.name)),
            };
            if candidate.is_file() {
                tracing::debug!(
                    "Custom build script for '{}': {}",
                    module.name,
                    candidate.display()
                );
                module.script_path = Some(candidate);
            } else if module.script.is_some() {
                tracing::warn!(
                    "Custom build script '{}' for module '{}' not found",
                    candidate.display(),
                    module.name
                );
            }
        }
    }

    /// Look up a module by name
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Validate the table, returning every problem found
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                errors.push(ValidationError::DuplicateName {
                    name: module.name.clone(),
                });
            }
        }

        let names: HashSet<&str> = self.modules.iter().map(|m| m.name.as_str()).collect();
        for module in &self.modules {
            if module.install_path.trim().is_empty() {
                errors.push(ValidationError::EmptyInstallPath {
                    module: module.name.clone(),
                });
            }
            for dep in &module.depends {
                if dep == &module.name {
                    errors.push(ValidationError::SelfDependency {
                        module: module.name.clone(),
                    });
                } else if !names.contains(dep.as_str()) {
                    errors.push(ValidationError::DanglingDependency {
                        module: module.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        errors
    }

    /// Version string the bundle name is derived from.
    ///
    /// Taken from the module named by `bundle.version_of`, falling back
    /// to the first table entry. Never generated ad hoc.
    pub fn bundle_version(&self) -> Option<&str> {
        match &self.bundle.version_of {
            Some(name) => self.get(name).map(|m| m.version.as_str()),
            None => self.modules.first().map(|m| m.version.as_str()),
        }
    }
}
