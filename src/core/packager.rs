//! Bundle assembly
//!
//! Collects the outputs of successfully built modules into a single
//! bundle directory under the install root. The bundle is a plain
//! directory tree ready to be archived or deployed; VCS metadata and
//! internal stamp files never leak into it.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::report::{ModuleState, RunReport};
use crate::core::table::{Module, ModuleTable};
use crate::error::PackageError;
use crate::infra::filesystem;

/// Entries never copied into a bundle
const BUNDLE_EXCLUDES: &[&str] = &[".git", defaults::VERSION_STAMP_FILE, defaults::STATE_DIR];

/// How module outputs are arranged inside the bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BundleLayout {
    /// One directory per module holding its artifact directories
    #[default]
    Flat,
    /// The install-root hierarchy reproduced under the bundle
    Hierarchical,
}

/// An assembled bundle
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Bundle directory name
    pub name: String,
    /// Absolute bundle location
    pub path: PathBuf,
    /// Modules included, in report order
    pub modules: Vec<String>,
    /// Total files copied
    pub files_copied: usize,
}

/// Assembles bundles from build outputs
#[derive(Debug)]
pub struct Packager {
    install_root: PathBuf,
}

impl Packager {
    /// Create a packager rooted at the install root
    pub fn new(install_root: &Path) -> Self {
        Self {
            install_root: install_root.to_path_buf(),
        }
    }

    /// Assemble a bundle from the run's successful modules.
    ///
    /// Only modules that succeeded and have their `package` flag set are
    /// included; zero such modules is an error rather than an empty
    /// bundle. An existing bundle directory is removed first, so
    /// re-packaging an unchanged report reproduces the same tree.
    pub fn package(
        &self,
        table: &ModuleTable,
        report: &RunReport,
        layout: BundleLayout,
    ) -> Result<Bundle, PackageError> {
        let included: Vec<&Module> = report
            .modules
            .iter()
            .filter(|r| r.state == ModuleState::Succeeded)
            .filter_map(|r| table.get(&r.name))
            .filter(|m| m.package)
            .collect();
        if included.is_empty() {
            return Err(PackageError::NothingToPackage);
        }

        let name = self.bundle_name(table);
        let bundle_path = self.install_root.join(&name);
        filesystem::remove_tree(&bundle_path)?;
        std::fs::create_dir_all(&bundle_path).map_err(|e| PackageError::IoError {
            path: bundle_path.clone(),
            error: e.to_string(),
        })?;

        let mut files_copied = 0;
        for module in &included {
            let source = module.abs_path(&self.install_root);
            if !source.is_dir() {
                return Err(PackageError::OutputMissing {
                    module: module.name.clone(),
                    path: source,
                });
            }
            files_copied += match layout {
                BundleLayout::Flat => self.package_flat(module, &source, &bundle_path)?,
                BundleLayout::Hierarchical => filesystem::copy_tree_excluding(
                    &source,
                    &bundle_path.join(&module.install_path),
                    BUNDLE_EXCLUDES,
                )?,
            };
        }

        tracing::info!(
            "Bundle '{name}' assembled: {} modules, {files_copied} files",
            included.len()
        );
        Ok(Bundle {
            name,
            path: bundle_path,
            modules: included.iter().map(|m| m.name.clone()).collect(),
            files_copied,
        })
    }

    /// Copy one module's artifact directories into its flat group.
    ///
    /// A module with none of the well-known artifact directories is
    /// copied whole, so prebuilt or unconventional modules still land in
    /// the bundle.
    fn package_flat(
        &self,
        module: &Module,
        source: &Path,
        bundle_path: &Path,
    ) -> Result<usize, PackageError> {
        let group = bundle_path.join(&module.name);
        let mut copied = 0;
        let mut found_any = false;
        for artifact_dir in defaults::FLAT_ARTIFACT_DIRS {
            let src = source.join(artifact_dir);
            if src.is_dir() {
                found_any = true;
                copied +=
                    filesystem::copy_tree_excluding(&src, &group.join(artifact_dir), BUNDLE_EXCLUDES)?;
            }
        }
        if !found_any {
            copied += filesystem::copy_tree_excluding(source, &group, BUNDLE_EXCLUDES)?;
        }
        Ok(copied)
    }

    fn bundle_name(&self, table: &ModuleTable) -> String {
        let source = match &table.bundle.version_of {
            Some(name) => table.get(name),
            None => table.modules.first(),
        };
        match source {
            Some(module) => format!("{}-bundle-{}", module.name, module.version),
            None => "modforge-bundle".to_string(),
        }
    }
}
