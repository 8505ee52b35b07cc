//! Per-module driver
//!
//! Executes the three module-level phases the orchestrator sequences:
//! prepare (sources on disk), configure (injections and macros applied)
//! and build (external tool invoked). The driver owns no ordering
//! decisions; it processes exactly the module it is handed.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{defaults, RunConfig};
use crate::core::inject::{self, InjectionSet, MacroSet};
use crate::core::table::{Module, ModuleTable, SourceKind};
use crate::error::{BuildError, CloneError};
use crate::infra::download::ArchiveFetcher;
use crate::infra::process::{self, CancelFlag, CommandSpec, RunOutcome};
use crate::infra::{filesystem, git};

/// Outcome of the prepare phase
#[derive(Debug, Clone)]
pub struct PreparedModule {
    /// Whether sources were fetched (false = reused or clone-disabled)
    pub refreshed: bool,
    /// Resolved commit SHA for freshly cloned git sources
    pub commit: Option<String>,
}

/// Outcome of the configure phase
#[derive(Debug, Clone, Default)]
pub struct ConfigureSummary {
    /// Injection fragments applied to files under this module
    pub injections_applied: usize,
    /// Macro assignment lines rewritten
    pub macros_replaced: usize,
    /// Non-fatal configure problems
    pub warnings: Vec<String>,
}

/// Outcome of a successful build phase
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Wall-clock build time
    pub duration: Duration,
    /// Full build log location
    pub log_file: PathBuf,
}

/// A failed build with its captured context
#[derive(Debug)]
pub struct BuildFailure {
    /// What went wrong
    pub error: BuildError,
    /// Tail of the captured output, when the process produced any
    pub output_tail: Option<String>,
    /// Full build log location, when one was written
    pub log_file: Option<PathBuf>,
    /// Wall-clock time spent before the failure
    pub duration: Duration,
}

/// Drives the module-level phases for one run
#[derive(Debug)]
pub struct ModuleDriver {
    config: RunConfig,
    injections: InjectionSet,
    macros: MacroSet,
    fetcher: ArchiveFetcher,
}

impl ModuleDriver {
    /// Create a driver for a run
    pub fn new(config: RunConfig, injections: InjectionSet, macros: MacroSet) -> Self {
        Self {
            config,
            injections,
            macros,
            fetcher: ArchiveFetcher::new(),
        }
    }

    /// Run settings this driver was created with
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Ensure the module's sources are on disk.
    ///
    /// Clone-disabled modules are only verified to exist. Git sources go
    /// through the stamped checkout logic; archives are downloaded,
    /// verified and unpacked with the top-level archive directory
    /// stripped. A checkout whose stamp already matches is left alone.
    pub async fn prepare(
        &self,
        module: &Module,
        cancel: &CancelFlag,
    ) -> Result<PreparedModule, CloneError> {
        let dest = module.abs_path(&self.config.install_root);

        if !module.clone {
            if filesystem::dir_is_nonempty(&dest) {
                return Ok(PreparedModule {
                    refreshed: false,
                    commit: None,
                });
            }
            return Err(CloneError::SourcesMissing {
                module: module.name.clone(),
                path: dest,
            });
        }

        match module.source {
            SourceKind::Git => {
                let name = module.name.clone();
                let url = module.url.clone();
                let version = module.version.clone();
                let policy = self.config.conflict_policy;
                let checkout = tokio::task::spawn_blocking(move || {
                    git::ensure_checkout(&name, &url, &version, &dest, policy)
                })
                .await
                .map_err(|e| CloneError::CloneFailed {
                    url: module.url.clone(),
                    error: e.to_string(),
                })??;
                Ok(PreparedModule {
                    refreshed: checkout.refreshed,
                    commit: checkout.commit,
                })
            }
            SourceKind::Archive => self.prepare_archive(module, &dest, cancel).await,
        }
    }

    async fn prepare_archive(
        &self,
        module: &Module,
        dest: &std::path::Path,
        cancel: &CancelFlag,
    ) -> Result<PreparedModule, CloneError> {
        if git::read_stamp(dest).as_deref() == Some(module.version.as_str()) {
            tracing::debug!(
                "Module '{}' already at '{}', reusing unpacked archive",
                module.name,
                module.version
            );
            return Ok(PreparedModule {
                refreshed: false,
                commit: None,
            });
        }
        if dest.exists() {
            match git::read_stamp(dest) {
                // Stamp mismatch; an exact match returned above
                Some(found) => match self.config.conflict_policy {
                    crate::config::ConflictPolicy::Overwrite => {
                        std::fs::remove_dir_all(dest).map_err(|e| CloneError::IoError {
                            path: dest.to_path_buf(),
                            error: e.to_string(),
                        })?;
                    }
                    crate::config::ConflictPolicy::Abort => {
                        return Err(CloneError::VersionConflict {
                            module: module.name.clone(),
                            path: dest.to_path_buf(),
                            expected: module.version.clone(),
                            found,
                        });
                    }
                },
                None => {
                    if filesystem::dir_is_nonempty(dest) {
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

        let archive = self
            .config
            .state_dir()
            .join("downloads")
            .join(format!("{}-{}.tar.gz", module.name, module.version));
        self.fetcher
            .fetch(&module.url, &archive, module.sha256.as_deref())
            .await?;

        std::fs::create_dir_all(dest).map_err(|e| CloneError::IoError {
            path: dest.to_path_buf(),
            error: e.to_string(),
        })?;

        // Strip the archive's single top-level directory while unpacking
        let spec = CommandSpec::new("tar", dest)
            .arg("-xzf")
            .arg(&archive.to_string_lossy())
            .arg("--strip-components=1")
            .envs(self.config.base_env.clone());
        let out = process::run(&spec, self.config.timeout, cancel)
            .await
            .map_err(|e| CloneError::UnpackFailed {
                module: module.name.clone(),
                error: e.to_string(),
            })?;
        if !out.success() {
            return Err(CloneError::UnpackFailed {
                module: module.name.clone(),
                error: out.tail().to_string(),
            });
        }

        git::write_stamp(dest, &module.version)?;
        Ok(PreparedModule {
            refreshed: true,
            commit: None,
        })
    }

    /// Apply injections and macros for one module.
    ///
    /// Injection fragments whose resolved target lies under this module
    /// are applied; macros rewrite the module's build-configuration
    /// directory. Patch problems never fail a module, they land in the
    /// summary as warnings.
    pub fn configure(&self, module: &Module, table: &ModuleTable) -> ConfigureSummary {
        let mut summary = ConfigureSummary::default();
        let module_root = module.abs_path(&self.config.install_root);

        for injection in self.injections.iter() {
            let Some(target) =
                inject::resolve_target(&injection.target, table, &self.config.install_root)
            else {
                summary.warnings.push(format!(
                    "Injection '{}' targets an unknown module: {}",
                    injection.name, injection.target
                ));
                continue;
            };
            if !target.starts_with(&module_root) {
                continue;
            }
            match inject::apply_injection(injection, &target) {
                Ok(()) => summary.injections_applied += 1,
                Err(e) => summary
                    .warnings
                    .push(format!("Injection '{}' failed: {e}", injection.name)),
            }
        }

        if !self.macros.is_empty() {
            let configure_dir = module_root.join(defaults::MODULE_CONFIGURE_DIR);
            let mut matched = std::collections::HashSet::new();
            match self.macros.apply_to_dir(&configure_dir, &mut matched) {
                Ok(count) => {
                    summary.macros_replaced = count;
                    for (key, _) in self.macros.iter() {
                        if !matched.contains(key) {
                            summary.warnings.push(format!(
                                "Macro '{key}' matched no assignment under '{}'",
                                configure_dir.display()
                            ));
                        }
                    }
                }
                Err(e) => summary.warnings.push(format!("Macro substitution failed: {e}")),
            }
        }

        summary
    }

    /// Build one module.
    ///
    /// A custom script takes over the whole build when registered;
    /// otherwise the default build tool runs silently with the
    /// configured parallelism. Output goes to a per-module log file and
    /// the tail is attached to any failure.
    pub async fn build(
        &self,
        module: &Module,
        cancel: &CancelFlag,
    ) -> Result<BuildOutput, BuildFailure> {
        let spec = self.build_spec(module);
        tracing::info!("Building '{}': {}", module.name, spec.display());

        let out = match process::run(&spec, self.config.timeout, cancel).await {
            Ok(out) => out,
            Err(e) => {
                return Err(BuildFailure {
                    error: BuildError::SpawnFailed {
                        module: module.name.clone(),
                        error: e.to_string(),
                    },
                    output_tail: None,
                    log_file: None,
                    duration: Duration::ZERO,
                })
            }
        };

        let log_file = self.config.logs_dir().join(format!("{}.log", module.name));
        if let Some(parent) = log_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&log_file, &out.output) {
            tracing::warn!("Failed to write build log '{}': {e}", log_file.display());
        }

        let error = match out.outcome {
            RunOutcome::Exited(0) => {
                return Ok(BuildOutput {
                    duration: out.duration,
                    log_file,
                })
            }
            RunOutcome::Exited(status) => BuildError::ExitStatus {
                module: module.name.clone(),
                status,
            },
            RunOutcome::TimedOut => BuildError::Timeout {
                module: module.name.clone(),
                seconds: self.config.timeout.map(|t| t.as_secs()).unwrap_or(0),
            },
            RunOutcome::Cancelled => BuildError::Cancelled {
                module: module.name.clone(),
            },
        };
        Err(BuildFailure {
            error,
            output_tail: Some(out.tail().to_string()),
            log_file: Some(log_file),
            duration: out.duration,
        })
    }

    /// Assemble the build command for a module.
    ///
    /// The environment is the run's base environment, the module's own
    /// overrides, then the values every build can rely on.
    pub fn build_spec(&self, module: &Module) -> CommandSpec {
        let cwd = module.abs_path(&self.config.install_root);
        let mut spec = match &module.script_path {
            Some(script) => CommandSpec::new("bash", &cwd).arg(&script.to_string_lossy()),
            None => CommandSpec::new("make", &cwd)
                .arg(&format!("{}{}", defaults::MAKE_FLAG_PREFIX, self.config.jobs)),
        };

        spec = spec.envs(self.config.base_env.clone());
        spec = spec.envs(module.env.clone());
        spec = spec.envs([
            (
                defaults::INSTALL_PATH_MACRO.to_string(),
                self.config.install_root.to_string_lossy().into_owned(),
            ),
            ("MODULE_NAME".to_string(), module.name.clone()),
            ("MODULE_VERSION".to_string(), module.version.clone()),
            ("MODULE_PATH".to_string(), cwd.to_string_lossy().into_owned()),
            ("JOBS".to_string(), self.config.jobs.to_string()),
        ]);
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictPolicy;
    use crate::core::inject::Injection;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn module(name: &str, install_path: &str) -> Module {
        Module {
            name: name.to_string(),
            version: "1.0".to_string(),
            url: format!("https://example.com/{name}"),
            source: SourceKind::Git,
            install_path: install_path.to_string(),
            clone: true,
            build: true,
            package: true,
            depends: Vec::new(),
            script: None,
            critical: None,
            sha256: None,
            env: HashMap::new(),
            script_path: None,
        }
    }

    fn driver(install_root: &std::path::Path) -> ModuleDriver {
        ModuleDriver::new(
            RunConfig::new(install_root.to_path_buf()).with_jobs(4),
            InjectionSet::default(),
            MacroSet::default(),
        )
    }

    #[tokio::test]
    async fn test_prepare_clone_disabled_verifies_sources() {
        let dir = TempDir::new().unwrap();
        let mut m = module("core", "core");
        m.clone = false;

        let d = driver(dir.path());
        let err = d.prepare(&m, &CancelFlag::new()).await.unwrap_err();
        assert!(matches!(err, CloneError::SourcesMissing { .. }));

        std::fs::create_dir_all(dir.path().join("core")).unwrap();
        std::fs::write(dir.path().join("core/Makefile"), "all:\n").unwrap();
        let prepared = d.prepare(&m, &CancelFlag::new()).await.unwrap();
        assert!(!prepared.refreshed);
    }

    #[tokio::test]
    async fn test_prepare_archive_reuses_stamped_checkout() {
        let dir = TempDir::new().unwrap();
        let mut m = module("seq", "support/seq");
        m.source = SourceKind::Archive;
        m.url = "https://unreachable.invalid/seq.tar.gz".to_string();

        let dest = dir.path().join("support/seq");
        std::fs::create_dir_all(&dest).unwrap();
        git::write_stamp(&dest, "1.0").unwrap();

        let prepared = driver(dir.path())
            .prepare(&m, &CancelFlag::new())
            .await
            .unwrap();
        assert!(!prepared.refreshed);
    }

    #[tokio::test]
    async fn test_prepare_archive_foreign_directory_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let mut m = module("seq", "support/seq");
        m.source = SourceKind::Archive;
        m.url = "https://unreachable.invalid/seq.tar.gz".to_string();

        let dest = dir.path().join("support/seq");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("precious.txt"), "user data").unwrap();

        for policy in [ConflictPolicy::Overwrite, ConflictPolicy::Abort] {
            let d = ModuleDriver::new(
                RunConfig::new(dir.path().to_path_buf()).with_conflict_policy(policy),
                InjectionSet::default(),
                MacroSet::default(),
            );
            let err = d.prepare(&m, &CancelFlag::new()).await.unwrap_err();
            assert!(matches!(err, CloneError::DestinationConflict { .. }));
            assert!(dest.join("precious.txt").exists());
        }
    }

    #[tokio::test]
    async fn test_prepare_archive_stale_stamp_with_abort_policy() {
        let dir = TempDir::new().unwrap();
        let mut m = module("seq", "support/seq");
        m.source = SourceKind::Archive;
        m.url = "https://unreachable.invalid/seq.tar.gz".to_string();

        let dest = dir.path().join("support/seq");
        std::fs::create_dir_all(&dest).unwrap();
        git::write_stamp(&dest, "0.9").unwrap();

        let d = ModuleDriver::new(
            RunConfig::new(dir.path().to_path_buf()).with_conflict_policy(ConflictPolicy::Abort),
            InjectionSet::default(),
            MacroSet::default(),
        );
        let err = d.prepare(&m, &CancelFlag::new()).await.unwrap_err();
        assert!(matches!(
            err,
            CloneError::VersionConflict { expected, found, .. }
                if expected == "1.0" && found == "0.9"
        ));
    }

    #[test]
    fn test_default_build_spec_uses_make() {
        let dir = TempDir::new().unwrap();
        let spec = driver(dir.path()).build_spec(&module("core", "core"));
        assert_eq!(spec.program, "make");
        assert_eq!(spec.args, vec!["-sj4"]);
        assert_eq!(spec.cwd, dir.path().join("core"));
    }

    #[test]
    fn test_custom_script_build_spec_uses_bash() {
        let dir = TempDir::new().unwrap();
        let mut m = module("core", "core");
        m.script_path = Some(dir.path().join("scripts/core.sh"));
        let spec = driver(dir.path()).build_spec(&m);
        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args.len(), 1);
        assert!(spec.args[0].ends_with("core.sh"));
    }

    #[test]
    fn test_build_spec_env_layering() {
        let dir = TempDir::new().unwrap();
        let mut m = module("core", "core");
        m.env.insert("EPICS_HOST_ARCH".to_string(), "linux-x86_64".to_string());
        let spec = driver(dir.path()).build_spec(&m);

        let lookup = |key: &str| {
            spec.env
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(lookup("EPICS_HOST_ARCH").as_deref(), Some("linux-x86_64"));
        assert_eq!(lookup("MODULE_NAME").as_deref(), Some("core"));
        assert_eq!(lookup("JOBS").as_deref(), Some("4"));
        assert_eq!(
            lookup("INSTALL"),
            Some(dir.path().to_string_lossy().into_owned())
        );
    }

    #[tokio::test]
    async fn test_build_with_custom_script_success_and_log() {
        let dir = TempDir::new().unwrap();
        let module_dir = dir.path().join("core");
        std::fs::create_dir_all(&module_dir).unwrap();
        let script = dir.path().join("core.sh");
        std::fs::write(&script, "#!/bin/bash\necho built $MODULE_NAME\n").unwrap();

        let mut m = module("core", "core");
        m.script_path = Some(script);
        let out = driver(dir.path())
            .build(&m, &CancelFlag::new())
            .await
            .unwrap();

        let log = std::fs::read_to_string(&out.log_file).unwrap();
        assert!(log.contains("built core"));
    }

    #[tokio::test]
    async fn test_build_failure_reports_exit_status() {
        let dir = TempDir::new().unwrap();
        let module_dir = dir.path().join("core");
        std::fs::create_dir_all(&module_dir).unwrap();
        let script = dir.path().join("core.sh");
        std::fs::write(&script, "#!/bin/bash\necho broken >&2\nexit 3\n").unwrap();

        let mut m = module("core", "core");
        m.script_path = Some(script);
        let failure = driver(dir.path())
            .build(&m, &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            BuildError::ExitStatus { ref module, status } if module == "core" && status == 3
        ));
        assert!(failure.output_tail.unwrap().contains("broken"));
        assert!(failure.log_file.unwrap().exists());
    }

    #[tokio::test]
    async fn test_build_timeout() {
        let dir = TempDir::new().unwrap();
        let module_dir = dir.path().join("core");
        std::fs::create_dir_all(&module_dir).unwrap();
        let script = dir.path().join("core.sh");
        std::fs::write(&script, "#!/bin/bash\nsleep 30\n").unwrap();

        let mut m = module("core", "core");
        m.script_path = Some(script);
        let config = RunConfig::new(dir.path().to_path_buf())
            .with_timeout(Some(Duration::from_millis(200)));
        let d = ModuleDriver::new(config, InjectionSet::default(), MacroSet::default());
        let failure = d.build(&m, &CancelFlag::new()).await.unwrap_err();
        assert!(matches!(failure.error, BuildError::Timeout { .. }));
    }

    #[test]
    fn test_configure_applies_macros_and_module_injections() {
        let dir = TempDir::new().unwrap();
        let m = module("core", "core");
        let configure_dir = dir.path().join("core/configure");
        std::fs::create_dir_all(&configure_dir).unwrap();
        std::fs::write(configure_dir.join("RELEASE"), "OPT=-O0\n").unwrap();
        std::fs::write(dir.path().join("core/plugins.cmd"), "start\n").unwrap();

        let table = ModuleTable {
            modules: vec![m.clone()],
            ..ModuleTable::default()
        };
        let injections = vec![Injection {
            name: "PLUGINS".to_string(),
            target: "$(core)/plugins.cmd".to_string(),
            contents: "loadPlugin(\"pva\")\n".to_string(),
        }];
        let d = ModuleDriver::new(
            RunConfig::new(dir.path().to_path_buf()),
            InjectionSet::from_injections(injections),
            MacroSet::from_pairs(vec![("OPT".to_string(), "-O2".to_string())]),
        );

        let summary = d.configure(&m, &table);
        assert_eq!(summary.injections_applied, 1);
        assert_eq!(summary.macros_replaced, 1);
        assert!(summary.warnings.is_empty());
        assert!(std::fs::read_to_string(configure_dir.join("RELEASE"))
            .unwrap()
            .contains("OPT=-O2"));
        assert!(std::fs::read_to_string(dir.path().join("core/plugins.cmd"))
            .unwrap()
            .contains("loadPlugin"));
    }

    #[test]
    fn test_configure_unmatched_macro_key_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let m = module("core", "core");
        let configure_dir = dir.path().join("core/configure");
        std::fs::create_dir_all(&configure_dir).unwrap();
        std::fs::write(configure_dir.join("RELEASE"), "OPT=-O0\n").unwrap();

        let table = ModuleTable {
            modules: vec![m.clone()],
            ..ModuleTable::default()
        };
        let d = ModuleDriver::new(
            RunConfig::new(dir.path().to_path_buf()),
            InjectionSet::default(),
            MacroSet::from_pairs(vec![
                ("OPT".to_string(), "-O2".to_string()),
                ("NO_SUCH_KEY".to_string(), "x".to_string()),
            ]),
        );

        let summary = d.configure(&m, &table);
        assert_eq!(summary.macros_replaced, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("NO_SUCH_KEY"));
    }

    #[test]
    fn test_configure_missing_target_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let m = module("core", "core");
        std::fs::create_dir_all(dir.path().join("core")).unwrap();

        let table = ModuleTable {
            modules: vec![m.clone()],
            ..ModuleTable::default()
        };
        let injections = vec![Injection {
            name: "MISSING".to_string(),
            target: "$(core)/no/such/file.cmd".to_string(),
            contents: "x\n".to_string(),
        }];
        let d = ModuleDriver::new(
            RunConfig::new(dir.path().to_path_buf()),
            InjectionSet::from_injections(injections),
            MacroSet::default(),
        );

        let summary = d.configure(&m, &table);
        assert_eq!(summary.injections_applied, 0);
        assert_eq!(summary.warnings.len(), 1);
    }
}
