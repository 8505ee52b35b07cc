//! Build command implementation
//!
//! Implements `modforge build`: loads the configuration store, resolves
//! the plan, drives the orchestrator over it and assembles the bundle.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::output;
use crate::config::{ConflictPolicy, RunConfig};
use crate::core::driver::ModuleDriver;
use crate::core::inject::{InjectionSet, MacroSet};
use crate::core::orchestrator::Orchestrator;
use crate::core::packager::{BundleLayout, Packager};
use crate::core::resolver;
use crate::core::table::ModuleTable;
use crate::error::ModforgeError;
use crate::infra::process::{self, CancelFlag, CommandSpec};
use crate::infra::toolcheck;

/// Build options
#[derive(Debug)]
pub struct BuildOptions {
    /// Configuration directory
    pub config: PathBuf,
    /// Install root override
    pub install_root: Option<PathBuf>,
    /// Bundle layout
    pub layout: BundleLayout,
    /// Treat every failure as critical
    pub strict: bool,
    /// Parallel job count
    pub jobs: Option<usize>,
    /// Per-invocation timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Checkout conflict policy
    pub on_conflict: ConflictPolicy,
    /// Dependency-installer script
    pub dep_script: Option<PathBuf>,
    /// Skip bundle assembly
    pub no_package: bool,
}

/// Execute the build command
pub async fn execute(options: BuildOptions) -> Result<i32> {
    let table = ModuleTable::load(&options.config).map_err(ModforgeError::from)?;

    let problems = table.validate();
    if !problems.is_empty() {
        return Err(ModforgeError::Validation(problems).into());
    }

    let plan = resolver::resolve(&table).map_err(ModforgeError::from)?;
    if plan.is_empty() {
        println!("Nothing to build: no build-enabled modules in the table");
        return Ok(0);
    }

    let install_root = options
        .install_root
        .clone()
        .or_else(|| table.install_root.clone())
        .ok_or(ModforgeError::Config(
            crate::error::ConfigError::MissingInstallRoot,
        ))?;
    std::fs::create_dir_all(&install_root)
        .with_context(|| format!("Failed to create install root '{}'", install_root.display()))?;

    for tool in toolcheck::check_required_tools() {
        tracing::warn!("Required tool '{}' not found on PATH", tool.name);
    }

    let mut run_config = RunConfig::new(install_root.clone())
        .with_strict(options.strict)
        .with_conflict_policy(options.on_conflict)
        .with_timeout(options.timeout_secs.map(Duration::from_secs));
    if let Some(jobs) = options.jobs {
        run_config = run_config.with_jobs(jobs);
    }

    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current module then stopping");
            ctrl_c_flag.set();
        }
    });

    if let Some(script) = &options.dep_script {
        run_dep_script(script, &run_config, &cancel).await;
    }

    let injections = load_or_warn(InjectionSet::load(&options.config), "injections");
    let macros = load_or_warn(MacroSet::load(&options.config), "macros");

    tracing::info!(
        "Building {} modules into '{}' with {} jobs",
        plan.len(),
        install_root.display(),
        run_config.jobs
    );

    let report_path = run_config.report_path();
    let driver = ModuleDriver::new(run_config, injections, macros);
    let orchestrator = Orchestrator::new(driver, options.strict);

    let spinner = output::create_spinner(&format!("Building {} modules", plan.len()));
    let mut report = orchestrator.run(&table, &plan, &cancel).await;
    spinner.finish_and_clear();

    if !options.no_package {
        let packager = Packager::new(&install_root);
        match packager.package(&table, &report, options.layout) {
            Ok(bundle) => {
                println!(
                    "Bundle '{}' assembled at {} ({} modules)",
                    bundle.name,
                    bundle.path.display(),
                    bundle.modules.len()
                );
                report.bundle = Some(bundle.path);
            }
            Err(crate::error::PackageError::NothingToPackage) => {
                tracing::warn!("No successfully built modules, skipping bundle assembly");
            }
            Err(e) => {
                report
                    .save(&report_path)
                    .with_context(|| format!("Failed to write report to '{}'", report_path.display()))?;
                return Err(ModforgeError::from(e).into());
            }
        }
    }

    report
        .save(&report_path)
        .with_context(|| format!("Failed to write report to '{}'", report_path.display()))?;

    output::display_summary(&report);
    println!("Report written to {}", report_path.display());

    Ok(i32::from(!report.all_succeeded()))
}

/// Run the dependency-installer script once, fire-and-forget.
///
/// Its exit status is logged and never fails the run.
async fn run_dep_script(script: &Path, run_config: &RunConfig, cancel: &CancelFlag) {
    tracing::info!("Running dependency script '{}'", script.display());
    let spec = CommandSpec::new("bash", &run_config.install_root)
        .arg(&script.to_string_lossy())
        .envs(run_config.base_env.clone());
    match process::run(&spec, run_config.timeout, cancel).await {
        Ok(out) if out.success() => {}
        Ok(out) => tracing::warn!(
            "Dependency script exited with {:?}: {}",
            out.outcome,
            out.tail()
        ),
        Err(e) => tracing::warn!("Dependency script failed to start: {e}"),
    }
}

fn load_or_warn<T: Default>(result: Result<T, crate::error::PatchError>, what: &str) -> T {
    match result {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!("Failed to load {what}: {e}");
            T::default()
        }
    }
}
