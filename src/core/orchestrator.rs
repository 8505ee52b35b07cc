//! Build orchestration
//!
//! Walks the build plan in order, driving each module through prepare,
//! configure and build, and records every outcome in the run report.
//! Failure handling is graph-aware: a failed module takes its dependent
//! subtree down as skips, and a critical failure halts the rest of the
//! run outright.

use std::collections::HashSet;
use std::time::Instant;

use crate::core::driver::{BuildFailure, BuildOutput, ConfigureSummary, PreparedModule};
use crate::core::report::RunReport;
use crate::core::resolver::BuildPlan;
use crate::core::table::{Module, ModuleTable};
use crate::error::CloneError;
use crate::infra::process::CancelFlag;

pub use crate::core::driver::ModuleDriver;

/// The module-level operations the orchestrator sequences.
///
/// [`ModuleDriver`] is the production implementation; tests substitute
/// a recording fake to observe exactly which modules get processed.
/// The futures are awaited in place, so no `Send` bound is required.
#[allow(async_fn_in_trait)]
pub trait ModuleRunner {
    /// Ensure sources are on disk
    async fn prepare(
        &self,
        module: &Module,
        cancel: &CancelFlag,
    ) -> Result<PreparedModule, CloneError>;

    /// Apply injections and macros
    fn configure(&self, module: &Module, table: &ModuleTable) -> ConfigureSummary;

    /// Invoke the build
    async fn build(&self, module: &Module, cancel: &CancelFlag)
        -> Result<BuildOutput, BuildFailure>;
}

impl ModuleRunner for ModuleDriver {
    async fn prepare(
        &self,
        module: &Module,
        cancel: &CancelFlag,
    ) -> Result<PreparedModule, CloneError> {
        ModuleDriver::prepare(self, module, cancel).await
    }

    fn configure(&self, module: &Module, table: &ModuleTable) -> ConfigureSummary {
        ModuleDriver::configure(self, module, table)
    }

    async fn build(
        &self,
        module: &Module,
        cancel: &CancelFlag,
    ) -> Result<BuildOutput, BuildFailure> {
        ModuleDriver::build(self, module, cancel).await
    }
}

/// Whether a failure of this module must halt the whole run.
///
/// An explicit `critical` flag wins. Otherwise a module is critical
/// exactly when some build-enabled module depends on it: breaking a
/// dependency poisons everything downstream, while a leaf failure only
/// costs that one module. Strict mode makes every module critical.
pub fn is_critical(table: &ModuleTable, module: &Module, strict: bool) -> bool {
    if strict {
        return true;
    }
    if let Some(explicit) = module.critical {
        return explicit;
    }
    table
        .modules
        .iter()
        .filter(|m| m.build)
        .any(|m| m.depends.iter().any(|d| d == &module.name))
}

/// Sequences one run over a resolved plan
#[derive(Debug)]
pub struct Orchestrator<R> {
    runner: R,
    strict: bool,
}

impl<R: ModuleRunner> Orchestrator<R> {
    /// Create an orchestrator over a runner
    pub fn new(runner: R, strict: bool) -> Self {
        Self { runner, strict }
    }

    /// Process every module in plan order and return the report.
    ///
    /// Modules whose dependencies did not build are skipped, never
    /// attempted. After a critical failure, or once cancellation is
    /// requested, every remaining module is skipped and the report still
    /// accounts for all of them.
    pub async fn run(
        &self,
        table: &ModuleTable,
        plan: &BuildPlan,
        cancel: &CancelFlag,
    ) -> RunReport {
        let mut report = RunReport::begin(plan.order());
        let mut unbuilt: HashSet<&str> = HashSet::new();
        let mut halted_by: Option<String> = None;

        for name in plan.order() {
            let Some(module) = table.get(name) else {
                // Plan entries always come from the table
                continue;
            };
            let record = match report.record_mut(name) {
                Some(record) => record,
                None => continue,
            };

            if let Some(culprit) = &halted_by {
                record.skip(format!("Run halted after critical failure of '{culprit}'"));
                unbuilt.insert(name.as_str());
                continue;
            }
            if cancel.is_set() {
                record.skip("Cancelled".to_string());
                unbuilt.insert(name.as_str());
                continue;
            }
            if let Some(dep) = module.depends.iter().find(|d| unbuilt.contains(d.as_str())) {
                record.skip(format!("Dependency '{dep}' did not build"));
                unbuilt.insert(name.as_str());
                tracing::warn!("Skipping '{name}': dependency '{dep}' did not build");
                continue;
            }

            let started = Instant::now();

            match self.runner.prepare(module, cancel).await {
                Ok(prepared) => {
                    if prepared.refreshed {
                        tracing::info!("Fetched sources for '{name}'");
                    }
                }
                Err(e) => {
                    record.fail(e.to_string(), started.elapsed());
                    unbuilt.insert(name.as_str());
                    if is_critical(table, module, self.strict) {
                        halted_by = Some(name.clone());
                    }
                    continue;
                }
            }

            let summary = self.runner.configure(module, table);
            for warning in &summary.warnings {
                tracing::warn!("Module '{name}': {warning}");
            }
            record.warnings.extend(summary.warnings);

            match self.runner.build(module, cancel).await {
                Ok(output) => {
                    record.log_file = Some(output.log_file);
                    record.succeed(started.elapsed());
                    tracing::info!("Module '{name}' built in {:.1}s", output.duration.as_secs_f64());
                }
                Err(failure) => {
                    record.output_tail = failure.output_tail;
                    record.log_file = failure.log_file;
                    record.fail(failure.error.to_string(), started.elapsed());
                    unbuilt.insert(name.as_str());
                    tracing::error!("Module '{name}' failed: {}", failure.error);
                    if is_critical(table, module, self.strict) {
                        halted_by = Some(name.clone());
                    }
                }
            }
        }

        report.finish();
        report
    }
}
