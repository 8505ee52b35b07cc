//! Configuration constants and run-level settings

pub mod defaults;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// What to do when a checkout destination holds a different version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Remove the existing checkout and fetch the requested version
    #[default]
    Overwrite,
    /// Fail the module with a version-conflict error
    Abort,
}

/// Settings for one build run, assembled from CLI flags and the table.
///
/// The install root is threaded through as an explicit value, never a
/// shared global.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root directory modules are installed under
    pub install_root: PathBuf,
    /// Treat every module failure as critical
    pub strict: bool,
    /// Parallel job count handed to the default build tool
    pub jobs: usize,
    /// Optional timeout applied to each external invocation
    pub timeout: Option<Duration>,
    /// Checkout conflict policy
    pub conflict_policy: ConflictPolicy,
    /// Base environment inherited by every module subprocess
    pub base_env: HashMap<String, String>,
}

impl RunConfig {
    /// Create a run configuration with the orchestrator's own environment
    /// as the subprocess base.
    pub fn new(install_root: PathBuf) -> Self {
        Self {
            install_root,
            strict: false,
            jobs: num_cpus::get(),
            timeout: None,
            conflict_policy: ConflictPolicy::default(),
            base_env: std::env::vars().collect(),
        }
    }

    /// Set strict mode
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the job count
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the per-invocation timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the checkout conflict policy
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// State directory under the install root
    pub fn state_dir(&self) -> PathBuf {
        self.install_root.join(defaults::STATE_DIR)
    }

    /// Per-module log directory
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join(defaults::LOGS_DIR)
    }

    /// Location the run report is persisted to
    pub fn report_path(&self) -> PathBuf {
        self.state_dir().join(defaults::REPORT_FILE)
    }
}
