//! Run report
//!
//! Every run produces one report: a per-module record of what happened,
//! persisted as JSON under the install root's state directory so the
//! outcome survives the process.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Terminal state of one module in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Not yet processed (only seen in an interrupted run's report)
    Pending,
    /// Built and installed
    Succeeded,
    /// Clone, configure or build failed
    Failed,
    /// Not attempted because a dependency failed or the run was halted
    Skipped,
}

impl ModuleState {
    /// Single-word label used in log lines and the summary table
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Per-module outcome record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module name
    pub name: String,
    /// Terminal state
    pub state: ModuleState,
    /// Wall-clock seconds spent on this module
    #[serde(default)]
    pub duration_secs: f64,
    /// Failure description, present only for failed modules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal problems encountered while processing the module
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Tail of the captured build output, present only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tail: Option<String>,
    /// Full build log location, when one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl ModuleRecord {
    /// A fresh pending record
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ModuleState::Pending,
            duration_secs: 0.0,
            error: None,
            warnings: Vec::new(),
            output_tail: None,
            log_file: None,
        }
    }

    /// Mark succeeded with the elapsed time
    pub fn succeed(&mut self, elapsed: Duration) {
        self.state = ModuleState::Succeeded;
        self.duration_secs = elapsed.as_secs_f64();
    }

    /// Mark failed with a description and the elapsed time
    pub fn fail(&mut self, error: String, elapsed: Duration) {
        self.state = ModuleState::Failed;
        self.error = Some(error);
        self.duration_secs = elapsed.as_secs_f64();
    }

    /// Mark skipped with the reason recorded as a warning
    pub fn skip(&mut self, reason: String) {
        self.state = ModuleState::Skipped;
        self.warnings.push(reason);
    }
}

/// The whole-run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unix timestamp the run started
    pub started_at: u64,
    /// Unix timestamp the run finished; zero while in flight
    #[serde(default)]
    pub finished_at: u64,
    /// Assembled bundle location, when packaging ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<PathBuf>,
    /// Per-module records in plan order
    pub modules: Vec<ModuleRecord>,
}

impl RunReport {
    /// Start a report covering the given plan order
    pub fn begin(order: &[String]) -> Self {
        Self {
            started_at: unix_now(),
            finished_at: 0,
            bundle: None,
            modules: order.iter().map(|n| ModuleRecord::pending(n)).collect(),
        }
    }

    /// Record the finish time
    pub fn finish(&mut self) {
        self.finished_at = unix_now();
    }

    /// Mutable access to a module's record
    pub fn record_mut(&mut self, name: &str) -> Option<&mut ModuleRecord> {
        self.modules.iter_mut().find(|r| r.name == name)
    }

    /// Read access to a module's record
    pub fn record(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules.iter().find(|r| r.name == name)
    }

    /// Names of modules in a given state, in plan order
    pub fn in_state(&self, state: ModuleState) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|r| r.state == state)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Whether every processed module succeeded
    pub fn all_succeeded(&self) -> bool {
        self.modules
            .iter()
            .all(|r| r.state == ModuleState::Succeeded)
    }

    /// Count of modules in a given state
    pub fn count(&self, state: ModuleState) -> usize {
        self.modules.iter().filter(|r| r.state == state).count()
    }

    /// Persist the report as pretty JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load a previously persisted report
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn order() -> Vec<String> {
        vec!["base".to_string(), "core".to_string(), "app".to_string()]
    }

    #[test]
    fn test_begin_creates_pending_records_in_plan_order() {
        let report = RunReport::begin(&order());
        assert_eq!(report.modules.len(), 3);
        assert!(report
            .modules
            .iter()
            .all(|r| r.state == ModuleState::Pending));
        assert_eq!(report.modules[0].name, "base");
        assert_eq!(report.modules[2].name, "app");
    }

    #[test]
    fn test_state_transitions() {
        let mut report = RunReport::begin(&order());
        report
            .record_mut("base")
            .unwrap()
            .succeed(Duration::from_secs(3));
        report
            .record_mut("core")
            .unwrap()
            .fail("make exited 2".to_string(), Duration::from_secs(1));
        report
            .record_mut("app")
            .unwrap()
            .skip("dependency 'core' failed".to_string());

        assert_eq!(report.count(ModuleState::Succeeded), 1);
        assert_eq!(report.count(ModuleState::Failed), 1);
        assert_eq!(report.in_state(ModuleState::Skipped), vec!["app"]);
        assert!(!report.all_succeeded());
        assert_eq!(
            report.record("core").unwrap().error.as_deref(),
            Some("make exited 2")
        );
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".modforge/report.json");

        let mut report = RunReport::begin(&order());
        report
            .record_mut("base")
            .unwrap()
            .succeed(Duration::from_millis(1500));
        report.bundle = Some(PathBuf::from("/stage/bundle"));
        report.finish();
        report.save(&path).unwrap();

        let loaded = RunReport::load(&path).unwrap();
        assert_eq!(loaded.modules.len(), 3);
        assert_eq!(loaded.record("base").unwrap().state, ModuleState::Succeeded);
        assert_eq!(loaded.bundle, Some(PathBuf::from("/stage/bundle")));
        assert!(loaded.finished_at >= loaded.started_at);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ModuleState::Succeeded.label(), "ok");
        assert_eq!(ModuleState::Skipped.label(), "skipped");
    }
}
