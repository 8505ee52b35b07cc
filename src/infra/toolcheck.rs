//! Preflight checks for external tools

use crate::config::defaults;

/// A missing external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    /// Tool name as looked up on PATH
    pub name: String,
}

/// Check that every tool a full run needs is on PATH.
///
/// Returns the missing tools; an empty list means the run can proceed.
pub fn check_required_tools() -> Vec<MissingTool> {
    defaults::REQUIRED_TOOLS
        .iter()
        .filter(|tool| which::which(tool).is_err())
        .map(|tool| MissingTool {
            name: (*tool).to_string(),
        })
        .collect()
}

/// Whether a single tool is available on PATH
pub fn tool_available(name: &str) -> bool {
    which::which(name).is_ok()
}
