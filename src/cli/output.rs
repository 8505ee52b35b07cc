//! Output formatting and progress indicators
//!
//! Utilities for displaying progress, the end-of-run module summary and
//! formatted messages to the user.

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::report::{ModuleState, RunReport};
use crate::error::ModforgeError;

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Skip prefix
    pub const SKIPPED: &str = "−";
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Symbol shown for a module's terminal state
pub fn state_symbol(state: ModuleState) -> &'static str {
    match state {
        ModuleState::Succeeded => status::SUCCESS,
        ModuleState::Failed => status::ERROR,
        ModuleState::Skipped => status::SKIPPED,
        ModuleState::Pending => status::WARNING,
    }
}

/// Render the end-of-run summary to a string.
///
/// One line per module in plan order, failure tails appended at the
/// bottom so the table stays scannable.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("Build summary:\n");
    for record in &report.modules {
        out.push_str(&format!(
            "  {} {:<24} {:<8} {:>7.1}s\n",
            state_symbol(record.state),
            record.name,
            record.state.label(),
            record.duration_secs,
        ));
        for warning in &record.warnings {
            out.push_str(&format!("      {} {warning}\n", status::WARNING));
        }
    }

    let failed = report.count(ModuleState::Failed);
    let skipped = report.count(ModuleState::Skipped);
    out.push_str(&format!(
        "  {} succeeded, {failed} failed, {skipped} skipped\n",
        report.count(ModuleState::Succeeded),
    ));

    for record in report.modules.iter().filter(|r| r.state == ModuleState::Failed) {
        if let Some(error) = &record.error {
            out.push_str(&format!("\n{} {}: {error}\n", status::ERROR, record.name));
        }
        if let Some(tail) = &record.output_tail {
            let trimmed = tail.trim_end();
            if !trimmed.is_empty() {
                out.push_str(&format!("--- output tail ---\n{trimmed}\n"));
            }
        }
        if let Some(log) = &record.log_file {
            out.push_str(&format!("    full log: {}\n", log.display()));
        }
    }
    out
}

/// Print the end-of-run summary
pub fn display_summary(report: &RunReport) {
    print!("{}", render_summary(report));
}

/// Display an error to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Map an error to the process exit code.
///
/// Configuration problems (bad store, invalid table, unresolvable
/// graph) are distinguishable from build failures by exit code.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ModforgeError>() {
        Some(
            ModforgeError::Config(_) | ModforgeError::Validation(_) | ModforgeError::Resolver(_),
        ) => 2,
        _ => 1,
    }
}
