//! Default values and well-known names used across modforge

/// Module table file name inside the configuration directory
pub const MODULE_TABLE_FILE: &str = "modules.toml";

/// Directory of injection fragment files inside the configuration directory
pub const INJECTIONS_DIR: &str = "injections";

/// Directory of macro key/value files inside the configuration directory
pub const MACROS_DIR: &str = "macros";

/// Directory of per-module custom build scripts inside the configuration directory
pub const SCRIPTS_DIR: &str = "scripts";

/// State directory created under the install root
pub const STATE_DIR: &str = ".modforge";

/// Run report file name inside the state directory
pub const REPORT_FILE: &str = "report.json";

/// Per-module build log directory inside the state directory
pub const LOGS_DIR: &str = "logs";

/// Version stamp file written into unpacked archive checkouts
pub const VERSION_STAMP_FILE: &str = ".modforge-version";

/// Marker line after which injection fragments are inserted.
///
/// When a target file has no marker, fragments are appended at the end.
pub const INJECTION_MARKER: &str = "#<MODFORGE_INJECT>";

/// Path macro expanded to the install root in injection targets
pub const INSTALL_PATH_MACRO: &str = "INSTALL";

/// Subdirectory of a module holding its build-configuration files
pub const MODULE_CONFIGURE_DIR: &str = "configure";

/// Default make flags: silent, parallel (job count appended)
pub const MAKE_FLAG_PREFIX: &str = "-sj";

/// Number of bytes of captured output retained in the run report
pub const OUTPUT_TAIL_BYTES: usize = 4096;

/// Interval at which a running subprocess polls the cancellation flag
pub const CANCEL_POLL_MS: u64 = 100;

/// Maximum download retry attempts for archive sources
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Artifact directories collected by the flat bundle layout, in bundle order
pub const FLAT_ARTIFACT_DIRS: &[&str] = &[
    "bin",
    "lib",
    "db",
    "dbd",
    "include",
    "configure",
    "startup",
    "templates",
];

/// External tools expected on PATH for a full build run
pub const REQUIRED_TOOLS: &[&str] = &["make", "bash", "tar", "git"];
