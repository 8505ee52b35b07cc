//! Common test utilities and helpers
//!
//! Builds throwaway configuration stores and pre-seeded install roots
//! so CLI flows run fully offline: modules are clone-disabled and built
//! by custom scripts.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test project context holding a config store and an install root
pub struct TestProject {
    /// Temporary directory backing the whole project
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        std::fs::create_dir_all(project.config_dir()).expect("Failed to create config dir");
        std::fs::create_dir_all(project.install_root()).expect("Failed to create install root");
        project
    }

    /// Configuration store directory
    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    /// Install root directory
    pub fn install_root(&self) -> PathBuf {
        self.dir.path().join("stage")
    }

    /// Write the module table
    pub fn write_table(&self, content: &str) {
        std::fs::write(self.config_dir().join("modules.toml"), content)
            .expect("Failed to write module table");
    }

    /// Register a custom build script for a module
    pub fn add_script(&self, module: &str, body: &str) {
        let scripts = self.config_dir().join("scripts");
        std::fs::create_dir_all(&scripts).expect("Failed to create scripts dir");
        std::fs::write(scripts.join(format!("{module}.sh")), body)
            .expect("Failed to write script");
    }

    /// Add an injection fragment file
    pub fn add_injection(&self, name: &str, target: &str, body: &str) {
        let injections = self.config_dir().join("injections");
        std::fs::create_dir_all(&injections).expect("Failed to create injections dir");
        std::fs::write(
            injections.join(name),
            format!("__TARGET__={target}\n{body}"),
        )
        .expect("Failed to write injection");
    }

    /// Add a macro file
    pub fn add_macro_file(&self, name: &str, body: &str) {
        let macros = self.config_dir().join("macros");
        std::fs::create_dir_all(&macros).expect("Failed to create macros dir");
        std::fs::write(macros.join(name), body).expect("Failed to write macro file");
    }

    /// Seed a clone-disabled module's sources under the install root
    pub fn seed_module(&self, install_path: &str) {
        let dir = self.install_root().join(install_path);
        std::fs::create_dir_all(&dir).expect("Failed to create module dir");
        std::fs::write(dir.join("README"), "seeded sources\n").expect("Failed to seed module");
    }

    /// Read a file relative to the install root
    pub fn read_staged(&self, rel: &str) -> String {
        std::fs::read_to_string(self.install_root().join(rel)).expect("Failed to read file")
    }

    /// Whether a path relative to the install root exists
    pub fn staged_exists(&self, rel: &str) -> bool {
        self.install_root().join(rel).exists()
    }

    /// Run `modforge build` against this project with extra args
    pub fn run_build(&self, extra: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_modforge"));
        cmd.arg("build")
            .arg("--config")
            .arg(self.config_dir())
            .arg("--install-root")
            .arg(self.install_root());
        for arg in extra {
            cmd.arg(arg);
        }
        cmd.output().expect("Failed to execute modforge build")
    }

    /// Run `modforge validate` against this project
    pub fn run_validate(&self) -> Output {
        Command::new(env!("CARGO_BIN_EXE_modforge"))
            .arg("validate")
            .arg("--config")
            .arg(self.config_dir())
            .output()
            .expect("Failed to execute modforge validate")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A three-module offline table: base <- mid <- top, built by scripts
#[allow(dead_code)]
pub const CHAIN_TABLE: &str = r#"
[[module]]
name = "base"
version = "1.0"
url = "https://example.com/base"
install_path = "base"
clone = false

[[module]]
name = "mid"
version = "1.0"
url = "https://example.com/mid"
install_path = "support/mid"
clone = false
depends = ["base"]

[[module]]
name = "top"
version = "1.0"
url = "https://example.com/top"
install_path = "support/top"
clone = false
depends = ["mid"]
"#;
