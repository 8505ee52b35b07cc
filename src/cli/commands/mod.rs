//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod validate;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::ConflictPolicy;
use crate::core::packager::BundleLayout;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone, configure, build and package all modules in dependency order
    Build {
        /// Configuration directory holding modules.toml
        #[arg(short, long)]
        config: PathBuf,

        /// Install root (overrides the table's install_root)
        #[arg(long)]
        install_root: Option<PathBuf>,

        /// Bundle layout
        #[arg(long, value_enum, default_value_t = BundleLayout::Flat)]
        layout: BundleLayout,

        /// Treat every module failure as critical
        #[arg(long)]
        strict: bool,

        /// Number of parallel build jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Timeout in seconds for each external invocation
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// What to do when a checkout holds a different version
        #[arg(long, value_enum, default_value_t = ConflictPolicy::Overwrite)]
        on_conflict: ConflictPolicy,

        /// Dependency-installer script run once before the build
        #[arg(long)]
        dep_script: Option<PathBuf>,

        /// Skip bundle assembly after the build
        #[arg(long)]
        no_package: bool,
    },

    /// Validate the module table and print the build order without building
    Validate {
        /// Configuration directory holding modules.toml
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Commands {
    /// Execute the command, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        match self {
            Self::Build {
                config,
                install_root,
                layout,
                strict,
                jobs,
                timeout_secs,
                on_conflict,
                dep_script,
                no_package,
            } => {
                build::execute(build::BuildOptions {
                    config,
                    install_root,
                    layout,
                    strict,
                    jobs,
                    timeout_secs,
                    on_conflict,
                    dep_script,
                    no_package,
                })
                .await
            }
            Self::Validate { config } => validate::execute(&config),
        }
    }
}
