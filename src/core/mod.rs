//! Core business logic
//!
//! # Submodules
//!
//! - [`table`] - Module table (modules.toml) parsing and validation
//! - [`resolver`] - Dependency resolution into a build plan
//! - [`inject`] - Injection fragments and macro substitution
//! - [`driver`] - Per-module prepare/configure/build phases
//! - [`orchestrator`] - Plan walking, failure handling, run report
//! - [`packager`] - Bundle assembly from build outputs
//! - [`report`] - Persisted per-run outcome records

pub mod driver;
pub mod inject;
pub mod orchestrator;
pub mod packager;
pub mod report;
pub mod resolver;
pub mod table;
