//! Modforge - dependency-ordered build orchestrator
//!
//! Reads a declarative table of modules (source, version, flags,
//! dependencies), computes a dependency-respecting build order, and
//! drives clone → configure → build → package for each module while
//! tolerating partial failures.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (table, resolver, driver, orchestrator, packager)
//! - [`infra`] - Infrastructure layer (network, filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
