//! Validate command implementation
//!
//! Implements `modforge validate`: a fail-fast check of the module
//! table and dependency graph that never touches module sources.

use anyhow::Result;
use std::path::Path;

use crate::core::resolver;
use crate::core::table::ModuleTable;
use crate::error::ModforgeError;

/// Execute the validate command
pub fn execute(config: &Path) -> Result<i32> {
    let table = ModuleTable::load(config).map_err(ModforgeError::from)?;

    let problems = table.validate();
    if !problems.is_empty() {
        return Err(ModforgeError::Validation(problems).into());
    }

    let plan = resolver::resolve(&table).map_err(ModforgeError::from)?;

    println!(
        "Configuration valid: {} modules, {} in the build plan",
        table.modules.len(),
        plan.len()
    );
    for (idx, name) in plan.order().iter().enumerate() {
        println!("  {:>3}. {name}", idx + 1);
    }
    Ok(0)
}
