//! Dependency resolution
//!
//! Turns the module table into a build plan: a total order over the
//! build-enabled modules in which every module appears after all of its
//! declared dependencies.
//!
//! The sort is a stable Kahn walk. When several modules are ready at the
//! same time the tie is broken by original table order, so an author's
//! hand-ordered table resolves to exactly that order whenever it is
//! already valid. Identical input always yields an identical plan.

use std::collections::{HashMap, HashSet};

use crate::core::table::ModuleTable;
use crate::error::ResolverError;

/// Dependency-respecting total order over build-enabled modules.
///
/// Produced by [`resolve`], consumed read-only by the orchestrator and
/// discarded after one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    order: Vec<String>,
}

impl BuildPlan {
    /// Module names in build order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Number of modules in the plan
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Position of a module in the plan
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

/// Compute the build plan for a table.
///
/// Only build-enabled modules are planned. A build-enabled module that
/// depends on a disabled one is a fail-fast error rather than a silent
/// drop: the table must either enable the dependency or remove the edge.
/// A residual unresolved set after the sort terminates is reported as a
/// cycle naming every involved module.
pub fn resolve(table: &ModuleTable) -> Result<BuildPlan, ResolverError> {
    let enabled: Vec<&str> = table
        .modules
        .iter()
        .filter(|m| m.build)
        .map(|m| m.name.as_str())
        .collect();
    let enabled_set: HashSet<&str> = enabled.iter().copied().collect();

    for module in table.modules.iter().filter(|m| m.build) {
        for dep in &module.depends {
            if !enabled_set.contains(dep.as_str()) {
                return Err(ResolverError::DisabledDependency {
                    module: module.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // Remaining unresolved dependency count per enabled module
    let mut pending: HashMap<&str, usize> = HashMap::new();
    for module in table.modules.iter().filter(|m| m.build) {
        pending.insert(module.name.as_str(), module.depends.len());
    }

    let mut order: Vec<String> = Vec::with_capacity(enabled.len());
    let mut emitted: HashSet<&str> = HashSet::new();

    loop {
        // First table-order module with no unresolved dependencies
        let next = enabled.iter().copied().find(|name| {
            !emitted.contains(name) && pending.get(name).copied() == Some(0)
        });
        let Some(name) = next else { break };

        emitted.insert(name);
        order.push(name.to_string());
        for module in table.modules.iter().filter(|m| m.build) {
            if module.depends.iter().any(|d| d == name) {
                if let Some(count) = pending.get_mut(module.name.as_str()) {
                    *count -= 1;
                }
            }
        }
    }

    if order.len() != enabled.len() {
        let members: Vec<String> = enabled
            .iter()
            .filter(|name| !emitted.contains(*name))
            .map(|name| (*name).to_string())
            .collect();
        return Err(ResolverError::Cycle { members });
    }

    Ok(BuildPlan { order })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::{Module, SourceKind};
    use proptest::prelude::*;

    fn module(name: &str, depends: &[&str]) -> Module {
        Module {
            name: name.to_string(),
            version: "1.0".to_string(),
            url: format!("https://example.com/{name}"),
            source: SourceKind::Git,
            install_path: name.to_string(),
            clone: true,
            build: true,
            package: true,
            depends: depends.iter().map(|d| (*d).to_string()).collect(),
            script: None,
            critical: None,
            sha256: None,
            env: HashMap::new(),
            script_path: None,
        }
    }

    fn table(modules: Vec<Module>) -> ModuleTable {
        ModuleTable {
            modules,
            ..ModuleTable::default()
        }
    }

    #[test]
    fn test_dependency_before_dependent() {
        let t = table(vec![module("app", &["lib"]), module("lib", &[])]);
        let plan = resolve(&t).unwrap();
        assert!(plan.position("lib").unwrap() < plan.position("app").unwrap());
    }

    #[test]
    fn test_tie_break_preserves_table_order() {
        // A has no deps; B and C both depend only on A. The authored
        // order B-before-C must survive.
        let t = table(vec![
            module("a", &[]),
            module("b", &["a"]),
            module("c", &["a"]),
        ]);
        let plan = resolve(&t).unwrap();
        assert_eq!(plan.order(), &["a", "b", "c"]);
    }

    #[test]
    fn test_author_order_kept_when_already_valid() {
        let t = table(vec![
            module("base", &[]),
            module("mid", &["base"]),
            module("top", &["mid", "base"]),
        ]);
        let plan = resolve(&t).unwrap();
        assert_eq!(plan.order(), &["base", "mid", "top"]);
    }

    #[test]
    fn test_out_of_order_table_is_reordered() {
        let t = table(vec![module("top", &["base"]), module("base", &[])]);
        let plan = resolve(&t).unwrap();
        assert_eq!(plan.order(), &["base", "top"]);
    }

    #[test]
    fn test_two_node_cycle_names_both() {
        let t = table(vec![module("a", &["b"]), module("b", &["a"])]);
        let err = resolve(&t).unwrap_err();
        match err {
            ResolverError::Cycle { members } => {
                assert!(members.contains(&"a".to_string()));
                assert!(members.contains(&"b".to_string()));
            }
            other => panic!("Expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_disabled_modules_excluded_from_plan() {
        let mut disabled = module("docs", &[]);
        disabled.build = false;
        let t = table(vec![module("a", &[]), disabled]);
        let plan = resolve(&t).unwrap();
        assert_eq!(plan.order(), &["a"]);
    }

    #[test]
    fn test_disabled_dependency_is_an_error_not_a_drop() {
        let mut disabled = module("base", &[]);
        disabled.build = false;
        let t = table(vec![disabled, module("app", &["base"])]);
        let err = resolve(&t).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::DisabledDependency { module, dependency }
                if module == "app" && dependency == "base"
        ));
    }

    #[test]
    fn test_empty_table_yields_empty_plan() {
        let plan = resolve(&table(vec![])).unwrap();
        assert!(plan.is_empty());
    }

    // ============================================
    // Property-Based Tests
    // ============================================

    /// Strategy for a random acyclic table: each module may depend only
    /// on modules authored before it, so the table is acyclic by
    /// construction while the dependency shape is arbitrary.
    fn acyclic_table_strategy() -> impl Strategy<Value = ModuleTable> {
        (2usize..12).prop_flat_map(|n| {
            let dep_masks = proptest::collection::vec(
                proptest::collection::vec(proptest::bool::ANY, n),
                n,
            );
            dep_masks.prop_map(move |masks| {
                let names: Vec<String> = (0..n).map(|i| format!("m{i}")).collect();
                let modules = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let deps: Vec<&str> = (0..i)
                            .filter(|j| masks[i][*j])
                            .map(|j| names[j].as_str())
                            .collect();
                        module(name, &deps)
                    })
                    .collect();
                table(modules)
            })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Every module appears exactly once, strictly after all of its
        /// declared dependencies.
        #[test]
        fn prop_plan_is_complete_and_ordered(t in acyclic_table_strategy()) {
            let plan = resolve(&t).unwrap();
            prop_assert_eq!(plan.len(), t.modules.len());
            for m in &t.modules {
                let pos = plan.position(&m.name).expect("module missing from plan");
                for dep in &m.depends {
                    let dep_pos = plan.position(dep).expect("dependency missing from plan");
                    prop_assert!(
                        dep_pos < pos,
                        "{} must come before {}", dep, m.name
                    );
                }
            }
        }

        /// Resolving the same table twice yields identical plans.
        #[test]
        fn prop_resolution_is_deterministic(t in acyclic_table_strategy()) {
            let first = resolve(&t).unwrap();
            let second = resolve(&t).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
