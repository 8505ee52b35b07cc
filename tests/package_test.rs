//! Integration tests for bundle assembly options of `modforge build`

mod common;

use common::{TestProject, CHAIN_TABLE};

const ARTIFACT_SCRIPT: &str = r#"#!/bin/bash
set -e
mkdir -p bin lib
echo "bin of $MODULE_NAME" > "bin/$MODULE_NAME"
echo "lib of $MODULE_NAME" > "lib/lib$MODULE_NAME.a"
"#;

fn seed(project: &TestProject) {
    project.write_table(CHAIN_TABLE);
    for (name, path) in [("base", "base"), ("mid", "support/mid"), ("top", "support/top")] {
        project.seed_module(path);
        project.add_script(name, ARTIFACT_SCRIPT);
    }
}

#[test]
fn test_hierarchical_layout_mirrors_install_paths() {
    let project = TestProject::new();
    seed(&project);

    let output = project.run_build(&["--layout", "hierarchical"]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(project.staged_exists("base-bundle-1.0/base/bin/base"));
    assert!(project.staged_exists("base-bundle-1.0/support/mid/lib/libmid.a"));
    assert!(project.staged_exists("base-bundle-1.0/support/top/bin/top"));
    // Hierarchical bundles carry the whole module tree
    assert!(project.staged_exists("base-bundle-1.0/base/README"));
}

#[test]
fn test_flat_layout_keeps_only_artifact_directories() {
    let project = TestProject::new();
    seed(&project);

    assert_eq!(project.run_build(&[]).status.code(), Some(0));

    assert!(project.staged_exists("base-bundle-1.0/base/bin/base"));
    assert!(project.staged_exists("base-bundle-1.0/base/lib/libbase.a"));
    assert!(!project.staged_exists("base-bundle-1.0/base/README"));
}

#[test]
fn test_package_flag_excludes_module_from_bundle() {
    let project = TestProject::new();
    project.write_table(
        r#"
[[module]]
name = "shipped"
version = "1.0"
url = "https://example.com/shipped"
install_path = "shipped"
clone = false

[[module]]
name = "internal"
version = "1.0"
url = "https://example.com/internal"
install_path = "internal"
clone = false
package = false
"#,
    );
    project.seed_module("shipped");
    project.seed_module("internal");
    project.add_script("shipped", ARTIFACT_SCRIPT);
    project.add_script("internal", ARTIFACT_SCRIPT);

    assert_eq!(project.run_build(&[]).status.code(), Some(0));
    assert!(project.staged_exists("shipped-bundle-1.0/shipped/bin/shipped"));
    assert!(!project.staged_exists("shipped-bundle-1.0/internal"));
}

#[test]
fn test_bundle_version_of_names_bundle() {
    let project = TestProject::new();
    project.write_table(
        r#"
[bundle]
version_of = "core"

[[module]]
name = "base"
version = "7.0.3"
url = "https://example.com/base"
install_path = "base"
clone = false

[[module]]
name = "core"
version = "R3-8"
url = "https://example.com/core"
install_path = "core"
clone = false
"#,
    );
    project.seed_module("base");
    project.seed_module("core");
    project.add_script("base", ARTIFACT_SCRIPT);
    project.add_script("core", ARTIFACT_SCRIPT);

    assert_eq!(project.run_build(&[]).status.code(), Some(0));
    assert!(project.staged_exists("core-bundle-R3-8"));
}
