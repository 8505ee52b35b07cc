//! Injection fragments and macro substitution
//!
//! Two kinds of build-configuration patching are supported, both loaded
//! from the configuration store and immutable for the duration of a run:
//!
//! - **Injections**: literal text fragments appended into a generated
//!   build-configuration file at a designated marker line.
//! - **Macros**: exact-key `NAME=value` substitutions applied to the
//!   assignment lines of build-configuration files.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::table::ModuleTable;
use crate::error::PatchError;

/// Directive naming an injection's target file inside a fragment file
const TARGET_DIRECTIVE: &str = "__TARGET__=";

/// One injection fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Fragment name (the file stem in the injections directory)
    pub name: String,
    /// Target file template; may use `$(INSTALL)` and `$(<MODULE>)`
    pub target: String,
    /// Literal text to inject
    pub contents: String,
}

/// All injection fragments of a configuration store
#[derive(Debug, Clone, Default)]
pub struct InjectionSet {
    injections: Vec<Injection>,
}

impl InjectionSet {
    /// Load fragments from `<config>/injections/`.
    ///
    /// A fragment file starts with a `__TARGET__=` directive naming the
    /// file it patches; `#` lines are comments; everything else is the
    /// fragment body, kept verbatim. A missing directory is an empty set.
    pub fn load(config_dir: &Path) -> Result<Self, PatchError> {
        let dir = config_dir.join(defaults::INJECTIONS_DIR);
        if !dir.is_dir() {
            return Ok(Self::default());
        }
        let mut injections = Vec::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| PatchError::IoError {
                path: dir.clone(),
                error: e.to_string(),
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        for path in entries {
            let content = std::fs::read_to_string(&path).map_err(|e| PatchError::IoError {
                path: path.clone(),
                error: e.to_string(),
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut target = None;
            let mut body = String::new();
            for line in content.lines() {
                if let Some(rest) = line.strip_prefix(TARGET_DIRECTIVE) {
                    target = Some(rest.trim().to_string());
                } else if !line.starts_with('#') {
                    body.push_str(line);
                    body.push('\n');
                }
            }
            match target {
                Some(target) => injections.push(Injection {
                    name,
                    target,
                    contents: body,
                }),
                None => {
                    tracing::warn!(
                        "Injection file '{}' has no {} directive, ignoring",
                        path.display(),
                        TARGET_DIRECTIVE.trim_end_matches('=')
                    );
                }
            }
        }
        Ok(Self { injections })
    }

    /// Build a set from in-memory fragments
    pub fn from_injections(injections: Vec<Injection>) -> Self {
        Self { injections }
    }

    /// Iterate over the fragments
    pub fn iter(&self) -> impl Iterator<Item = &Injection> {
        self.injections.iter()
    }

    /// Number of fragments
    pub fn len(&self) -> usize {
        self.injections.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.injections.is_empty()
    }
}

/// Resolve a target template to an absolute path.
///
/// `$(INSTALL)` expands to the install root; `$(<name>)` expands to the
/// named module's checkout path. Unknown names resolve to `None`.
pub fn resolve_target(
    template: &str,
    table: &ModuleTable,
    install_root: &Path,
) -> Option<PathBuf> {
    let re = Regex::new(r"\$\(([A-Za-z0-9_.-]+)\)").expect("valid path macro regex");
    let mut resolved = String::new();
    let mut last = 0;
    for caps in re.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        let name = &caps[1];
        resolved.push_str(&template[last..whole.start()]);
        if name == defaults::INSTALL_PATH_MACRO {
            resolved.push_str(&install_root.to_string_lossy());
        } else {
            let module = table.get(name)?;
            resolved.push_str(&module.abs_path(install_root).to_string_lossy());
        }
        last = whole.end();
    }
    resolved.push_str(&template[last..]);
    Some(PathBuf::from(resolved))
}

/// Apply an injection fragment to its resolved target file.
///
/// The fragment is wrapped in begin/end sentinel lines and inserted
/// after the marker line, or at the end of the file when no marker is
/// present. A previously injected block with the same name is replaced,
/// so re-running configure does not stack fragments.
pub fn apply_injection(injection: &Injection, target: &Path) -> Result<(), PatchError> {
    if !target.is_file() {
        return Err(PatchError::TargetMissing {
            path: target.to_path_buf(),
        });
    }
    let original = std::fs::read_to_string(target).map_err(|e| PatchError::IoError {
        path: target.to_path_buf(),
        error: e.to_string(),
    })?;

    let begin = format!("# >>> modforge inject: {}", injection.name);
    let end = format!("# <<< modforge inject: {}", injection.name);
    let block = format!("{begin}\n{}{end}\n", injection.contents);

    let stripped = strip_block(&original, &begin, &end);
    let patched = match stripped.lines().position(|l| l.trim() == defaults::INJECTION_MARKER) {
        Some(marker_idx) => {
            let mut out = String::new();
            for (idx, line) in stripped.lines().enumerate() {
                out.push_str(line);
                out.push('\n');
                if idx == marker_idx {
                    out.push_str(&block);
                }
            }
            out
        }
        None => {
            let mut out = stripped;
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out
        }
    };

    std::fs::write(target, patched).map_err(|e| PatchError::IoError {
        path: target.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a previously injected sentinel block
fn strip_block(content: &str, begin: &str, end: &str) -> String {
    let mut out = String::new();
    let mut in_block = false;
    for line in content.lines() {
        if line == begin {
            in_block = true;
            continue;
        }
        if line == end {
            in_block = false;
            continue;
        }
        if !in_block {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Macro key/value pairs in file order
#[derive(Debug, Clone, Default)]
pub struct MacroSet {
    pairs: Vec<(String, String)>,
}

impl MacroSet {
    /// Load macro files from `<config>/macros/`.
    ///
    /// Every file contributes `KEY=VALUE` lines; `#` lines are comments.
    /// A missing directory is an empty set.
    pub fn load(config_dir: &Path) -> Result<Self, PatchError> {
        let dir = config_dir.join(defaults::MACROS_DIR);
        if !dir.is_dir() {
            return Ok(Self::default());
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| PatchError::IoError {
                path: dir.clone(),
                error: e.to_string(),
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut pairs = Vec::new();
        for path in entries {
            let content = std::fs::read_to_string(&path).map_err(|e| PatchError::IoError {
                path: path.clone(),
                error: e.to_string(),
            })?;
            for line in content.lines() {
                let line = line.trim();
                if line.starts_with('#') || line.is_empty() {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    pairs.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
        }
        Ok(Self { pairs })
    }

    /// Build a set from in-memory pairs
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Look up a macro value by exact key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the pairs in load order
    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.pairs.iter()
    }

    /// Number of macro pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Substitute macros in one build-configuration file.
    ///
    /// Lines of the form `KEY=...` (or commented `#KEY=...`, which get
    /// uncommented) are rewritten to `KEY=value` on exact key match.
    /// Matched keys are added to `matched` so the caller can warn about
    /// macros that never applied anywhere.
    pub fn apply_to_file(
        &self,
        path: &Path,
        matched: &mut HashSet<String>,
    ) -> Result<usize, PatchError> {
        let content = std::fs::read_to_string(path).map_err(|e| PatchError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let line_re =
            Regex::new(r"^(#+\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*=").expect("valid macro line regex");

        let mut replaced = 0;
        let mut out = String::new();
        for line in content.lines() {
            match line_re.captures(line) {
                Some(caps) => {
                    let key = caps.get(2).unwrap().as_str();
                    if let Some(value) = self.get(key) {
                        out.push_str(&format!("{key}={value}"));
                        matched.insert(key.to_string());
                        replaced += 1;
                    } else {
                        out.push_str(line);
                    }
                }
                None => out.push_str(line),
            }
            out.push('\n');
        }

        if replaced > 0 {
            std::fs::write(path, out).map_err(|e| PatchError::IoError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
        }
        Ok(replaced)
    }

    /// Substitute macros in every file directly inside a directory
    pub fn apply_to_dir(
        &self,
        dir: &Path,
        matched: &mut HashSet<String>,
    ) -> Result<usize, PatchError> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| PatchError::IoError {
                path: dir.to_path_buf(),
                error: e.to_string(),
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut total = 0;
        for path in entries {
            total += self.apply_to_file(&path, matched)?;
        }
        Ok(total)
    }
}
