// src/discover.rs

//! Target discovery.
//!
//! A buildable target is any `targets/<group>/<name>/` directory carrying a
//! `target.toml` manifest. Discovery is deliberately dumb: it only
//! enumerates; the build tool itself decides what building a target means.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Name of the per-target manifest file that marks a directory buildable.
pub const TARGET_MANIFEST: &str = "target.toml";

/// One independently buildable unit, identified by its (group, name) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target {
    pub group: String,
    pub name: String,
}

impl Target {
    /// Composite identifier used for the build invocation and log artifact.
    pub fn id(&self) -> String {
        format!("{}_{}", self.group, self.name)
    }

    /// Directory holding this target's manifest, under the project root.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join("targets").join(&self.group).join(&self.name)
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(TARGET_MANIFEST)
    }
}

/// Enumerate all targets under `<root>/targets/<group>/<name>/target.toml`.
///
/// The result is sorted by (group, name), which fixes the dispatch order for
/// the whole run. A missing `targets/` directory yields an empty list; the
/// caller decides that an empty run is an error.
pub fn discover_targets(root: &Path) -> Result<Vec<Target>> {
    let targets_dir = root.join("targets");
    let mut targets = Vec::new();

    if !targets_dir.is_dir() {
        return Ok(targets);
    }

    for group_entry in fs::read_dir(&targets_dir)
        .with_context(|| format!("reading targets directory {}", targets_dir.display()))?
    {
        let group_entry = group_entry?;
        if !group_entry.file_type()?.is_dir() {
            continue;
        }
        let Some(group) = group_entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        for name_entry in fs::read_dir(group_entry.path())
            .with_context(|| format!("reading target group {group}"))?
        {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = name_entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };

            if name_entry.path().join(TARGET_MANIFEST).is_file() {
                targets.push(Target {
                    group: group.clone(),
                    name,
                });
            }
        }
    }

    targets.sort();
    debug!(count = targets.len(), "discovered targets");
    Ok(targets)
}
