// src/manifest.rs

//! Per-target build manifest (`target.toml`).
//!
//! The manifest's presence is what makes a directory a target; its contents
//! are optional knobs merged into the make invocation. A manifest that fails
//! to read or parse degrades to the defaults with a warning rather than
//! failing the run: bad discovered configuration is tolerated, bad CLI
//! configuration is not.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Contents of a `target.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetManifest {
    #[serde(default)]
    pub build: BuildSection,
}

/// `[build]` section: extra arguments and environment for this target's
/// make invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub make_args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Load a target manifest, falling back to defaults on any problem.
pub fn load_manifest(path: &Path) -> TargetManifest {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable target manifest; using defaults");
            return TargetManifest::default();
        }
    };

    match toml::from_str(&contents) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "invalid target manifest; using defaults");
            TargetManifest::default()
        }
    }
}
