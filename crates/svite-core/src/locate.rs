//! Config file discovery.
//!
//! Looks for `svite.config.*` in a project root, first match wins.

use crate::error::{Error, Result};
use crate::paths::{absolutize, is_file};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file names in priority order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "svite.config.js",
    "svite.config.mjs",
    "svite.config.ts",
    "svite.config.cjs",
    "svite.config.mts",
    "svite.config.cts",
];

/// A config file that existed when it was located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCandidate {
    pub path: PathBuf,
}

/// Find the first of `names` that is a regular file directly inside `root`.
pub async fn locate_config<S: AsRef<str>>(root: &Path, names: &[S]) -> Result<ConfigCandidate> {
    for name in names {
        let path = root.join(name.as_ref());
        if is_file(&path).await {
            debug!(path = %path.display(), "Found config file");
            return Ok(ConfigCandidate {
                path: absolutize(&path, root),
            });
        }
    }

    Err(Error::ConfigNotFound {
        root: root.to_path_buf(),
        candidates: names.iter().map(|n| n.as_ref().to_string()).collect(),
    })
}

/// Use an explicit config file. Relative paths are joined onto `root`.
pub async fn explicit_config(root: &Path, config_path: &Path) -> Result<ConfigCandidate> {
    let abs = if config_path.is_absolute() {
        config_path.to_path_buf()
    } else {
        root.join(config_path)
    };

    if !is_file(&abs).await {
        return Err(Error::ConfigNotFound {
            root: root.to_path_buf(),
            candidates: vec![config_path.display().to_string()],
        });
    }

    debug!(path = %abs.display(), "Using explicit config file");
    Ok(ConfigCandidate {
        path: absolutize(&abs, root),
    })
}
