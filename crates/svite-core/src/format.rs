use crate::error::{Error, Result};
use crate::paths::{find_package_json, parent_dir};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Module convention a config file is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// ES module (`import`/`export`). Must be loaded from a URL.
    Declarative,
    /// CommonJS (`require`/`module.exports`).
    Legacy,
}

impl ModuleFormat {
    /// Suffix for a transient file in this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Declarative => ".mjs",
            Self::Legacy => ".cjs",
        }
    }

    /// Short name used on the wire to the host loader.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Declarative => "esm",
            Self::Legacy => "cjs",
        }
    }
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determine the module format of `path`.
///
/// `.mjs`/`.mts` are always declarative and `.cjs`/`.cts` always legacy.
/// For `.js`, `.ts`, `.jsx` and `.tsx` the nearest `package.json` decides:
/// `"type": "module"` means declarative, anything else legacy.
pub async fn classify(path: &Path) -> Result<ModuleFormat> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let format = match ext {
        "mjs" | "mts" => ModuleFormat::Declarative,
        "cjs" | "cts" => ModuleFormat::Legacy,
        "js" | "ts" | "jsx" | "tsx" => package_type(path).await?,
        _ => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: if ext.is_empty() {
                    "file has no extension".to_string()
                } else {
                    format!("unrecognized extension '.{ext}'")
                },
            })
        }
    };

    debug!(path = %path.display(), %format, "Classified config module");
    Ok(format)
}

async fn package_type(path: &Path) -> Result<ModuleFormat> {
    let Some(manifest) = find_package_json(parent_dir(path)).await else {
        return Ok(ModuleFormat::Legacy);
    };

    let unsupported = |reason: String| Error::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    };

    let content = tokio::fs::read_to_string(&manifest)
        .await
        .map_err(|e| unsupported(format!("cannot read {}: {e}", manifest.display())))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| unsupported(format!("malformed {}: {e}", manifest.display())))?;

    match json.get("type").and_then(serde_json::Value::as_str) {
        Some("module") => Ok(ModuleFormat::Declarative),
        _ => Ok(ModuleFormat::Legacy),
    }
}
