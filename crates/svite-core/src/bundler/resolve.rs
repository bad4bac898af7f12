//! Import specifier resolution.
//!
//! ## Specifier Types
//!
//! - Relative: `./utils`, `../lib/foo` (inlined)
//! - Absolute: `/abs/path/to/module`, `file:///abs/path` (inlined)
//! - Built-in: `node:fs`, `path`, `fs/promises` (external)
//! - Bare: `lodash`, `@scope/pkg`, `#internal` (external)

use crate::paths::{is_dir, is_file};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Extensions tried, in order, when a local specifier has no exact match.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".ts", ".mts", ".cts", ".js", ".mjs", ".cjs", ".json"];

/// Written extension to the TypeScript source it may refer to.
const TS_SWAPS: &[(&str, &str)] = &[
    (".js", ".ts"),
    (".mjs", ".mts"),
    (".cjs", ".cts"),
    (".jsx", ".tsx"),
];

/// Node.js core modules importable without the `node:` prefix.
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Result of resolving an import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// A local file to inline.
    Found(PathBuf),
    /// A package left for the host runtime to load.
    External(String),
    /// A Node.js core module.
    Builtin(String),
}

impl ResolveResult {
    /// Whether the specifier stays a runtime import.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::Found(_))
    }
}

/// Error during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub specifier: String,
    pub from: PathBuf,
    pub message: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cannot resolve '{}' from '{}': {}",
            self.specifier,
            self.from.display(),
            self.message
        )
    }
}

impl std::error::Error for ResolveError {}

/// Import resolver. Stateless; every lookup hits the file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct Resolver;

impl Resolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve `specifier` as written in the module at `from`.
    pub async fn resolve(&self, specifier: &str, from: &Path) -> Result<ResolveResult, ResolveError> {
        if let Some(builtin) = builtin_name(specifier) {
            return Ok(ResolveResult::Builtin(builtin.to_string()));
        }

        let target = if is_relative(specifier) {
            from.parent().unwrap_or(Path::new(".")).join(specifier)
        } else if let Some(url) = specifier.strip_prefix("file://") {
            url::Url::parse(specifier)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .unwrap_or_else(|| PathBuf::from(url))
        } else if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else {
            let (package, _) = parse_bare_specifier(specifier);
            trace!(specifier, package, "External import");
            return Ok(ResolveResult::External(specifier.to_string()));
        };

        match self.resolve_file_or_directory(&target).await {
            Some(found) => Ok(ResolveResult::Found(
                dunce::canonicalize(&found).unwrap_or(found),
            )),
            None => Err(ResolveError {
                specifier: specifier.to_string(),
                from: from.to_path_buf(),
                message: "File not found".to_string(),
            }),
        }
    }

    async fn resolve_file_or_directory(&self, target: &Path) -> Option<PathBuf> {
        if is_file(target).await {
            return Some(target.to_path_buf());
        }

        let raw = target.as_os_str().to_string_lossy();
        for ext in RESOLVE_EXTENSIONS {
            let with_ext = PathBuf::from(format!("{raw}{ext}"));
            if is_file(&with_ext).await {
                return Some(with_ext);
            }
        }

        for (written, source) in TS_SWAPS {
            if let Some(stem) = raw.strip_suffix(written) {
                let swapped = PathBuf::from(format!("{stem}{source}"));
                if is_file(&swapped).await {
                    return Some(swapped);
                }
            }
        }

        if is_dir(target).await {
            for ext in RESOLVE_EXTENSIONS {
                let index = target.join(format!("index{ext}"));
                if is_file(&index).await {
                    return Some(index);
                }
            }
        }

        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// The specifier itself when it names a Node.js core module.
fn builtin_name(specifier: &str) -> Option<&str> {
    if specifier.starts_with("node:") {
        return Some(specifier);
    }
    let root = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&root).then_some(specifier)
}

/// Split a bare specifier into package name and subpath.
fn parse_bare_specifier(specifier: &str) -> (&str, Option<&str>) {
    let split_at = if specifier.starts_with('@') {
        specifier.match_indices('/').nth(1).map(|(i, _)| i)
    } else {
        specifier.find('/')
    };
    match split_at {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}
