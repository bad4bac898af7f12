//! Config bundler.
//!
//! Compiles a config entry file and every local module it reaches into one
//! self-contained module in the entry's [`ModuleFormat`].
//!
//! ## Architecture
//!
//! 1. **Parse** - SWC parses each module (TS sources are stripped first);
//!    builds without the `swc` feature tokenize with [`lexer`] instead
//! 2. **Analyze** - Find imports, exports, `require` calls, `import.meta`
//!    and top-level `await`
//! 3. **Resolve** - Relative/absolute specifiers are inlined, everything else stays external
//! 4. **Emit** - Wrap each module in a registry function and add the format-specific entry
//!
//! Each wrapper declares `__dirname`, `__filename` and `import.meta` values
//! computed from the module's original location, so the bundle behaves as if
//! it were still running from the user's project.

pub mod analyze;
mod emit;
mod graph;
pub mod lexer;
mod resolve;

pub use emit::emit_bundle;
pub use graph::{Dependency, Module, ModuleGraph, ModuleId, ModuleKind};
pub use resolve::{ResolveError, ResolveResult, Resolver, RESOLVE_EXTENSIONS};

use crate::compiler::{CompilerBackend, Diagnostic, SwcBackend};
use crate::format::ModuleFormat;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bundled config, ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifact {
    /// Generated module text.
    pub source_text: String,
    /// Module format of `source_text`.
    pub format: ModuleFormat,
    /// Every local file that was inlined, entry first.
    pub dependencies: Vec<PathBuf>,
}

/// Bundler error.
#[derive(Debug, Clone)]
pub struct BundleError {
    pub code: &'static str,
    pub message: String,
    pub path: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BundleError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {} ({})", self.code, self.message, path.display())?;
        } else {
            write!(f, "{}: {}", self.code, self.message)?;
        }
        for diag in &self.diagnostics {
            write!(f, "\n  - {diag}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BundleError {}

/// The config bundler.
pub struct Bundler {
    backend: Box<dyn CompilerBackend>,
    resolver: Resolver,
}

impl Default for Bundler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundler")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Bundler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: Box::new(SwcBackend::new()),
            resolver: Resolver::new(),
        }
    }

    /// Use a different compiler backend for TypeScript sources.
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn CompilerBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Bundle `entry` and its local imports into a single module.
    pub async fn bundle(&self, entry: &Path, format: ModuleFormat) -> Result<BundleArtifact, BundleError> {
        let graph = ModuleGraph::build(entry, self.backend.as_ref(), &self.resolver).await?;
        let source_text = emit_bundle(&graph, format);

        debug!(
            entry = %entry.display(),
            %format,
            modules = graph.len(),
            bytes = source_text.len(),
            "Bundled config"
        );

        Ok(BundleArtifact {
            source_text,
            format,
            dependencies: graph.paths(),
        })
    }
}
