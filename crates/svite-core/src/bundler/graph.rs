//! Module dependency graph.
//!
//! Built breadth-first from the entry. Module IDs follow discovery order, so
//! the entry is always `0`.

use super::analyze::{ExportDecl, ModuleAnalysis, SpecifierRef};
use super::lexer::line_col;
use super::resolve::{ResolveResult, Resolver};
use super::BundleError;
use crate::compiler::{CompilerBackend, Diagnostic};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Unique identifier for a module in the graph.
pub type ModuleId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Json,
}

/// What a specifier points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Local(ModuleId),
    External(String),
}

/// A module in the dependency graph.
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute path to the original file.
    pub path: PathBuf,
    pub kind: ModuleKind,
    /// Source after type stripping.
    pub source: String,
    pub analysis: ModuleAnalysis,
    /// Specifier as written to its resolution.
    pub dependencies: HashMap<String, Dependency>,
}

impl Module {
    /// Resolution of a specifier written in this module.
    #[must_use]
    pub fn dependency(&self, specifier: &str) -> Option<&Dependency> {
        self.dependencies.get(specifier)
    }
}

/// The module dependency graph.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
}

impl ModuleGraph {
    /// Load `entry` and every local module reachable from it.
    pub async fn build(
        entry: &Path,
        backend: &dyn CompilerBackend,
        resolver: &Resolver,
    ) -> Result<Self, BundleError> {
        let entry = dunce::canonicalize(entry).map_err(|e| {
            BundleError::new(
                "BUNDLE_READ_ERROR",
                format!("Failed to read {}: {e}", entry.display()),
            )
            .with_path(entry)
        })?;

        let mut queue: Vec<PathBuf> = vec![entry.clone()];
        let mut ids: HashMap<PathBuf, ModuleId> = HashMap::from([(entry, 0)]);
        let mut modules = Vec::new();

        let mut next = 0;
        while next < queue.len() {
            let path = queue[next].clone();
            let (kind, source, analysis) = load_module(&path, backend).await?;

            let mut dependencies = HashMap::new();
            for spec in analysis.specifiers() {
                let dependency = match resolver.resolve(&spec.specifier, &path).await {
                    Ok(ResolveResult::Found(found)) => {
                        let id = *ids.entry(found.clone()).or_insert_with(|| {
                            queue.push(found);
                            queue.len() - 1
                        });
                        Dependency::Local(id)
                    }
                    Ok(ResolveResult::External(s) | ResolveResult::Builtin(s)) => {
                        Dependency::External(s)
                    }
                    Err(err) => return Err(resolve_error(&err, &path, &source, spec)),
                };
                trace!(from = %path.display(), specifier = %spec.specifier, ?dependency, "Resolved");
                dependencies.insert(spec.specifier.clone(), dependency);
            }

            modules.push(Module {
                path,
                kind,
                source,
                analysis,
                dependencies,
            });
            next += 1;
        }

        Ok(Self { modules })
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter().enumerate()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Paths of every module, entry first.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.modules.iter().map(|m| m.path.clone()).collect()
    }

    /// External specifiers used by `import`/`export ... from` statements, first use first.
    #[must_use]
    pub fn static_externals(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for module in &self.modules {
            let analysis = &module.analysis;
            let sources = analysis.imports.iter().map(|i| &i.source).chain(
                analysis.exports.iter().filter_map(|e| match e {
                    ExportDecl::ReExport { source, .. } | ExportDecl::Star { source, .. } => {
                        Some(source)
                    }
                    _ => None,
                }),
            );
            for source in sources {
                if let Some(Dependency::External(spec)) = module.dependency(&source.specifier) {
                    if !out.contains(&spec.as_str()) {
                        out.push(spec);
                    }
                }
            }
        }
        out
    }
}

async fn load_module(
    path: &Path,
    backend: &dyn CompilerBackend,
) -> Result<(ModuleKind, String, ModuleAnalysis), BundleError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        BundleError::new(
            "BUNDLE_READ_ERROR",
            format!("Failed to read {}: {e}", path.display()),
        )
        .with_path(path)
    })?;
    let raw = raw.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(raw);

    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&raw) {
            return Err(BundleError::new("BUNDLE_JSON_ERROR", format!("Invalid JSON: {e}"))
                .with_path(path)
                .with_diagnostic(Diagnostic::error(e.to_string()).with_location(
                    path.to_path_buf(),
                    e.line() as u32,
                    e.column() as u32,
                )));
        }
        return Ok((ModuleKind::Json, raw, ModuleAnalysis::default()));
    }

    let source = backend.strip_types(path, &raw).map_err(|e| {
        let mut err = BundleError::new("BUNDLE_TRANSFORM_ERROR", e.message.clone()).with_path(path);
        err.diagnostics = e.diagnostics;
        err
    })?;

    let analysis = analyze_source(path, &source)?;

    Ok((ModuleKind::Script, source, analysis))
}

/// Parse with SWC when it is compiled in.
#[cfg(feature = "swc")]
fn analyze_source(path: &Path, source: &str) -> Result<ModuleAnalysis, BundleError> {
    crate::compiler::ast_parser::analyze_module(path, source).map_err(|e| {
        let mut err = BundleError::new("BUNDLE_SYNTAX_ERROR", e.message.clone()).with_path(path);
        err.diagnostics = e.diagnostics;
        err
    })
}

/// Token scanner fallback.
#[cfg(not(feature = "swc"))]
fn analyze_source(path: &Path, source: &str) -> Result<ModuleAnalysis, BundleError> {
    use super::analyze::analyze;
    use super::lexer::tokenize;

    let tokens = tokenize(source).map_err(|e| {
        BundleError::new("BUNDLE_SYNTAX_ERROR", e.message.clone())
            .with_path(path)
            .with_diagnostic(
                Diagnostic::error(e.message).with_location(path.to_path_buf(), e.line, e.column),
            )
    })?;

    analyze(source, &tokens).map_err(|e| {
        let (line, column) = line_col(source, e.offset);
        BundleError::new("BUNDLE_PARSE_ERROR", e.message.clone())
            .with_path(path)
            .with_diagnostic(
                Diagnostic::error(e.message).with_location(path.to_path_buf(), line, column),
            )
    })
}

fn resolve_error(
    err: &super::ResolveError,
    path: &Path,
    source: &str,
    spec: &SpecifierRef,
) -> BundleError {
    let (line, column) = line_col(source, spec.span.start);
    BundleError::new(
        "BUNDLE_RESOLVE_ERROR",
        format!("Cannot resolve '{}' from '{}'", err.specifier, path.display()),
    )
    .with_path(path)
    .with_diagnostic(
        Diagnostic::error(err.message.clone()).with_location(path.to_path_buf(), line, column),
    )
}
