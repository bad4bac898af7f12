//! TypeScript stripping for config sources.
//!
//! Config files written as `.ts`, `.mts` or `.cts` have their type syntax
//! removed before the bundler analyzes them. Everything else passes through
//! untouched. The rest of svite never calls SWC directly; it goes through
//! [`CompilerBackend`].

#[cfg(feature = "swc")]
pub mod ast_parser;
pub mod swc;

pub use swc::SwcBackend;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A located message produced while compiling or bundling a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Human-readable message.
    pub message: String,
    /// Source file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Line number (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Column number (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Create a diagnostic with no location yet.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    /// Set the source location.
    #[must_use]
    pub fn with_location(mut self, file: PathBuf, line: u32, column: u32) -> Self {
        self.file = Some(file);
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {}", self.message)?;
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => write!(f, " at {}:{line}:{col}", file.display()),
            _ => Ok(()),
        }
    }
}

/// Compiler error.
#[derive(Debug, Clone)]
pub struct CompilerError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Compiler diagnostics (if available).
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilerError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_PARSE_ERROR", message)
    }

    #[must_use]
    pub fn transform_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_TRANSFORM_ERROR", message)
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        for diag in &self.diagnostics {
            write!(f, "\n  - {diag}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}

/// Compiler backend used by the bundler to strip types.
///
/// The trait is `Send + Sync` so one backend can serve concurrent loads.
pub trait CompilerBackend: Send + Sync {
    /// Backend name (e.g. "swc").
    fn name(&self) -> &'static str;

    /// Strip TypeScript syntax from `source`, keeping `import`/`export` statements.
    fn strip_types(&self, path: &Path, source: &str) -> Result<String, CompilerError>;
}

/// Whether `path` names a TypeScript source.
#[must_use]
pub fn is_typescript(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ts" | "mts" | "cts" | "tsx"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_error_display() {
        let error = CompilerError::parse_error("Unexpected token");
        assert!(error.to_string().contains("COMPILER_PARSE_ERROR"));
        assert!(error.to_string().contains("Unexpected token"));
    }

    #[test]
    fn test_compiler_error_with_diagnostics() {
        let diag = Diagnostic::error("Missing semicolon")
            .with_location(PathBuf::from("svite.config.ts"), 10, 5);

        let error = CompilerError::parse_error("Parse failed").with_diagnostics(vec![diag]);

        let display = error.to_string();
        assert!(display.contains("svite.config.ts:10:5"));
        assert!(display.contains("Missing semicolon"));
    }

    #[test]
    fn test_diagnostic_without_location() {
        assert_eq!(Diagnostic::error("Unexpected token").to_string(), "error: Unexpected token");
    }

    #[test]
    fn test_is_typescript() {
        assert!(is_typescript(Path::new("svite.config.ts")));
        assert!(is_typescript(Path::new("svite.config.mts")));
        assert!(is_typescript(Path::new("svite.config.cts")));
        assert!(!is_typescript(Path::new("svite.config.js")));
        assert!(!is_typescript(Path::new("svite.config.mjs")));
    }
}
