use crate::bundler::BundleError;
use crate::host::HostError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a config resolution call.
///
/// Every variant is terminal for the call that produced it; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No svite config file found in {root} (looked for {})", .candidates.join(", "))]
    ConfigNotFound {
        root: PathBuf,
        candidates: Vec<String>,
    },

    #[error("Cannot determine module format of {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("Failed to write transient config file {path}: {source}")]
    TempFileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to execute config {path}: {source}")]
    ImportExecution {
        path: PathBuf,
        #[source]
        source: HostError,
    },
}

impl Error {
    /// Stable machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::Bundle(err) => err.code,
            Self::TempFileWrite { .. } => "TEMP_FILE_WRITE",
            Self::ImportExecution { .. } => "IMPORT_EXECUTION",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_lists_candidates() {
        let err = Error::ConfigNotFound {
            root: PathBuf::from("/project"),
            candidates: vec!["svite.config.js".into(), "svite.config.ts".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("/project"));
        assert!(msg.contains("svite.config.js, svite.config.ts"));
        assert_eq!(err.code(), "CONFIG_NOT_FOUND");
    }

    #[test]
    fn test_bundle_error_keeps_its_code() {
        let err: Error = BundleError::new("BUNDLE_RESOLVE_ERROR", "Cannot resolve './x'").into();
        assert_eq!(err.code(), "BUNDLE_RESOLVE_ERROR");
        assert!(err.to_string().contains("./x"));
    }

    #[test]
    fn test_temp_file_write_exposes_source() {
        let err = Error::TempFileWrite {
            path: PathBuf::from("/tmp/x.mjs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.code(), "TEMP_FILE_WRITE");
        assert!(std::error::Error::source(&err).is_some());
    }
}
