//! Transient config artifacts.
//!
//! A bundled config is written next to the project's dependencies so that
//! bare imports resolve the same way they would from the original file, loaded
//! through a [`HostLoader`], and removed again whatever the outcome.

use crate::bundler::BundleArtifact;
use crate::config::TEMP_DIR_NAME;
use crate::error::{Error, Result};
use crate::host::{HostLoader, LoadRequest, LoadedExport};
use crate::paths::{find_dependency_root, parent_dir};
use crate::user_config::ConfigEnv;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A file that is removed when dropped.
///
/// Removal is a synchronous unlink in `Drop`, so it also completes when the
/// runtime that created the file is shutting down. Failures are logged and ignored.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    /// Create `<basename>.timestamp-<ms>-<hex><ext>` in `dir` with `contents`.
    ///
    /// The file is created exclusively; an existing file with the same name is an error.
    pub async fn create(dir: &Path, original: &Path, ext: &str, contents: &str) -> Result<Self> {
        let path = dir.join(unique_name(original, ext));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| Error::TempFileWrite {
                path: path.clone(),
                source,
            })?;
        let transient = Self { path };

        let written = async {
            file.write_all(contents.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(source) = written {
            return Err(Error::TempFileWrite {
                path: transient.path.clone(),
                source,
            });
        }

        debug!(path = %transient.path.display(), bytes = contents.len(), "Wrote transient file");
        Ok(transient)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URL of the file.
    #[must_use]
    pub fn url(&self) -> String {
        url::Url::from_file_path(&self.path)
            .map_or_else(|()| format!("file://{}", self.path.display()), |u| u.to_string())
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("failed to clean up transient file {}: {e}", self.path.display());
        }
    }
}

fn unique_name(original: &Path, ext: &str) -> String {
    let base = original
        .file_name()
        .map_or_else(|| "config".into(), |n| n.to_string_lossy());
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let token: u64 = rand::random();
    format!("{base}.timestamp-{millis}-{token:016x}{ext}")
}

/// Writes bundles to transient files and loads them.
#[derive(Debug, Clone)]
pub struct TransientArtifacts {
    temp_dir_name: String,
}

impl Default for TransientArtifacts {
    fn default() -> Self {
        Self::new(TEMP_DIR_NAME)
    }
}

impl TransientArtifacts {
    #[must_use]
    pub fn new(temp_dir_name: impl Into<String>) -> Self {
        Self {
            temp_dir_name: temp_dir_name.into(),
        }
    }

    /// Directory for artifacts of `original`.
    ///
    /// `<dependency root>/node_modules/<temp dir>` when a dependency root
    /// exists (created if needed), the directory of `original` otherwise.
    pub async fn temp_dir(&self, original: &Path) -> Result<PathBuf> {
        let start = parent_dir(original);
        let Some(root) = find_dependency_root(start).await else {
            return Ok(start.to_path_buf());
        };

        let dir = root.join("node_modules").join(&self.temp_dir_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| Error::TempFileWrite {
                path: dir.clone(),
                source,
            })?;
        Ok(dir)
    }

    /// Write `artifact` to a fresh transient file.
    pub async fn write(&self, original: &Path, artifact: &BundleArtifact) -> Result<TransientFile> {
        let dir = self.temp_dir(original).await?;
        TransientFile::create(&dir, original, artifact.format.extension(), &artifact.source_text).await
    }

    /// Write `artifact`, load it with `loader`, and remove it again.
    pub async fn materialize_and_load<L>(
        &self,
        original: &Path,
        artifact: &BundleArtifact,
        loader: &L,
        env: &ConfigEnv,
        cwd: &Path,
    ) -> Result<LoadedExport>
    where
        L: HostLoader + ?Sized,
    {
        let file = self.write(original, artifact).await?;
        let url = file.url();

        let loaded = loader
            .load(LoadRequest {
                url: &url,
                format: artifact.format,
                env,
                cwd,
            })
            .await;
        drop(file);

        loaded.map_err(|source| Error::ImportExecution {
            path: original.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ModuleFormat;
    use tempfile::tempdir;

    #[test]
    fn test_unique_name_shape() {
        let name = unique_name(Path::new("/p/svite.config.ts"), ".mjs");
        assert!(name.starts_with("svite.config.ts.timestamp-"));
        assert!(name.ends_with(".mjs"));
        assert_ne!(name, unique_name(Path::new("/p/svite.config.ts"), ".mjs"));
    }

    #[tokio::test]
    async fn test_temp_dir_under_node_modules() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("node_modules")).unwrap();
        std::fs::create_dir_all(root.join("config")).unwrap();

        let temp = TransientArtifacts::default()
            .temp_dir(&root.join("config/svite.config.js"))
            .await
            .unwrap();
        assert_eq!(temp, root.join("node_modules/.svite-temp"));
        assert!(temp.is_dir());
    }

    #[tokio::test]
    async fn test_temp_dir_falls_back_beside_original() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        // Only valid when no ancestor of the temp dir has node_modules.
        if find_dependency_root(&root).await.is_some() {
            return;
        }
        let temp = TransientArtifacts::default()
            .temp_dir(&root.join("svite.config.js"))
            .await
            .unwrap();
        assert_eq!(temp, root);
    }

    #[tokio::test]
    async fn test_create_is_exclusive_and_removed_on_drop() {
        let dir = tempdir().unwrap();
        let file = TransientFile::create(dir.path(), Path::new("svite.config.js"), ".cjs", "module.exports = 1;")
            .await
            .unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "module.exports = 1;");
        assert!(file.url().starts_with("file://"));

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_runtime_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svite.config.js.timestamp-0-0.mjs");
        std::fs::write(&path, "").unwrap();
        drop(TransientFile { path: path.clone() });
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_temp_file_write() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = TransientFile::create(&missing, Path::new("svite.config.js"), ".mjs", "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TEMP_FILE_WRITE");
    }

    #[tokio::test]
    async fn test_write_uses_format_extension() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("node_modules")).unwrap();
        let artifact = BundleArtifact {
            source_text: "export default {};".into(),
            format: ModuleFormat::Declarative,
            dependencies: vec![root.join("svite.config.ts")],
        };
        let file = TransientArtifacts::default()
            .write(&root.join("svite.config.ts"), &artifact)
            .await
            .unwrap();
        assert!(file.path().starts_with(root.join("node_modules/.svite-temp")));
        assert_eq!(file.path().extension().and_then(|e| e.to_str()), Some("mjs"));
    }
}
