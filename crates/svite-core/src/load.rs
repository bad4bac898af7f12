//! Config resolution pipeline.
//!
//! Locate → Classify → Bundle → Materialize-and-Load → Normalize. Each call is
//! independent; nothing is cached between calls and no defaults are merged.

use crate::artifact::TransientArtifacts;
use crate::bundler::Bundler;
use crate::config::{Config, LoaderOptions};
use crate::error::Result;
use crate::format::{classify, ModuleFormat};
use crate::host::{ExportKind, HostLoader, NodeLoader};
use crate::locate::{explicit_config, locate_config, ConfigCandidate};
use crate::user_config::ConfigEnv;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// A resolved user config and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedConfig {
    /// The config file.
    pub path: PathBuf,
    pub format: ModuleFormat,
    /// Whether the default export was a function that got invoked.
    pub export_kind: ExportKind,
    /// The settled config value.
    pub config: serde_json::Value,
    /// Local files the config was built from, config file first.
    pub dependencies: Vec<PathBuf>,
}

/// Resolves `svite.config.*` files.
pub struct ConfigLoader<L: HostLoader = NodeLoader> {
    options: LoaderOptions,
    bundler: Bundler,
    artifacts: TransientArtifacts,
    loader: L,
}

impl ConfigLoader<NodeLoader> {
    /// A loader using Node.js as configured in `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_loader(NodeLoader::from_config(config))
    }
}

impl<L: HostLoader> ConfigLoader<L> {
    /// A loader using `loader` to execute bundled configs.
    #[must_use]
    pub fn with_loader(loader: L) -> Self {
        let options = LoaderOptions::default();
        Self {
            artifacts: TransientArtifacts::new(options.temp_dir_name.clone()),
            bundler: Bundler::new(),
            options,
            loader,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.artifacts = TransientArtifacts::new(options.temp_dir_name.clone());
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_bundler(mut self, bundler: Bundler) -> Self {
        self.bundler = bundler;
        self
    }

    #[must_use]
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// The config file for `root`: the explicit one if set, otherwise the first candidate found.
    pub async fn locate(&self, root: &Path) -> Result<ConfigCandidate> {
        match &self.options.config_file {
            Some(file) => explicit_config(root, file).await,
            None => locate_config(root, &self.options.config_files).await,
        }
    }

    /// Resolve the config of the project at `root` for `env`.
    pub async fn load(&self, root: &Path, env: &ConfigEnv) -> Result<LoadedConfig> {
        let start = Instant::now();
        let candidate = self.locate(root).await?;
        let loaded = self.load_file(&candidate.path, root, env).await?;
        debug!(
            path = %loaded.path.display(),
            kind = ?loaded.export_kind,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded config"
        );
        Ok(loaded)
    }

    /// Resolve a specific config file. `cwd` is the host's working directory.
    pub async fn load_file(&self, path: &Path, cwd: &Path, env: &ConfigEnv) -> Result<LoadedConfig> {
        let format = classify(path).await?;
        let artifact = self.bundler.bundle(path, format).await?;
        let loaded = self
            .artifacts
            .materialize_and_load(path, &artifact, &self.loader, env, cwd)
            .await?;

        Ok(LoadedConfig {
            path: path.to_path_buf(),
            format,
            export_kind: loaded.kind,
            config: loaded.value,
            dependencies: artifact.dependencies,
        })
    }
}

/// Resolve the config of the project at `root` with default options and Node.js.
pub async fn load_config_from_file(config: &Config, root: &Path, env: &ConfigEnv) -> Result<LoadedConfig> {
    ConfigLoader::new(config).load(root, env).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostError, LoadRequest, LoadedExport};
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records each request and answers with a fixed export.
    struct StaticLoader {
        answer: LoadedExport,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl HostLoader for StaticLoader {
        fn load<'a>(&'a self, request: LoadRequest<'a>) -> BoxFuture<'a, std::result::Result<LoadedExport, HostError>> {
            let path = url::Url::parse(request.url).unwrap().to_file_path().unwrap();
            let text = std::fs::read_to_string(path).unwrap();
            self.seen.lock().unwrap().push((request.url.to_string(), text));
            let answer = self.answer.clone();
            Box::pin(async move { Ok(answer) })
        }
    }

    fn static_loader(kind: ExportKind, value: serde_json::Value) -> StaticLoader {
        StaticLoader {
            answer: LoadedExport { kind, value },
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_load_pipeline() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::write(root.join("svite.config.mjs"), "export default { base: '/app/' };\n").unwrap();

        let loader = ConfigLoader::with_loader(static_loader(ExportKind::Value, json!({ "base": "/app/" })));
        let loaded = loader.load(&root, &ConfigEnv::serve()).await.unwrap();

        assert_eq!(loaded.path, root.join("svite.config.mjs"));
        assert_eq!(loaded.format, ModuleFormat::Declarative);
        assert_eq!(loaded.export_kind, ExportKind::Value);
        assert_eq!(loaded.config, json!({ "base": "/app/" }));
        assert_eq!(loaded.dependencies, vec![root.join("svite.config.mjs")]);

        let seen = loader.loader.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.ends_with(".mjs"));
        assert!(seen[0].1.contains("exports.default = { base: '/app/' };"));
    }

    #[tokio::test]
    async fn test_explicit_config_file() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::write(root.join("svite.config.js"), "module.exports = {};\n").unwrap();
        std::fs::write(root.join("other.cjs"), "module.exports = { other: true };\n").unwrap();

        let loader = ConfigLoader::with_loader(static_loader(ExportKind::Value, json!({})))
            .with_options(LoaderOptions::default().with_config_file("other.cjs"));
        let loaded = loader.load(&root, &ConfigEnv::build()).await.unwrap();
        assert_eq!(loaded.path, root.join("other.cjs"));
        assert_eq!(loaded.format, ModuleFormat::Legacy);
    }

    #[tokio::test]
    async fn test_errors_propagate_unchanged() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        let loader = ConfigLoader::with_loader(static_loader(ExportKind::Value, json!({})));

        let err = loader.load(&root, &ConfigEnv::serve()).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG_NOT_FOUND");

        std::fs::write(root.join("svite.config.mjs"), "import x from './missing.mjs';\n").unwrap();
        let err = loader.load(&root, &ConfigEnv::serve()).await.unwrap_err();
        assert_eq!(err.code(), "BUNDLE_RESOLVE_ERROR");

        let custom = ConfigLoader::with_loader(static_loader(ExportKind::Value, json!({})))
            .with_options(LoaderOptions::default().with_config_files(["svite.config.yaml"]));
        std::fs::write(root.join("svite.config.yaml"), "base: /").unwrap();
        let err = custom.load(&root, &ConfigEnv::serve()).await.unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }
}
