//! Integration tests for the load pipeline with an in-process host loader.
//!
//! These tests verify:
//! - The loader sees a bundle written under `node_modules/.svite-temp`
//! - The transient file is gone after success and after failure
//! - Concurrent loads use distinct transient files and get their own config

use futures::future::{join_all, BoxFuture};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use svite_core::{
    ConfigEnv, ConfigLoader, Error, ExportKind, HostError, HostLoader, LoadRequest, LoadedExport,
};
use tempfile::tempdir;

/// Answers with the bundle's `exports.default` line, or throws when told to.
#[derive(Default)]
struct RecordingLoader {
    fail: bool,
    seen: Mutex<Vec<PathBuf>>,
}

impl RecordingLoader {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl HostLoader for RecordingLoader {
    fn load<'a>(&'a self, request: LoadRequest<'a>) -> BoxFuture<'a, Result<LoadedExport, HostError>> {
        Box::pin(async move {
            let path = url::Url::parse(request.url).unwrap().to_file_path().unwrap();
            let text = tokio::fs::read_to_string(&path).await.unwrap();
            self.seen.lock().unwrap().push(path);

            // Let other loads interleave while this file exists.
            tokio::time::sleep(Duration::from_millis(10)).await;

            if self.fail {
                return Err(HostError::Threw {
                    phase: "load".into(),
                    message: "config exploded".into(),
                    stack: None,
                });
            }
            let default_line = text
                .lines()
                .find(|l| l.contains("exports.default ="))
                .unwrap_or_default()
                .trim()
                .to_string();
            Ok(LoadedExport {
                kind: ExportKind::Value,
                value: json!({ "line": default_line, "mode": request.env.mode }),
            })
        })
    }
}

fn project() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    std::fs::create_dir_all(root.join("node_modules")).unwrap();
    (dir, root)
}

async fn wait_removed(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_transient_file_location_and_cleanup_after_success() {
    let (_dir, root) = project();
    std::fs::write(root.join("svite.config.mjs"), "export default { base: '/' };\n").unwrap();

    let recorder = std::sync::Arc::new(RecordingLoader::default());
    let loader = ConfigLoader::with_loader(SharedLoader(recorder.clone()));
    let loaded = loader.load(&root, &ConfigEnv::serve()).await.unwrap();
    assert_eq!(loaded.config["mode"], "development");
    assert_eq!(loaded.config["line"], "exports.default = { base: '/' };");

    let seen = recorder.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].parent(), Some(root.join("node_modules/.svite-temp").as_path()));
    let name = seen[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("svite.config.mjs.timestamp-"));
    assert!(name.ends_with(".mjs"));
    assert!(wait_removed(&seen[0]).await);
}

#[tokio::test]
async fn test_cleanup_after_success_and_failure() {
    let (_dir, root) = project();
    std::fs::write(root.join("svite.config.mjs"), "export default {};\n").unwrap();
    let env = ConfigEnv::serve();

    ConfigLoader::with_loader(RecordingLoader::default())
        .load(&root, &env)
        .await
        .unwrap();

    let failing = ConfigLoader::with_loader(RecordingLoader::failing());
    let err = failing.load(&root, &env).await.unwrap_err();
    assert_eq!(err.code(), "IMPORT_EXECUTION");
    match &err {
        Error::ImportExecution { path, source } => {
            assert_eq!(path, &root.join("svite.config.mjs"));
            assert!(source.to_string().contains("config exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let temp = root.join("node_modules/.svite-temp");
    for _ in 0..100 {
        if std::fs::read_dir(&temp).unwrap().next().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("transient files left in {}", temp.display());
}

#[tokio::test]
async fn test_transient_path_removed_after_failure() {
    let (_dir, root) = project();
    std::fs::write(root.join("svite.config.cjs"), "module.exports = {};\n").unwrap();

    let recorder = std::sync::Arc::new(RecordingLoader::failing());
    let loader = ConfigLoader::with_loader(SharedLoader(recorder.clone()));
    assert!(loader.load(&root, &ConfigEnv::build()).await.is_err());

    let seen = recorder.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].extension().and_then(|e| e.to_str()), Some("cjs"));
    assert!(wait_removed(&seen[0]).await);
}

/// Lets a test keep a handle on the loader it hands to `ConfigLoader`.
struct SharedLoader(std::sync::Arc<RecordingLoader>);

impl HostLoader for SharedLoader {
    fn load<'a>(&'a self, request: LoadRequest<'a>) -> BoxFuture<'a, Result<LoadedExport, HostError>> {
        self.0.load(request)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_use_distinct_files() {
    let (_dir, root) = project();
    for i in 0..8 {
        let sub = root.join(format!("app{i}"));
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("svite.config.mjs"), format!("export default {{ id: {i} }};\n")).unwrap();
    }

    let recorder = std::sync::Arc::new(RecordingLoader::default());
    let loader = ConfigLoader::with_loader(SharedLoader(recorder.clone()));
    let env = ConfigEnv::serve();

    let roots: Vec<PathBuf> = (0..8).map(|i| root.join(format!("app{i}"))).collect();
    let results = join_all(roots.iter().map(|r| loader.load(r, &env))).await;

    for (i, result) in results.into_iter().enumerate() {
        let loaded = result.unwrap();
        assert_eq!(loaded.config["line"], format!("exports.default = {{ id: {i} }};"));
    }

    let mut seen = recorder.seen();
    assert_eq!(seen.len(), 8);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 8, "transient paths must be unique");
    for path in &seen {
        assert!(path.starts_with(root.join("node_modules/.svite-temp")));
        assert!(wait_removed(path).await);
    }
}

#[tokio::test]
async fn test_same_root_concurrently() {
    let (_dir, root) = project();
    std::fs::write(root.join("svite.config.mjs"), "export default { same: true };\n").unwrap();

    let recorder = std::sync::Arc::new(RecordingLoader::default());
    let loader = ConfigLoader::with_loader(SharedLoader(recorder.clone()));
    let env = ConfigEnv::serve();

    let results = join_all((0..5).map(|_| loader.load(&root, &env))).await;
    assert!(results.iter().all(Result::is_ok));

    let mut seen = recorder.seen();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[test]
fn test_no_transient_file_after_runtime_shutdown() {
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.js"),
        "export default () => ({ base: \"//\", dev: { port: 8088 } });\n",
    )
    .unwrap();

    let recorder = std::sync::Arc::new(RecordingLoader::default());
    let loader = ConfigLoader::with_loader(SharedLoader(recorder.clone()));
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime
        .block_on(loader.load(&root, &ConfigEnv::serve()))
        .unwrap();
    drop(runtime);

    let seen = recorder.seen();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].exists());
    let temp = root.join("node_modules/.svite-temp");
    assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 0);
}
