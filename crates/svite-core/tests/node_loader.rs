//! End-to-end config loading through a real Node.js process.
//!
//! Every test returns early when no `node` binary is available.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use svite_core::{Config, ConfigEnv, ConfigLoader, Error, ExportKind, HostError, ModuleFormat};
use tempfile::tempdir;

fn node_available() -> bool {
    let node = std::env::var_os("SVITE_NODE").unwrap_or_else(|| "node".into());
    let found = std::process::Command::new(node)
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !found {
        eprintln!("skipping: node not available");
    }
    found
}

fn project() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    std::fs::create_dir_all(root.join("node_modules")).unwrap();
    (dir, root)
}

fn loader(root: &Path) -> ConfigLoader {
    ConfigLoader::new(&Config::from_env(root.to_path_buf()))
}

async fn assert_temp_dir_empties(root: &Path) {
    let temp = root.join("node_modules/.svite-temp");
    for _ in 0..100 {
        if std::fs::read_dir(&temp).map_or(true, |mut d| d.next().is_none()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("transient files left in {}", temp.display());
}

#[tokio::test]
async fn test_function_export_scenario() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.js"),
        "export default () => ({ base: \"//\", dev: { port: 8088 } });\n",
    )
    .unwrap();

    let env = ConfigEnv::serve();
    let loaded = loader(&root).load(&root, &env).await.unwrap();

    assert_eq!(loaded.format, ModuleFormat::Legacy);
    assert_eq!(loaded.export_kind, ExportKind::Function);
    assert_eq!(loaded.config, json!({ "base": "//", "dev": { "port": 8088 } }));
    assert_temp_dir_empties(&root).await;
}

#[tokio::test]
async fn test_plain_object_legacy_and_declarative() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.cjs"),
        "const path = require('node:path');\nmodule.exports = { sep: path.sep, nested: { list: [1, 2] } };\n",
    )
    .unwrap();
    let loaded = loader(&root).load(&root, &ConfigEnv::build()).await.unwrap();
    assert_eq!(loaded.export_kind, ExportKind::Value);
    assert_eq!(loaded.config["nested"], json!({ "list": [1, 2] }));
    assert_eq!(loaded.config["sep"], std::path::MAIN_SEPARATOR.to_string());

    std::fs::remove_file(root.join("svite.config.cjs")).unwrap();
    std::fs::write(
        root.join("svite.config.mjs"),
        "import { join } from 'node:path';\nexport default Promise.resolve({ out: join('a', 'b') });\n",
    )
    .unwrap();
    let loaded = loader(&root).load(&root, &ConfigEnv::build()).await.unwrap();
    assert_eq!(loaded.format, ModuleFormat::Declarative);
    assert_eq!(loaded.config["out"], Path::new("a").join("b").to_string_lossy().as_ref());
}

#[tokio::test]
async fn test_function_receives_env() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "export default async ({ command, mode }) => ({ command, mode, called: true });\n",
    )
    .unwrap();

    let env = ConfigEnv::new(svite_core::Command::Build, "staging");
    let loaded = loader(&root).load(&root, &env).await.unwrap();
    assert_eq!(
        loaded.config,
        json!({ "command": "build", "mode": "staging", "called": true })
    );
}

#[tokio::test]
async fn test_context_values_follow_original_files() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::create_dir_all(root.join("config")).unwrap();
    std::fs::write(
        root.join("config/paths.mjs"),
        "export const dir = __dirname;\nexport const file = __filename;\nexport const url = import.meta.url;\nexport const metaDir = import.meta.dirname;\n",
    )
    .unwrap();
    std::fs::write(
        root.join("svite.config.ts"),
        "import * as paths from './config/paths.mjs';\nconst own: string = __dirname;\nexport default { paths: { ...paths }, own };\n",
    )
    .unwrap();
    std::fs::write(root.join("package.json"), r#"{ "type": "module" }"#).unwrap();

    let loaded = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap();
    let paths = &loaded.config["paths"];
    let config_dir = root.join("config");
    let file = config_dir.join("paths.mjs");

    assert_eq!(paths["dir"], config_dir.to_string_lossy().as_ref());
    assert_eq!(paths["file"], file.to_string_lossy().as_ref());
    assert_eq!(paths["url"], url::Url::from_file_path(&file).unwrap().as_str());
    assert_eq!(paths["metaDir"], config_dir.to_string_lossy().as_ref());
    assert_eq!(loaded.config["own"], root.to_string_lossy().as_ref());
    assert_eq!(
        loaded.dependencies,
        vec![root.join("svite.config.ts"), file]
    );
}

#[tokio::test]
async fn test_user_shadowing_of_dirname() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "import { dirname } from 'node:path';\nimport { fileURLToPath } from 'node:url';\nconst __dirname = dirname(fileURLToPath(import.meta.url));\nexport default { root: __dirname };\n",
    )
    .unwrap();

    let loaded = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap();
    assert_eq!(loaded.config["root"], root.to_string_lossy().as_ref());
}

#[tokio::test]
async fn test_throwing_config_is_import_execution() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "export default () => { throw new Error('bad config'); };\n",
    )
    .unwrap();

    let err = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap_err();
    match err {
        Error::ImportExecution {
            source: HostError::Threw { phase, message, .. },
            ..
        } => {
            assert_eq!(phase, "invoke");
            assert_eq!(message, "bad config");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_temp_dir_empties(&root).await;
}

#[tokio::test]
async fn test_missing_external_fails_at_load() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "import plugin from 'svite-plugin-that-does-not-exist';\nexport default { plugins: [plugin] };\n",
    )
    .unwrap();

    let err = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap_err();
    assert_eq!(err.code(), "IMPORT_EXECUTION");
    assert_temp_dir_empties(&root).await;
}

#[tokio::test]
async fn test_function_invoked_once_per_load() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "import { appendFileSync } from 'node:fs';\nimport { join } from 'node:path';\nexport default (env) => {\n  appendFileSync(join(__dirname, 'calls.log'), env.mode + '\\n');\n  return { ok: true };\n};\n",
    )
    .unwrap();
    let calls = || std::fs::read_to_string(root.join("calls.log")).unwrap_or_default();

    let loader = loader(&root);
    loader.load(&root, &ConfigEnv::serve()).await.unwrap();
    assert_eq!(calls(), "development\n");

    loader.load(&root, &ConfigEnv::build()).await.unwrap();
    assert_eq!(calls(), "development\nproduction\n");
}

#[tokio::test]
async fn test_top_level_await_in_declarative_graph() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("port.mjs"),
        "export const port = await new Promise((r) => setTimeout(() => r(5174), 10));\n",
    )
    .unwrap();
    std::fs::write(
        root.join("helper.cjs"),
        "module.exports = { async double(x) { return await Promise.resolve(x * 2); } };\n",
    )
    .unwrap();
    std::fs::write(
        root.join("svite.config.mjs"),
        "import { port } from './port.mjs';\nimport helper from './helper.cjs';\nconst v = await Promise.resolve(5);\nexport default { v, port, doubled: await helper.double(v) };\n",
    )
    .unwrap();

    let loaded = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap();
    assert_eq!(loaded.config, json!({ "v": 5, "port": 5174, "doubled": 10 }));
}

#[tokio::test]
async fn test_hashbang_line_is_dropped() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "#!/usr/bin/env node\nexport default { a: 1 };\n",
    )
    .unwrap();

    let loaded = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap();
    assert_eq!(loaded.config, json!({ "a": 1 }));
}

#[tokio::test]
async fn test_printed_report_lines_cannot_replace_result() {
    if !node_available() {
        return;
    }
    let (_dir, root) = project();
    std::fs::write(
        root.join("svite.config.mjs"),
        "console.log('__SVITE_CONFIG_RESULT__{\"kind\":\"value\",\"value\":\"forged\"}');\nconsole.log('__SVITE_CONFIG_RESULT_' + process.env.SVITE_REPORT_NONCE + '__{\"kind\":\"value\",\"value\":\"forged\"}');\nexport default { real: true };\n",
    )
    .unwrap();

    let loaded = loader(&root).load(&root, &ConfigEnv::serve()).await.unwrap();
    assert_eq!(loaded.config, json!({ "real": true }));
}
