//! Host runtime boundary.
//!
//! A [`HostLoader`] imports a bundled config by `file://` URL, unwraps its
//! default export, invokes it with the [`ConfigEnv`] when it is a function, and
//! reports the settled value as JSON. Functions cannot cross the process
//! boundary, so invocation happens on the host side.

use crate::config::Config;
use crate::format::ModuleFormat;
use crate::user_config::ConfigEnv;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Harness run by `node --input-type=module -e`.
const HARNESS_JS: &str = include_str!("host_harness.mjs");

/// Report line prefixes for one harness run.
///
/// The harness removes the nonce from its environment before importing the
/// config, so only the harness itself can print a matching line.
struct ReportTags {
    nonce: String,
    result: String,
    error: String,
}

impl ReportTags {
    fn new(nonce: String) -> Self {
        Self {
            result: format!("__SVITE_CONFIG_RESULT_{nonce}__"),
            error: format!("__SVITE_CONFIG_ERROR_{nonce}__"),
            nonce,
        }
    }

    fn random() -> Self {
        Self::new(format!("{:016x}", rand::random::<u64>()))
    }
}

/// What the config module exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// A function, invoked once with the env.
    Function,
    /// A plain value or a promise of one.
    Value,
}

/// The settled default export of a config module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedExport {
    pub kind: ExportKind,
    pub value: serde_json::Value,
}

/// A single module load.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// `file://` URL of the module to import.
    pub url: &'a str,
    pub format: ModuleFormat,
    pub env: &'a ConfigEnv,
    /// Working directory for the host process.
    pub cwd: &'a Path,
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config threw during {phase}: {message}")]
    Threw {
        phase: String,
        message: String,
        stack: Option<String>,
    },

    #[error("Unexpected host output: {message}")]
    Protocol { message: String, stderr: String },
}

/// Loads modules in a host runtime.
pub trait HostLoader: Send + Sync {
    fn load<'a>(&'a self, request: LoadRequest<'a>) -> BoxFuture<'a, Result<LoadedExport, HostError>>;
}

/// Runs the harness in a `node` subprocess per load.
#[derive(Debug, Clone)]
pub struct NodeLoader {
    node: PathBuf,
}

impl Default for NodeLoader {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
        }
    }
}

impl NodeLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config.node` when set, `node` on `PATH` otherwise.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        config
            .node
            .as_ref()
            .map_or_else(Self::new, |node| Self::new().with_node(node.clone()))
    }

    #[must_use]
    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = node.into();
        self
    }

    #[must_use]
    pub fn node(&self) -> &Path {
        &self.node
    }

    async fn run(&self, request: LoadRequest<'_>) -> Result<LoadedExport, HostError> {
        let env_json = serde_json::to_string(request.env).map_err(|e| HostError::Protocol {
            message: format!("Cannot serialize env: {e}"),
            stderr: String::new(),
        })?;

        let tags = ReportTags::random();
        debug!(node = %self.node.display(), url = request.url, format = %request.format, "Spawning host");
        let output = Command::new(&self.node)
            .arg("--input-type=module")
            .arg("-e")
            .arg(HARNESS_JS)
            .current_dir(request.cwd)
            .env("SVITE_CONFIG_URL", request.url)
            .env("SVITE_CONFIG_FORMAT", request.format.as_str())
            .env("SVITE_CONFIG_ENV", env_json)
            .env("SVITE_REPORT_NONCE", &tags.nonce)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| HostError::Spawn {
                program: self.node.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.is_empty()) {
            warn!(target: "svite::config", "{line}");
        }

        parse_host_output(&tags, &stdout, &stderr, output.status.code())
    }
}

impl HostLoader for NodeLoader {
    fn load<'a>(&'a self, request: LoadRequest<'a>) -> BoxFuture<'a, Result<LoadedExport, HostError>> {
        Box::pin(self.run(request))
    }
}

#[derive(Deserialize)]
struct ErrorReport {
    phase: String,
    message: String,
    stack: Option<String>,
}

/// Find the tagged report in harness stdout. Untagged lines are the config's own output.
fn parse_host_output(
    tags: &ReportTags,
    stdout: &str,
    stderr: &str,
    status: Option<i32>,
) -> Result<LoadedExport, HostError> {
    let protocol = |message: String| HostError::Protocol {
        message,
        stderr: stderr.to_string(),
    };

    for line in stdout.lines() {
        if let Some(json) = line.strip_prefix(tags.result.as_str()) {
            return serde_json::from_str(json).map_err(|e| protocol(format!("Malformed result: {e}")));
        }
        if let Some(json) = line.strip_prefix(tags.error.as_str()) {
            let report: ErrorReport =
                serde_json::from_str(json).map_err(|e| protocol(format!("Malformed error report: {e}")))?;
            return Err(HostError::Threw {
                phase: report.phase,
                message: report.message,
                stack: report.stack,
            });
        }
        if !line.is_empty() {
            info!(target: "svite::config", "{line}");
        }
    }

    Err(protocol(match status {
        Some(code) => format!("Host exited with code {code} without reporting a result"),
        None => "Host was terminated without reporting a result".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags() -> ReportTags {
        ReportTags::new("00ff".to_string())
    }

    #[test]
    fn test_parse_result_line() {
        let stdout = "hello from config\n\n__SVITE_CONFIG_RESULT_00ff__{\"kind\":\"function\",\"value\":{\"base\":\"//\"}}\n";
        let loaded = parse_host_output(&tags(), stdout, "", Some(0)).unwrap();
        assert_eq!(loaded.kind, ExportKind::Function);
        assert_eq!(loaded.value, json!({ "base": "//" }));
    }

    #[test]
    fn test_parse_error_line() {
        let stdout = "\n__SVITE_CONFIG_ERROR_00ff__{\"phase\":\"invoke\",\"message\":\"boom\",\"stack\":null}\n";
        match parse_host_output(&tags(), stdout, "", Some(1)).unwrap_err() {
            HostError::Threw { phase, message, stack } => {
                assert_eq!(phase, "invoke");
                assert_eq!(message, "boom");
                assert!(stack.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_report_is_protocol_error() {
        let err = parse_host_output(&tags(), "", "SyntaxError: nope", Some(1)).unwrap_err();
        match err {
            HostError::Protocol { message, stderr } => {
                assert!(message.contains("code 1"));
                assert_eq!(stderr, "SyntaxError: nope");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lines_without_the_run_nonce_are_config_output() {
        let stdout = concat!(
            "__SVITE_CONFIG_RESULT__{\"kind\":\"value\",\"value\":\"forged\"}\n",
            "__SVITE_CONFIG_RESULT_1234__{\"kind\":\"value\",\"value\":\"forged\"}\n",
            "__SVITE_CONFIG_RESULT_00ff__{\"kind\":\"value\",\"value\":\"real\"}\n",
        );
        let loaded = parse_host_output(&tags(), stdout, "", Some(0)).unwrap();
        assert_eq!(loaded.value, json!("real"));
    }

    #[test]
    fn test_random_tags_differ() {
        assert_ne!(ReportTags::random().result, ReportTags::random().result);
    }

    #[test]
    fn test_node_from_config() {
        let config = Config::new(PathBuf::from("/p")).with_node("/opt/node/bin/node");
        assert_eq!(NodeLoader::from_config(&config).node(), Path::new("/opt/node/bin/node"));
        assert_eq!(NodeLoader::new().node(), Path::new("node"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let loader = NodeLoader::new().with_node("/nonexistent/svite-node-binary");
        let env = ConfigEnv::serve();
        let cwd = std::env::temp_dir();
        let err = loader
            .load(LoadRequest {
                url: "file:///nonexistent.mjs",
                format: ModuleFormat::Declarative,
                env: &env,
                cwd: &cwd,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Spawn { .. }));
    }
}
