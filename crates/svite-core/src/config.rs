use crate::locate::DEFAULT_CONFIG_FILES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the Node.js binary used to execute configs.
pub const NODE_BINARY_ENV: &str = "SVITE_NODE";

/// Directory created under `node_modules` to hold transient config bundles.
pub const TEMP_DIR_NAME: &str = ".svite-temp";

/// Runtime configuration for the svite CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Node.js binary used as the host loader. `None` means `node` on `PATH`.
    pub node: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            node: None,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Create a config from the process environment (`SVITE_NODE`).
    #[must_use]
    pub fn from_env(cwd: PathBuf) -> Self {
        let node = std::env::var_os(NODE_BINARY_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            node,
            ..Self::new(cwd)
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the Node.js binary.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = Some(node.into());
        self
    }
}

/// Options for a single config resolution pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Candidate file names, in priority order.
    pub config_files: Vec<String>,
    /// Name of the transient directory created under `node_modules`.
    pub temp_dir_name: String,
    /// Explicit config file (skips candidate discovery).
    pub config_file: Option<PathBuf>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            config_files: DEFAULT_CONFIG_FILES.iter().map(|s| (*s).to_string()).collect(),
            temp_dir_name: TEMP_DIR_NAME.to_string(),
            config_file: None,
        }
    }
}

impl LoaderOptions {
    /// Use an explicit config file instead of discovery.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Replace the candidate file list.
    #[must_use]
    pub fn with_config_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config_files = files.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_loader_options() {
        let opts = LoaderOptions::default();
        assert_eq!(opts.config_files.first().map(String::as_str), Some("svite.config.js"));
        assert_eq!(opts.temp_dir_name, ".svite-temp");
        assert!(opts.config_file.is_none());
    }

    #[test]
    fn test_loader_options_builders() {
        let opts = LoaderOptions::default()
            .with_config_files(["a.config.js"])
            .with_config_file("custom.config.mjs");
        assert_eq!(opts.config_files, vec!["a.config.js".to_string()]);
        assert_eq!(opts.config_file, Some(PathBuf::from("custom.config.mjs")));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_node_binary() {
        std::env::set_var(NODE_BINARY_ENV, "/opt/node/bin/node");
        let config = Config::from_env(PathBuf::from("/project"));
        assert_eq!(config.node, Some(PathBuf::from("/opt/node/bin/node")));
        assert_eq!(config.cwd, PathBuf::from("/project"));

        std::env::set_var(NODE_BINARY_ENV, "");
        assert!(Config::from_env(PathBuf::from("/project")).node.is_none());

        std::env::remove_var(NODE_BINARY_ENV);
        assert!(Config::from_env(PathBuf::from("/project")).node.is_none());
    }

    #[test]
    fn test_config_builders() {
        let config = Config::new(PathBuf::from("/p"))
            .with_verbosity(2)
            .with_json_logs(true)
            .with_node("/usr/bin/node");
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
        assert_eq!(config.node, Some(PathBuf::from("/usr/bin/node")));
    }
}
