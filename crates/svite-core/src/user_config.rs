//! User configuration model.
//!
//! [`ConfigEnv`] is what an exported config function receives. [`UserConfig`]
//! is a typed view over the settled value, and [`ResolvedConfig`] is that
//! view with defaults applied for the dev server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The command the config is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Serve,
    Build,
}

impl Command {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serve => "serve",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution environment passed to a config function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEnv {
    pub command: Command,
    pub mode: String,
}

impl ConfigEnv {
    #[must_use]
    pub fn new(command: Command, mode: impl Into<String>) -> Self {
        Self {
            command,
            mode: mode.into(),
        }
    }

    /// `serve` in `development` mode.
    #[must_use]
    pub fn serve() -> Self {
        Self::new(Command::Serve, "development")
    }

    /// `build` in `production` mode.
    #[must_use]
    pub fn build() -> Self {
        Self::new(Command::Build, "production")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    #[default]
    Spa,
    Mpa,
}

/// Fields of a user config that svite interprets. Everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_type: Option<AppType>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserConfig {
    /// Coerce a settled config value. `null` and `undefined` become an empty config.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }
}

/// A user config with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub root: PathBuf,
    pub base: String,
    pub public_dir: PathBuf,
    pub mode: String,
    pub app_type: AppType,
    pub command: Command,
    /// The config file it came from, if any.
    pub config_file: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResolvedConfig {
    /// Apply defaults. Relative `root` and `publicDir` are resolved against
    /// `project_root` and the resolved root respectively.
    #[must_use]
    pub fn resolve(
        user: UserConfig,
        env: &ConfigEnv,
        project_root: &Path,
        config_file: Option<PathBuf>,
    ) -> Self {
        let root = match user.root {
            Some(root) if root.is_absolute() => root,
            Some(root) => project_root.join(root),
            None => project_root.to_path_buf(),
        };
        let public_dir = user.public_dir.unwrap_or_else(|| PathBuf::from("public"));
        let public_dir = if public_dir.is_absolute() {
            public_dir
        } else {
            root.join(public_dir)
        };

        Self {
            root,
            base: user.base.unwrap_or_else(|| "/".to_string()),
            public_dir,
            mode: user.mode.unwrap_or_else(|| env.mode.clone()),
            app_type: user.app_type.unwrap_or_default(),
            command: env.command,
            config_file,
            extra: user.extra,
        }
    }
}
