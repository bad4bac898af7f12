//! `svite config` command implementation.

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use svite_core::{Config, ConfigEnv, ConfigLoader, LoaderOptions};

/// Config command action.
#[derive(Debug, Clone)]
pub struct ConfigAction {
    /// Project root.
    pub root: PathBuf,
    pub command: svite_core::Command,
    pub mode: String,
    /// Explicit config file (overrides auto-discovery).
    pub config_file: Option<PathBuf>,
}

/// Run the config command.
///
/// With `json`, prints the whole [`svite_core::LoadedConfig`] as one JSON
/// object with `"ok": true`. Otherwise prints the config value, pretty-printed.
pub fn run(config: &Config, action: ConfigAction, json: bool) -> Result<()> {
    let mut options = LoaderOptions::default();
    if let Some(file) = &action.config_file {
        options = options.with_config_file(file);
    }
    let loader = ConfigLoader::new(config).with_options(options);
    let env = ConfigEnv::new(action.command, action.mode);

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let loaded = match runtime.block_on(loader.load(&action.root, &env)) {
        Ok(loaded) => loaded,
        Err(e) => return Err(super::fail(e, json)),
    };

    if json {
        let mut value = serde_json::to_value(&loaded).into_diagnostic()?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("ok".to_string(), serde_json::Value::Bool(true));
        }
        println!("{}", serde_json::to_string(&value).into_diagnostic()?);
    } else {
        println!("{}", serde_json::to_string_pretty(&loaded.config).into_diagnostic()?);
    }
    Ok(())
}
