//! `svite dev` command implementation.
//!
//! Resolves the project config for `serve` and reports the settings the dev
//! server would start with. Serving itself lives outside this crate.

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use svite_core::{
    Config, ConfigEnv, ConfigLoader, LoadedConfig, LoaderOptions, ResolvedConfig, UserConfig,
    VERSION,
};

const DEFAULT_PORT: u16 = 5173;

/// Dev command action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Project root.
    pub root: PathBuf,
    /// Port override from the command line.
    pub port: Option<u16>,
    /// Mode (e.g. "development", "production").
    pub mode: String,
    /// Explicit config file (overrides auto-discovery).
    pub config_file: Option<PathBuf>,
}

#[derive(Serialize)]
struct DevResultJson<'a> {
    ok: bool,
    port: u16,
    elapsed_ms: u64,
    config: &'a ResolvedConfig,
}

pub fn run(config: &Config, action: DevAction, json: bool) -> Result<()> {
    let mut options = LoaderOptions::default();
    if let Some(file) = &action.config_file {
        options = options.with_config_file(file);
    }
    let loader = ConfigLoader::new(config).with_options(options);
    let env = ConfigEnv::new(svite_core::Command::Serve, action.mode.clone());

    let start = Instant::now();
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let loaded = match runtime.block_on(loader.load(&action.root, &env)) {
        Ok(loaded) => loaded,
        Err(e) => return Err(super::fail(e, json)),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let user = UserConfig::from_value(loaded.config.clone())
        .map_err(|e| miette::miette!(code = "CONFIG_INVALID", "{}: {e}", loaded.path.display()))?;
    let resolved = ResolvedConfig::resolve(user, &env, &action.root, Some(loaded.path.clone()));
    let port = action.port.or_else(|| config_port(&loaded)).unwrap_or(DEFAULT_PORT);

    if json {
        let result = DevResultJson {
            ok: true,
            port,
            elapsed_ms,
            config: &resolved,
        };
        println!("{}", serde_json::to_string(&result).into_diagnostic()?);
    } else {
        print_human(&loaded, &resolved, port, elapsed_ms);
    }
    Ok(())
}

/// `dev.port` from the user config, if it is a valid port number.
fn config_port(loaded: &LoadedConfig) -> Option<u16> {
    loaded
        .config
        .pointer("/dev/port")
        .and_then(serde_json::Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
}

fn print_human(loaded: &LoadedConfig, resolved: &ResolvedConfig, port: u16, elapsed_ms: u64) {
    println!();
    println!("  \x1b[1;32msvite v{VERSION}\x1b[0m  config loaded in {elapsed_ms} ms");
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  Config:  {} ({}, {:?})",
        loaded.path.display(),
        loaded.format,
        loaded.export_kind
    );
    println!("  \x1b[32m➜\x1b[0m  Root:    {}", resolved.root.display());
    println!("  \x1b[32m➜\x1b[0m  Base:    {}", resolved.base);
    println!("  \x1b[32m➜\x1b[0m  Public:  {}", resolved.public_dir.display());
    println!("  \x1b[32m➜\x1b[0m  Mode:    {}", resolved.mode);
    println!("  \x1b[32m➜\x1b[0m  Port:    {port}");
    if loaded.dependencies.len() > 1 {
        println!(
            "  \x1b[2m   {} local files bundled\x1b[0m",
            loaded.dependencies.len()
        );
    }
    println!();
}
