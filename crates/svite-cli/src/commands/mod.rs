pub mod config;
pub mod dev;
pub mod version;

use miette::{miette, Report};
use serde::Serialize;
use std::path::{Path, PathBuf};
use svite_core::paths::absolutize;
use svite_core::Config;

/// Absolute project root: `root` relative to the working directory, or the working directory.
pub fn project_root(config: &Config, root: Option<&Path>) -> PathBuf {
    match root {
        Some(root) => absolutize(root, &config.cwd),
        None => absolutize(&config.cwd, &config.cwd),
    }
}

#[derive(Serialize)]
struct ErrorJson {
    code: String,
    message: String,
}

/// Error result for JSON output.
#[derive(Serialize)]
struct ErrorResult {
    ok: bool,
    error: ErrorJson,
}

/// Report a resolution error and exit with status 1.
///
/// With `json`, a single `{ "ok": false, "error": { code, message } }` object
/// goes to stdout; otherwise the error is rendered by miette.
pub fn fail(err: svite_core::Error, json: bool) -> Report {
    if json {
        let result = ErrorResult {
            ok: false,
            error: ErrorJson {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        };
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }

    let help = match &err {
        svite_core::Error::ConfigNotFound { .. } => {
            Some("create a svite.config.js in the project root, or pass --config")
        }
        svite_core::Error::ImportExecution { .. } => {
            Some("the config file was bundled but threw while it was loaded or invoked")
        }
        _ => None,
    };
    match help {
        Some(help) => miette!(code = err.code(), help = help, "{err}"),
        None => miette!(code = err.code(), "{err}"),
    }
}
