#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Configuration loading core for svite.
//!
//! Finds a project's `svite.config.*` file, bundles it together with its local
//! imports into a single module, writes that module to a transient file the
//! host runtime can import by URL, executes it, and hands back the resolved
//! configuration value.

pub mod artifact;
pub mod bundler;
pub mod compiler;
pub mod config;
pub mod error;
pub mod format;
pub mod host;
pub mod load;
pub mod locate;
pub mod paths;
pub mod user_config;
pub mod version;

pub use artifact::{TransientArtifacts, TransientFile};
pub use bundler::{BundleArtifact, BundleError, Bundler};
pub use config::{Config, LoaderOptions};
pub use error::{Error, Result};
pub use format::{classify, ModuleFormat};
pub use host::{ExportKind, HostError, HostLoader, LoadRequest, LoadedExport, NodeLoader};
pub use load::{load_config_from_file, ConfigLoader, LoadedConfig};
pub use locate::{locate_config, ConfigCandidate, DEFAULT_CONFIG_FILES};
pub use paths::find_dependency_root;
pub use user_config::{AppType, Command, ConfigEnv, ResolvedConfig, UserConfig};
pub use version::VERSION;
