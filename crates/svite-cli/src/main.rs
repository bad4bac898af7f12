#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

mod commands;
mod logging;

use clap::{Parser, ValueEnum};
use miette::Result;
use std::path::PathBuf;
use svite_core::Config;

#[derive(Parser, Debug)]
#[command(name = "svite")]
#[command(author, version, about = "Resolve and inspect svite.config.* files", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(flatten)]
    dev: DevArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Load the project config for the dev server (default)
    Dev(DevArgs),

    /// Print the resolved project config
    Config {
        /// Project root (defaults to the working directory)
        root: Option<PathBuf>,

        /// Command the config is resolved for
        #[arg(long, value_enum, default_value_t = CommandArg::Serve)]
        command: CommandArg,

        /// Mode passed to the config (defaults to development for serve, production for build)
        #[arg(long)]
        mode: Option<String>,

        /// Use this config file instead of searching for svite.config.*
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[derive(clap::Args, Debug, Clone)]
struct DevArgs {
    /// Project root (defaults to the working directory)
    root: Option<PathBuf>,

    /// Port the dev server would listen on
    #[arg(long)]
    port: Option<u16>,

    /// Mode passed to the config
    #[arg(short, long, default_value = "development")]
    mode: String,

    /// Use this config file instead of searching for svite.config.*
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CommandArg {
    Serve,
    Build,
}

impl From<CommandArg> for svite_core::Command {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::Serve => Self::Serve,
            CommandArg::Build => Self::Build,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::from_env(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) => commands::version::run(),
        Some(Commands::Config {
            root,
            command,
            mode,
            config: config_file,
        }) => {
            let command = svite_core::Command::from(command);
            let action = commands::config::ConfigAction {
                root: commands::project_root(&config, root.as_deref()),
                mode: mode.unwrap_or_else(|| default_mode(command).to_string()),
                command,
                config_file,
            };
            commands::config::run(&config, action, cli.json)
        }
        Some(Commands::Dev(args)) => run_dev(&config, args, cli.json),
        None => run_dev(&config, cli.dev, cli.json),
    }
}

fn run_dev(config: &Config, args: DevArgs, json: bool) -> Result<()> {
    let action = commands::dev::DevAction {
        root: commands::project_root(config, args.root.as_deref()),
        port: args.port,
        mode: args.mode,
        config_file: args.config,
    };
    commands::dev::run(config, action, json)
}

fn default_mode(command: svite_core::Command) -> &'static str {
    match command {
        svite_core::Command::Serve => "development",
        svite_core::Command::Build => "production",
    }
}
