pub mod config_cmd;
pub mod test_module;
pub mod update;

use crate::config::EdlConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "edl")]
#[command(version, about = "External Dynamic List server for firewalls and proxies")]
pub struct Cli {
    /// Path to edl.toml
    #[arg(long, global = true, env = "EDL_CONFIG", default_value = "edl.toml")]
    pub config: PathBuf,

    /// Path to data directory (overrides config file)
    #[arg(long, global = true, env = "EDL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Listen port (overrides config file)
    #[arg(long, global = true, env = "EDL_PORT")]
    pub port: Option<String>,

    /// EDL server address for client commands
    #[arg(
        long,
        global = true,
        env = "EDL_ADDR",
        default_value = "http://localhost:8080"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the EDL over HTTP
    Serve,
    /// Check the configuration the way the server would
    TestModule,
    /// Rebuild the list of a running on-demand server
    UpdateEdl(UpdateEdlArgs),
    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Serve => "serve",
            Commands::TestModule => "test-module",
            Commands::UpdateEdl(_) => "update-edl",
            Commands::Config(ConfigCommands::Validate) => "config validate",
            Commands::Config(ConfigCommands::Show) => "config show",
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateEdlArgs {
    /// Indicator query for the new list
    #[arg(long)]
    pub query: String,
    /// text | csv | json | json-seq; the server's configured format when omitted
    #[arg(long)]
    pub format: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Check edl.toml for errors
    Validate,
    /// Print the effective configuration
    Show,
}

/// Load the config file and apply command line overrides.
pub fn load_config(cli: &Cli) -> EdlConfig {
    let mut config = EdlConfig::load_or_default(&cli.config);
    if let Some(dir) = &cli.data_dir {
        config.server.data_dir = dir.clone();
    }
    if let Some(port) = &cli.port {
        config.server.port = port.clone();
    }
    config
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve => crate::serve::run(load_config(&cli)).await,
        Commands::TestModule => test_module::run(&load_config(&cli)),
        Commands::UpdateEdl(ref args) => update::run(args, &cli.server).await,
        Commands::Config(ref cmd) => config_cmd::run(cmd, &cli),
    }
}
