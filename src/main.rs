use anyhow::Result;
use clap::Parser;
use k3s_wizard::{Commands, config, handle_command, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "k3s-wizard")]
#[command(about = "K3s node installer and post-provisioning configurator", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/k3s-wizard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Show debug diagnostics
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    /// Only show errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose, cli.quiet)?;

    let config = config::load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    handle_command(&config, cli.command.unwrap_or(Commands::Menu))
}
