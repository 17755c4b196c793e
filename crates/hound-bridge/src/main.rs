mod bootstrap_helpers;
mod html_bootstrap;
mod startup_config;
mod startup_runtime;

use anyhow::Result;
use clap::Parser;
use hound_cli::Cli;

use crate::bootstrap_helpers::init_tracing;
use crate::startup_config::load_bridge_config;
use crate::startup_runtime::run_bridge;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_bridge_config(&cli.config_dir)?;
    init_tracing(config.debug);
    run_bridge(cli, config).await
}
