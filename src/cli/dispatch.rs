use std::path::Path;

use anyhow::Result;

use super::env::CliArgs;
use super::info::cmd_info;
use super::run::cmd_run;
use super::state::cmd_state;
use super::validate::cmd_validate;
use crate::cli::commands::Commands;
use crate::config::Config;

pub async fn dispatch(cli: &CliArgs, config: &Config, config_path: &Path) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, config, cli.output).await,
        Commands::Validate(args) => cmd_validate(args, config, cli.output).await,
        Commands::State(args) => cmd_state(args, config, cli.output).await,
        Commands::Info => cmd_info(config, config_path, cli.output),
    }
}
