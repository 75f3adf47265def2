use clap::Subcommand;

use super::run::RunArgs;
use super::state::StateArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the playbook matching a URL against a page fixture
    Run(RunArgs),

    /// Parse and check every playbook in a directory
    Validate(ValidateArgs),

    /// Inspect and override persisted resume cursors
    State(StateArgs),

    /// Show version, build metadata, and effective paths
    Info,
}
