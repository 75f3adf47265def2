use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use formpilot_core_types::DomainKey;
use formpilot_state_store::{
    clear_cursor, load_cursor, save_cursor, FileStateStore, StateStore,
};

use super::output::OutputFormat;
use crate::config::Config;

#[derive(Args, Clone, Debug)]
pub struct StateArgs {
    /// State file override
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum StateCommand {
    /// List stored resume cursors
    Show,
    /// Set a domain's resume cursor
    Set {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        index: usize,
    },
    /// Remove a domain's resume cursor
    Clear {
        #[arg(long)]
        domain: String,
    },
}

#[derive(Debug, Serialize)]
struct CursorEntry {
    domain: String,
    index: usize,
}

const CURSOR_PREFIX: &str = "resumeIndex_";

pub async fn cmd_state(args: StateArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let path = args
        .state_file
        .unwrap_or_else(|| config.state_file.clone());
    let store = FileStateStore::open(&path)?;

    match args.command {
        StateCommand::Show => {
            let mut cursors = Vec::new();
            for key in store.keys().await? {
                let Some(host) = key.strip_prefix(CURSOR_PREFIX) else {
                    continue;
                };
                let domain = DomainKey(host.to_string());
                if let Some(index) = load_cursor(&store, &domain).await? {
                    cursors.push(CursorEntry {
                        domain: domain.to_string(),
                        index,
                    });
                }
            }
            cursors.sort_by(|a, b| a.domain.cmp(&b.domain));

            if output.is_human() {
                if cursors.is_empty() {
                    println!("No stored cursors in {}", path.display());
                } else {
                    for cursor in &cursors {
                        println!("{} -> step {}", cursor.domain, cursor.index);
                    }
                }
            } else {
                output.emit(&cursors)?;
            }
        }
        StateCommand::Set { domain, index } => {
            let domain = DomainKey::from_host(&domain);
            save_cursor(&store, &domain, index).await?;
            if output.is_human() {
                println!("{domain} -> step {index}");
            } else {
                output.emit(&CursorEntry {
                    domain: domain.to_string(),
                    index,
                })?;
            }
        }
        StateCommand::Clear { domain } => {
            let domain = DomainKey::from_host(&domain);
            clear_cursor(&store, &domain).await?;
            if output.is_human() {
                println!("Cleared cursor for {domain}");
            }
        }
    }
    Ok(())
}
