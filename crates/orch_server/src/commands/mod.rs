//! Command dispatch.

pub mod config;
pub mod serve;

use crate::cli::{Cli, Command};
use anyhow::Result;

pub async fn handle(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { listen, namespace, template_name, checkpoint_db, git_cache_dir } => {
            serve::handle(listen, namespace, template_name, checkpoint_db, git_cache_dir).await
        }
        Command::Config { action } => config::handle(action).await,
    }
}
