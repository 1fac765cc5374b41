//! Service entry point for orch-server.

mod cli;
mod commands;
mod output;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    output::init(cli.output);

    let _ = dotenvy::dotenv();
    if let Err(e) = observability::init_from_env() {
        eprintln!("failed to initialize tracing: {e}");
    }

    if let Err(e) = commands::handle(cli).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
