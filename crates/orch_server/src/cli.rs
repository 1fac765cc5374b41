//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};

/// Agent orchestration service: drives an LLM deep agent through multi-turn
/// edit sessions against ephemeral Kubernetes sandboxes.
#[derive(Parser)]
#[command(name = "orch-server", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(short, long, global = true, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal output for humans
    #[default]
    Text,
    /// Structured JSON for AI and machine consumption
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the WebSocket server
    Serve {
        /// Address to bind the HTTP/WebSocket listener to
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,
        /// Kubernetes namespace sandbox claims are created in
        #[arg(long, env = "ORCH_K8S_NAMESPACE", default_value = "default")]
        namespace: String,
        /// SandboxTemplate name new claims reference
        #[arg(long, env = "ORCH_SANDBOX_TEMPLATE", default_value = "default")]
        template_name: String,
        /// Path to a sqlite checkpoint database; omit to checkpoint in memory only
        #[arg(long, env = "ORCH_CHECKPOINT_DB")]
        checkpoint_db: Option<String>,
        /// Directory the Git Sync Engine keeps its local clone cache in
        #[arg(long, env = "ORCH_GIT_CACHE_DIR", default_value = "/var/lib/orch-server/git-cache")]
        git_cache_dir: String,
    },
    /// Inspect the configuration this process would run with
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved runtime configuration and flag missing environment variables
    Show,
}
