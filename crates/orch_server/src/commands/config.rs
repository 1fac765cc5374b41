//! `orch-server config` subcommands.

use anyhow::Result;
use orch_agent::{LlmProvider, RuntimeConfig};

use crate::cli::ConfigAction;
use crate::output;

const REQUIRED_FOR_PROVIDER: &[(LlmProvider, &str)] = &[(LlmProvider::Anthropic, "ANTHROPIC_API_KEY"), (LlmProvider::ZAI, "ZAI_API_KEY")];

pub async fn handle(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(),
    }
}

fn show() -> Result<()> {
    let config = RuntimeConfig::from_env();

    output::header("Runtime configuration");
    output::kv("model", &config.model);
    output::kv("provider", &format!("{:?}", config.provider));
    output::kv("max_tokens", &config.max_tokens.to_string());
    output::kv("max_rounds", &config.max_rounds.to_string());
    output::kv("qa_enabled", &config.qa_enabled.to_string());
    output::kv("git_sync_enabled", &config.git_sync_enabled.to_string());
    println!();

    output::header("Kubernetes");
    output::kv("ORCH_K8S_NAMESPACE", &env_or_unset("ORCH_K8S_NAMESPACE"));
    output::kv("ORCH_SANDBOX_TEMPLATE", &env_or_unset("ORCH_SANDBOX_TEMPLATE"));
    println!();

    output::header("Git sync");
    output::kv("ORCH_GIT_BRANCH", &env_or_unset("ORCH_GIT_BRANCH"));
    output::kv("ORCH_GIT_TOKEN", &mask_if_set("ORCH_GIT_TOKEN"));
    println!();

    if let Some((_, var)) = REQUIRED_FOR_PROVIDER.iter().find(|(p, _)| *p == config.provider) {
        if std::env::var(var).is_err() {
            output::warning(&format!("provider is {:?} but {var} is not set", config.provider));
        } else {
            output::success(&format!("{var} is set"));
        }
    }

    Ok(())
}

fn env_or_unset(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| "(unset)".to_string())
}

fn mask_if_set(name: &str) -> String {
    match std::env::var(name) {
        Ok(v) if v.len() > 8 => format!("{}...{}", &v[..4], &v[v.len() - 4..]),
        Ok(v) => "*".repeat(v.len()),
        Err(_) => "(unset)".to_string(),
    }
}
