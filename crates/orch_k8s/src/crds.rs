//! Custom resource definitions for the sandbox lifecycle: `SandboxClaim`
//! (what the session manager creates) and `Sandbox` (what it watches for
//! readiness).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SandboxTemplateRef {
    pub name: String,
}

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "extensions.agents.x-k8s.io",
    version = "v1alpha1",
    kind = "SandboxClaim",
    plural = "sandboxclaims",
    namespaced
)]
pub struct SandboxClaimSpec {
    pub sandbox_template_ref: SandboxTemplateRef,
}

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "agents.x-k8s.io",
    version = "v1alpha1",
    kind = "Sandbox",
    plural = "sandboxes",
    namespaced,
    status = "SandboxStatus"
)]
pub struct SandboxSpec {}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct SandboxStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Hostname the sandbox's runtime HTTP API answers on, once assigned.
    #[serde(default)]
    pub runtime_base_url: Option<String>,
}

/// A `Sandbox` is Ready once any condition reports `type=Ready, status=True`.
pub fn is_ready(status: &SandboxStatus) -> bool {
    status.conditions.iter().any(|c| c.type_ == "Ready" && c.status == "True")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_ready_requires_true_status() {
        let status = SandboxStatus {
            conditions: vec![Condition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                reason: "Pending".to_string(),
                message: String::new(),
                last_transition_time: k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now()),
                observed_generation: None,
            }],
            runtime_base_url: None,
        };
        assert!(!is_ready(&status));
    }

    #[test]
    fn is_ready_ignores_unrelated_conditions() {
        let status = SandboxStatus {
            conditions: vec![Condition {
                type_: "Initialized".to_string(),
                status: "True".to_string(),
                reason: "Done".to_string(),
                message: String::new(),
                last_transition_time: k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now()),
                observed_generation: None,
            }],
            runtime_base_url: None,
        };
        assert!(!is_ready(&status));
    }
}
