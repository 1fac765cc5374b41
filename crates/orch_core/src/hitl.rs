//! Types for the human-in-the-loop interrupt/resume protocol (C5).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One tool call the HITL middleware wants a human to approve, edit, or
/// reject before it reaches the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    pub args: JsonValue,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedDecision {
    Approve,
    Edit,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub action_name: String,
    pub allowed_decisions: Vec<AllowedDecision>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptRequest {
    pub action_requests: Vec<ActionRequest>,
    pub review_configs: Vec<ReviewConfig>,
}

/// Present at most once per session while a run is suspended awaiting a
/// human decision (spec.md's `Pending HITL` entity). While this exists for
/// a session, `USER` frames for that session are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingHitl {
    pub interrupt_id: String,
    pub request: InterruptRequest,
    pub plan_msg_id: Option<String>,
    pub file_msg_id: Option<String>,
    pub buffer: String,
}

impl PendingHitl {
    pub fn new(interrupt_id: impl Into<String>, request: InterruptRequest) -> Self {
        Self {
            interrupt_id: interrupt_id.into(),
            request,
            plan_msg_id: None,
            file_msg_id: None,
            buffer: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Approve,
    Edit,
    Reject,
}

/// One entry in a `HITL_RESPONSE` resume payload, matching order against
/// the original `action_requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "type")]
    pub kind: DecisionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_action: Option<ActionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlResponse {
    pub interrupt_id: String,
    pub decisions: Vec<Decision>,
}

#[derive(Debug, thiserror::Error)]
pub enum HitlProtocolError {
    #[error("interrupt_id does not match")]
    InterruptIdMismatch,
    #[error("invalid HITL response: decisions length {got} does not match {expected} pending action requests")]
    DecisionCountMismatch { expected: usize, got: usize },
    #[error("invalid HITL response: decision {index} type {kind:?} is not in allowed decisions for action {action}")]
    DisallowedDecision { index: usize, kind: DecisionType, action: String },
}

/// Validates a resume response against the pending interrupt it is meant
/// to answer: interrupt-id equality, decision-count match, and that each
/// decision's type is one of the action's `allowed_decisions`.
pub fn validate_response(pending: &PendingHitl, response: &HitlResponse) -> Result<(), HitlProtocolError> {
    if pending.interrupt_id != response.interrupt_id {
        return Err(HitlProtocolError::InterruptIdMismatch);
    }
    let expected = pending.request.action_requests.len();
    if response.decisions.len() != expected {
        return Err(HitlProtocolError::DecisionCountMismatch {
            expected,
            got: response.decisions.len(),
        });
    }
    for (i, decision) in response.decisions.iter().enumerate() {
        let action_name = &pending.request.action_requests[i].name;
        let allowed = pending
            .request
            .review_configs
            .iter()
            .find(|rc| &rc.action_name == action_name)
            .map(|rc| rc.allowed_decisions.as_slice())
            .unwrap_or(&[]);
        let matches = allowed.iter().any(|a| {
            matches!(
                (a, decision.kind),
                (AllowedDecision::Approve, DecisionType::Approve)
                    | (AllowedDecision::Edit, DecisionType::Edit)
                    | (AllowedDecision::Reject, DecisionType::Reject)
            )
        });
        if !matches {
            return Err(HitlProtocolError::DisallowedDecision {
                index: i,
                kind: decision.kind,
                action: action_name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pending() -> PendingHitl {
        PendingHitl::new(
            "int-1",
            InterruptRequest {
                action_requests: vec![ActionRequest {
                    name: "execute".to_string(),
                    args: serde_json::json!({"command": "rm -rf node_modules"}),
                    description: "delete node_modules".to_string(),
                }],
                review_configs: vec![ReviewConfig {
                    action_name: "execute".to_string(),
                    allowed_decisions: vec![AllowedDecision::Approve, AllowedDecision::Edit, AllowedDecision::Reject],
                }],
            },
        )
    }

    #[test]
    fn rejects_mismatched_interrupt_id() {
        let pending = sample_pending();
        let response = HitlResponse {
            interrupt_id: "int-2".to_string(),
            decisions: vec![Decision { kind: DecisionType::Approve, edited_action: None, message: None }],
        };
        assert!(matches!(validate_response(&pending, &response), Err(HitlProtocolError::InterruptIdMismatch)));
    }

    #[test]
    fn rejects_wrong_decision_count() {
        let pending = sample_pending();
        let response = HitlResponse {
            interrupt_id: "int-1".to_string(),
            decisions: vec![],
        };
        assert!(matches!(
            validate_response(&pending, &response),
            Err(HitlProtocolError::DecisionCountMismatch { expected: 1, got: 0 })
        ));
    }

    #[test]
    fn accepts_valid_approve() {
        let pending = sample_pending();
        let response = HitlResponse {
            interrupt_id: "int-1".to_string(),
            decisions: vec![Decision { kind: DecisionType::Approve, edited_action: None, message: None }],
        };
        assert!(validate_response(&pending, &response).is_ok());
    }

    #[test]
    fn accepts_reject_with_message() {
        let pending = sample_pending();
        let response = HitlResponse {
            interrupt_id: "int-1".to_string(),
            decisions: vec![Decision {
                kind: DecisionType::Reject,
                edited_action: None,
                message: Some("don't".to_string()),
            }],
        };
        assert!(validate_response(&pending, &response).is_ok());
    }
}
