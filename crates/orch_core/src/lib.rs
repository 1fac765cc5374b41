pub mod autoheal;
pub mod chat;
pub mod checkpoint;
pub mod controller;
pub mod error;
pub mod event;
pub mod hitl;
pub mod journal;
pub mod session;
pub mod tool_call;
pub mod turn;

pub use autoheal::{DenyReason, RuntimeAutoHealConfig, RuntimeErrorAutohealState};
pub use chat::{cap_history, ChatHistoryRow, ChatRole};
pub use checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer, SqliteCheckpointer};
pub use controller::{ControllerState, FinalStatus, QaResult};
pub use error::{OrchError, Result};
pub use event::SessionEvent;
pub use hitl::{
    ActionRequest, AllowedDecision, Decision, DecisionType, HitlProtocolError, HitlResponse,
    InterruptRequest, PendingHitl, ReviewConfig, validate_response,
};
pub use journal::{JournalEntry, ToolJournal};
pub use session::{GitMetadata, PermissionMode, Session, SessionId, SessionStatus};
pub use tool_call::{ToolResultData, ToolStatus, ToolUse};
pub use turn::{ContentBlock, Role, TokenUsage, Turn};
