//! Session Manager (C1): creates and watches Kubernetes `SandboxClaim`s,
//! waits for the backing `Sandbox` to report Ready, and hands callers a
//! policy-wrapped runtime client once it is.

pub mod crds;
pub mod error;
pub mod session_manager;

pub use crds::{Sandbox, SandboxClaim, SandboxClaimSpec, SandboxSpec, SandboxStatus, SandboxTemplateRef};
pub use error::{K8sError, Result};
pub use session_manager::{SessionEnv, SessionManager, SessionManagerConfig};
