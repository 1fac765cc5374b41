mod app;
mod frame;
mod git_sync;
mod handler;
mod registry;
mod router;

pub use app::{AppState, GitSyncSettings};
pub use frame::{FrameType, WsFrame};
pub use git_sync::SessionGitSync;
pub use handler::ws_handler;
pub use registry::{SessionHandle, SessionInner, SessionRegistry};
pub use router::build_router;
