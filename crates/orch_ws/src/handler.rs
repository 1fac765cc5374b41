//! The `GET /ws` upgrade and the per-socket send/receive loop: one task per
//! socket owns the send side, draining the agent event stream; the receive
//! side accepts `INIT`, `USER`, `HITL_RESPONSE`, and `PING`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use orch_core::{ContentBlock, ControllerState, Decision, Role, Session, SessionEvent, SessionId, Turn};
use serde::Deserialize;
use serde_json::json;
use observability::http_request_span;
use tokio::sync::mpsc;
use tracing::{debug, warn, Instrument};

use crate::app::AppState;
use crate::frame::{FrameType, WsFrame};
use crate::git_sync::SessionGitSync;
use crate::registry::SessionHandle;

const DEBOUNCE: Duration = Duration::from_millis(200);

pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

pub async fn handle_socket(mut socket: WebSocket, app: Arc<AppState>) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    handle_socket_inner(&mut socket, app).instrument(http_request_span!("WS", "/ws", connection_id)).await
}

async fn handle_socket_inner(socket: &mut WebSocket, app: Arc<AppState>) {
    let (out_tx, mut out_rx) = mpsc::channel::<WsFrame>(256);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsFrame>(&text) {
                            Ok(frame) => dispatch(&app, frame, out_tx.clone()).await,
                            Err(e) => send_frame(socket, &WsFrame::error("", format!("invalid frame: {e}"))).await,
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("websocket recv error: {e}");
                        break;
                    }
                }
            }
            Some(frame) = out_rx.recv() => {
                send_frame(socket, &frame).await;
            }
        }
    }

    debug!("websocket connection closed");
}

async fn send_frame(socket: &mut WebSocket, frame: &WsFrame) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = socket.send(Message::Text(json.into())).await;
    }
}

async fn send_error(out_tx: &mpsc::Sender<WsFrame>, session_id: &str, message: impl Into<String>) {
    let _ = out_tx.send(WsFrame::error(session_id, message)).await;
}

async fn dispatch(app: &Arc<AppState>, frame: WsFrame, out_tx: mpsc::Sender<WsFrame>) {
    match frame.frame_type {
        FrameType::Init => handle_init(app, frame, out_tx).await,
        FrameType::User => handle_user(app, frame, out_tx).await,
        FrameType::HitlResponse => handle_hitl_response(app, frame, out_tx).await,
        FrameType::Ping => {
            let _ = out_tx.send(WsFrame::new(FrameType::Ping, frame.session_id, json!({}))).await;
        }
        other => {
            send_error(&out_tx, &frame.session_id, format!("unsupported client frame type {other:?}")).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitData {
    user_sub: String,
    user_email: String,
    template_id: String,
    slug: String,
}

async fn handle_init(app: &Arc<AppState>, frame: WsFrame, out_tx: mpsc::Sender<WsFrame>) {
    let session_id = frame.session_id.clone();
    let data: InitData = match serde_json::from_value(frame.data) {
        Ok(d) => d,
        Err(e) => {
            send_error(&out_tx, &session_id, format!("invalid INIT payload: {e}")).await;
            return;
        }
    };

    let restored = app.checkpointer.get_latest(&session_id, "controller").ok().flatten();
    let state = restored.map(|c| c.state).unwrap_or_default();
    let session = Session::new(SessionId(session_id.clone()), data.user_sub.clone(), data.user_email.clone(), data.template_id.clone(), data.slug.clone());

    let handle = app.registry.get_or_create(&session_id, session, state).await;

    let sid = SessionId(session_id.clone());
    let env = match app.k8s.ensure_session(&sid, Some(data.slug.as_str())).await {
        Ok(env) => env,
        Err(e) => {
            send_error(&out_tx, &session_id, format!("sandbox not ready: {e}")).await;
            return;
        }
    };
    let policy = match app.k8s.get_backend(&session_id).await {
        Ok(p) => p,
        Err(e) => {
            send_error(&out_tx, &session_id, format!("sandbox backend unavailable: {e}")).await;
            return;
        }
    };

    let has_pending_resume_state = {
        let mut inner = handle.inner.lock().await;
        inner.session.preview_url = Some(env.preview_url.clone());
        inner.policy = Some(policy);
        !inner.state.pending_regular_tools.is_empty() || !inner.state.pending_flagged_indices.is_empty()
    };

    let pending = handle.pending_hitl.lock().await.clone();

    let _ = out_tx
        .send(WsFrame::new(
            FrameType::Init,
            session_id.clone(),
            json!({
                "preview_url": env.preview_url,
                "template_id": data.template_id,
                "reconnected": env.reconnected,
                "pending_hitl": pending,
            }),
        ))
        .await;

    if let Some(pending) = pending {
        let _ = out_tx.send(WsFrame::new(FrameType::HitlRequest, session_id, serde_json::to_value(&pending).unwrap_or(json!({})))).await;
    } else if has_pending_resume_state {
        // A checkpoint carries paused tool calls from a prior process, but this
        // process never saw the original InterruptRequest — nothing to safely
        // re-display. The operator must resolve this out of band (or restart
        // the run) until PendingHitl itself is made part of the checkpoint.
        warn!(session = %session_id, "restored checkpoint has paused tool calls but no in-memory InterruptRequest to replay");
    }
}

#[derive(Debug, Deserialize)]
struct UserData {
    text: String,
}

async fn handle_user(app: &Arc<AppState>, frame: WsFrame, out_tx: mpsc::Sender<WsFrame>) {
    let session_id = frame.session_id.clone();
    let Some(handle) = app.registry.get(&session_id).await else {
        send_error(&out_tx, &session_id, "session not initialized; send INIT first").await;
        return;
    };

    if handle.pending_hitl.lock().await.is_some() {
        send_error(&out_tx, &session_id, "HITL approval pending").await;
        return;
    }

    let run_lock = handle.run_lock.clone();
    let Ok(run_guard) = run_lock.try_lock_owned() else {
        send_error(&out_tx, &session_id, "a run is already in progress for this session").await;
        return;
    };

    let data: UserData = match serde_json::from_value(frame.data) {
        Ok(d) => d,
        Err(e) => {
            send_error(&out_tx, &session_id, format!("invalid USER payload: {e}")).await;
            return;
        }
    };

    let policy = handle.inner.lock().await.policy.clone();
    let Some(policy) = policy else {
        send_error(&out_tx, &session_id, "sandbox not ready; send INIT first").await;
        return;
    };

    let app = app.clone();
    tokio::spawn(async move {
        run_session(app, handle, session_id, data.text, policy, out_tx, run_guard).await;
    });
}

async fn handle_hitl_response(app: &Arc<AppState>, frame: WsFrame, out_tx: mpsc::Sender<WsFrame>) {
    let session_id = frame.session_id.clone();
    let Some(handle) = app.registry.get(&session_id).await else {
        send_error(&out_tx, &session_id, "session not initialized").await;
        return;
    };

    let Some(pending) = handle.pending_hitl.lock().await.clone() else {
        send_error(&out_tx, &session_id, "no HITL interrupt pending for this session").await;
        return;
    };

    let response: orch_core::HitlResponse = match serde_json::from_value(frame.data) {
        Ok(r) => r,
        Err(e) => {
            send_error(&out_tx, &session_id, format!("invalid HITL_RESPONSE payload: {e}")).await;
            return;
        }
    };

    if let Err(e) = orch_core::hitl::validate_response(&pending, &response) {
        send_error(&out_tx, &session_id, e.to_string()).await;
        return;
    }

    let sender = handle.hitl_tx.lock().await.clone();
    let Some(sender) = sender else {
        send_error(&out_tx, &session_id, "no active run awaiting this decision").await;
        return;
    };

    if sender.send(response.decisions).await.is_err() {
        send_error(&out_tx, &session_id, "run ended before the decision could be applied").await;
    }
}

async fn run_session(
    app: Arc<AppState>,
    handle: Arc<SessionHandle>,
    session_id: String,
    text: String,
    policy: Arc<orch_sandbox::Policy>,
    out_tx: mpsc::Sender<WsFrame>,
    _run_guard: tokio::sync::OwnedMutexGuard<()>,
) {
    let _ = out_tx.send(WsFrame::new(FrameType::UpdateInProgress, session_id.clone(), json!({}))).await;

    let (event_tx, event_rx) = mpsc::channel(256);
    let forward_handle = spawn_forwarder(event_rx, out_tx.clone(), session_id.clone());

    let (session, mut state) = {
        let mut inner = handle.inner.lock().await;
        inner.state.push_message(Turn::user().with_block(ContentBlock::text(&text)));
        (inner.session.clone(), inner.state.clone())
    };

    let git: Arc<dyn orch_agent::GitSync> = build_git_sync(&app, &session, &policy);

    let mut runtime = match orch_agent::Runtime::new(session, policy, app.runtime_config.clone(), event_tx) {
        Ok(r) => r,
        Err(e) => {
            send_error(&out_tx, &session_id, format!("runtime init failed: {e}")).await;
            let _ = forward_handle.await;
            return;
        }
    };

    let outcome = orch_agent::run_controller(&mut runtime, &mut state, app.checkpointer.as_ref(), &session_id, git.as_ref(), None).await;
    persist_state(&handle, &state).await;
    let _ = forward_handle.await;

    finish_run(app, handle, runtime, state, outcome, git, out_tx, session_id).await;
}

/// Builds the Git Sync Engine adapter for one session, or [`orch_agent::NoGitSync`]
/// when the project has no remote configured.
fn build_git_sync(app: &AppState, session: &Session, policy: &Arc<orch_sandbox::Policy>) -> Arc<dyn orch_agent::GitSync> {
    match &session.git.repo_http_url {
        Some(url) => {
            let remote = orch_git::RemoteConfig { remote_url: url.clone(), branch: app.git_settings.branch.clone(), token: app.git_settings.token.clone() };
            Arc::new(SessionGitSync::new(app.git_engine.clone(), policy.clone(), session.slug.clone(), remote))
        }
        None => Arc::new(orch_agent::NoGitSync),
    }
}

/// Drains outcomes (pausing for and applying HITL decisions as needed)
/// until the run reaches `Finished` or a fatal error, then sends the
/// closing `UPDATE_COMPLETED`/`ERROR` frame and releases the run lock by
/// letting this function (and its captured guard) return.
async fn finish_run(
    app: Arc<AppState>,
    handle: Arc<SessionHandle>,
    mut runtime: orch_agent::Runtime,
    mut state: ControllerState,
    mut outcome: orch_agent::Result<orch_agent::ControllerOutcome>,
    git: Arc<dyn orch_agent::GitSync>,
    out_tx: mpsc::Sender<WsFrame>,
    session_id: String,
) {
    loop {
        match outcome {
            Ok(orch_agent::ControllerOutcome::Finished) => {
                emit_final_answer(&out_tx, &session_id, &state).await;
                let _ = out_tx.send(WsFrame::new(FrameType::UpdateCompleted, session_id.clone(), json!({}))).await;
                return;
            }
            Ok(orch_agent::ControllerOutcome::Paused(pending)) => {
                *handle.pending_hitl.lock().await = Some(pending.clone());
                let (hitl_tx, mut hitl_rx) = mpsc::channel::<Vec<Decision>>(1);
                *handle.hitl_tx.lock().await = Some(hitl_tx);

                let _ = out_tx
                    .send(WsFrame::new(FrameType::HitlRequest, session_id.clone(), serde_json::to_value(&pending).unwrap_or(json!({}))))
                    .await;
                let _ = out_tx.send(WsFrame::new(FrameType::AgentFinal, session_id.clone(), json!({ "text": "Awaiting approval…" }))).await;

                let Some(decisions) = hitl_rx.recv().await else {
                    // Socket (or session) torn down while waiting; leave the
                    // pending interrupt in place for a future reconnect.
                    return;
                };

                *handle.pending_hitl.lock().await = None;
                *handle.hitl_tx.lock().await = None;

                let (event_tx, event_rx) = mpsc::channel(256);
                let forward_handle = spawn_forwarder(event_rx, out_tx.clone(), session_id.clone());
                runtime.event_tx = event_tx;

                let resumed = orch_agent::resume_controller(&mut runtime, &mut state, decisions, app.checkpointer.as_ref(), &session_id, git.as_ref(), None).await;
                persist_state(&handle, &state).await;
                let _ = forward_handle.await;

                outcome = resumed;
            }
            Err(e) => {
                send_error(&out_tx, &session_id, e.to_string()).await;
                let _ = out_tx.send(WsFrame::new(FrameType::UpdateCompleted, session_id.clone(), json!({}))).await;
                return;
            }
        }
    }
}

async fn persist_state(handle: &Arc<SessionHandle>, state: &ControllerState) {
    handle.inner.lock().await.state = state.clone();
}

/// Spawns a debounced/redacted event forwarder (C7) feeding `out_tx`.
fn spawn_forwarder(event_rx: mpsc::Receiver<SessionEvent>, out_tx: mpsc::Sender<WsFrame>, session_id: String) -> tokio::task::JoinHandle<()> {
    let (adapted_tx, adapted_rx) = mpsc::channel(256);
    tokio::spawn(orch_agent::stream::adapt_stream(event_rx, adapted_tx, DEBOUNCE));
    tokio::spawn(forward_adapted(adapted_rx, out_tx, session_id))
}

async fn forward_adapted(mut rx: mpsc::Receiver<SessionEvent>, out_tx: mpsc::Sender<WsFrame>, session_id: String) {
    while let Some(event) = rx.recv().await {
        for frame in event_to_frames(&session_id, event) {
            if out_tx.send(frame).await.is_err() {
                return;
            }
        }
    }
}

fn event_to_frames(session_id: &str, event: SessionEvent) -> Vec<WsFrame> {
    match event {
        SessionEvent::TurnStart { .. } | SessionEvent::TurnEnd | SessionEvent::SessionEnd { .. } => Vec::new(),
        SessionEvent::TextDelta { text } => vec![WsFrame::new(FrameType::AgentPartial, session_id, json!({ "text": text }))],
        SessionEvent::ThinkingDelta { thinking } => vec![WsFrame::new(FrameType::TraceEvent, session_id, json!({ "phase": "thinking", "thinking": thinking }))],
        SessionEvent::ToolStart { tool_use } => vec![WsFrame::new(FrameType::TraceEvent, session_id, json!({ "phase": "tool_start", "tool": tool_use }))],
        SessionEvent::ToolDone { tool_use_id, result } => {
            vec![WsFrame::new(FrameType::TraceEvent, session_id, json!({ "phase": "tool_end", "tool_use_id": tool_use_id, "result": result }))]
        }
        SessionEvent::UpdateFile { path, content, deleted } => vec![WsFrame::new(FrameType::UpdateFile, session_id, json!({ "path": path, "content": content, "deleted": deleted }))],
        SessionEvent::HitlRequest { interrupt_id, request } => {
            vec![WsFrame::new(FrameType::HitlRequest, session_id, json!({ "interrupt_id": interrupt_id, "request": request }))]
        }
        SessionEvent::QaResult(result) => vec![WsFrame::new(FrameType::TraceEvent, session_id, json!({ "phase": "qa_result", "result": result }))],
        SessionEvent::GitSynced { commit_sha, pushed } => {
            vec![WsFrame::new(FrameType::TraceEvent, session_id, json!({ "phase": "git_synced", "commit_sha": commit_sha, "pushed": pushed }))]
        }
        SessionEvent::Status { message } => vec![WsFrame::new(FrameType::UpdateFile, session_id, json!({ "label": message }))],
        SessionEvent::Error { error } => vec![WsFrame::new(FrameType::Error, session_id, json!({ "message": error }))],
    }
}

/// Emits `AGENT_FINAL` with the last assistant message once a run actually
/// finishes, matching the "accumulated buffer, or `final_from_end`
/// fallback" behavior — here the fallback, since the debounced partials
/// already carried the buffer incrementally.
async fn emit_final_answer(out_tx: &mpsc::Sender<WsFrame>, session_id: &str, state: &ControllerState) {
    let text = state
        .messages
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .and_then(|t| t.blocks.iter().find_map(|b| if let ContentBlock::Text { text } = b { Some(text.clone()) } else { None }));

    if let Some(text) = text {
        let _ = out_tx.send(WsFrame::new(FrameType::AgentFinal, session_id.to_string(), json!({ "text": text }))).await;
    }
}
