use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use uuid::Uuid;

use crate::live::protocol::{self, ClientEvent, envelope};
use crate::live::rooms::{ClientRole, WsTx};
use crate::live::service::LiveError;
use crate::state::AppState;

/// Build the live route group: `/live`
pub fn router() -> Router<AppState> {
    Router::new().route("/live", get(ws_upgrade))
}

/// `GET /api/v1/live` — Upgrade to the live quiz `WebSocket` protocol.
async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

/// Drive one `WebSocket` connection: relay outbound messages, dispatch
/// inbound events, and clean up session state on disconnect.
async fn handle_connection(state: AppState, socket: WebSocket) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let socket_id = Uuid::new_v4();

    let _ = ws_sink
        .send(Message::Text(
            envelope("connected", json!({ "socketId": socket_id })).into(),
        ))
        .await;

    // Forward outbound messages to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sink.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // The session and role this connection is bound to, once it has joined
    let mut binding: Option<(Uuid, ClientRole)> = None;

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                handle_message(&state, socket_id, &mut binding, &tx, &text).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    if let Some((session_id, role)) = binding {
        state.live.handle_disconnect(session_id, &role);
    }
}

/// Parse and dispatch one inbound message; failures become `error` acks on
/// this connection only.
async fn handle_message(
    state: &AppState,
    socket_id: Uuid,
    binding: &mut Option<(Uuid, ClientRole)>,
    tx: &WsTx,
    text: &str,
) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(_) => {
            let _ = tx.send(protocol::error_event("VALIDATION", "Unrecognized message."));
            return;
        }
    };

    if let Err(err) = dispatch(state, socket_id, binding, tx, event).await {
        let _ = tx.send(err.to_event());
    }
}

async fn dispatch(
    state: &AppState,
    socket_id: Uuid,
    binding: &mut Option<(Uuid, ClientRole)>,
    tx: &WsTx,
    event: ClientEvent,
) -> Result<(), LiveError> {
    match event {
        ClientEvent::StartSession { token, quiz_id } => {
            let session_id = state.live.start_session(&token, quiz_id, tx.clone()).await?;
            *binding = Some((session_id, ClientRole::Host));
        }
        ClientEvent::HostJoinSession { session_id, token } => {
            state.live.host_join(session_id, &token, tx.clone())?;
            *binding = Some((session_id, ClientRole::Host));
        }
        ClientEvent::JoinSession {
            session_id,
            user_id,
            username,
        } => {
            state
                .live
                .join(session_id, user_id, &username, socket_id, tx.clone())?;
            *binding = Some((session_id, ClientRole::Participant(socket_id)));
        }
        ClientEvent::StartQuiz { session_id } => {
            require_host(binding, session_id)?;
            state.live.start_quiz(session_id);
        }
        ClientEvent::ShowQuestion {
            session_id,
            question_index,
        } => {
            require_host(binding, session_id)?;
            state.live.show_question(session_id, question_index)?;
        }
        ClientEvent::SubmitAnswer {
            session_id,
            user_id,
            answer_index,
            option_id,
        } => {
            require_session_member(binding, session_id)?;
            state
                .live
                .submit_answer(session_id, user_id, answer_index, option_id);
        }
        ClientEvent::ShowCorrectAnswer { session_id } => {
            require_host(binding, session_id)?;
            state.live.show_correct_answer(session_id);
        }
        ClientEvent::SetPhase { session_id, phase } => {
            require_host(binding, session_id)?;
            state.live.set_phase(session_id, phase);
        }
        ClientEvent::RestartGame { session_id } => {
            require_host(binding, session_id)?;
            state.live.restart_game(session_id);
        }
        ClientEvent::FinishGame { session_id } => {
            require_host(binding, session_id)?;
            state.live.finish_game(session_id);
        }
        ClientEvent::LeaveSession {
            session_id,
            user_id,
            username,
        } => {
            require_session_member(binding, session_id)?;
            state.live.leave(session_id, user_id, username.as_deref());
        }
        ClientEvent::EndSession { session_id } => {
            require_host(binding, session_id)?;
            state.live.end_session(session_id, "ended by host");
            *binding = None;
        }
        ClientEvent::GetSessionState { session_id } => {
            let snapshot = state.live.snapshot(session_id).await?;
            let _ = tx.send(envelope("sessionState", snapshot));
        }
    }
    Ok(())
}

/// Host-only operations must come from the connection seated as this
/// session's host.
fn require_host(
    binding: &Option<(Uuid, ClientRole)>,
    session_id: Uuid,
) -> Result<(), LiveError> {
    match binding {
        Some((bound, ClientRole::Host)) if *bound == session_id => Ok(()),
        _ => Err(LiveError::Unauthorized(
            "Only the session host can do that.".to_string(),
        )),
    }
}

/// Participant operations must come from a connection bound to the session.
fn require_session_member(
    binding: &Option<(Uuid, ClientRole)>,
    session_id: Uuid,
) -> Result<(), LiveError> {
    match binding {
        Some((bound, _)) if *bound == session_id => Ok(()),
        _ => Err(LiveError::Unauthorized(
            "Join the session before sending events to it.".to_string(),
        )),
    }
}
