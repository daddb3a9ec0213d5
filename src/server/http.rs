//! HTTP transport for the server
//!
//! Two routes carry the whole protocol. `GET /sse` opens the event stream:
//! the first frame announces the message-submission endpoint with a fresh
//! session id, and every completed response for that session follows as a
//! `message` event. `POST /messages/?session_id=...` accepts one JSON-RPC
//! message, dispatches it, and returns `202 Accepted`; the response travels
//! back on the stream, not in the POST body.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::{IncomingMessage, JsonRpcError, JsonRpcResponse};
use crate::server::dispatch::Dispatcher;

/// Shared server state: the dispatcher plus the live-session table
pub struct AppState {
    dispatcher: Dispatcher,
    sessions: RwLock<HashMap<String, mpsc::UnboundedSender<JsonRpcResponse>>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Number of currently open sessions
    pub fn session_count(&self) -> usize {
        self.read_sessions().len()
    }

    fn register_session(&self) -> (String, mpsc::UnboundedReceiver<JsonRpcResponse>) {
        let session_id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.write_sessions().insert(session_id.clone(), tx);
        (session_id, rx)
    }

    fn remove_session(&self, session_id: &str) {
        self.write_sessions().remove(session_id);
    }

    fn sender(&self, session_id: &str) -> Option<mpsc::UnboundedSender<JsonRpcResponse>> {
        self.read_sessions().get(session_id).cloned()
    }

    fn read_sessions(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, mpsc::UnboundedSender<JsonRpcResponse>>>
    {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, mpsc::UnboundedSender<JsonRpcResponse>>>
    {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Build the protocol router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages/", post(messages_handler))
        .with_state(state)
}

/// Bind and run the server until it fails or is shut down
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Removes the session entry when the event stream is dropped
struct SessionGuard {
    state: Arc<AppState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        debug!(session_id = %self.session_id, "event stream closed");
        self.state.remove_session(&self.session_id);
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (session_id, mut rx) = state.register_session();
    info!(session_id = %session_id, "event stream opened");

    let endpoint = format!("/messages/?session_id={}", session_id);
    let guard = SessionGuard {
        state: state.clone(),
        session_id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint));

        while let Some(response) = rx.recv().await {
            match Event::default().event("message").json_data(&response) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!(error = %e, "failed to encode response event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn messages_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    Json(body): Json<Value>,
) -> Response {
    let Some(tx) = state.sender(&query.session_id) else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let message: IncomingMessage = match serde_json::from_value(body) {
        Ok(message) => message,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid message: {}", e),
            )
                .into_response();
        }
    };

    let request_id = match &message {
        IncomingMessage::Request(request) => Some(request.id.clone()),
        IncomingMessage::Notification(_) => None,
    };

    // Handlers are synchronous by contract; keep them off the async workers.
    let worker_state = state.clone();
    let response = match tokio::task::spawn_blocking(move || {
        worker_state.dispatcher.handle_message(message)
    })
    .await
    {
        Ok(response) => response,
        Err(e) => request_id.map(|id| {
            JsonRpcResponse::error(
                id,
                JsonRpcError::internal_error(format!("handler panicked: {}", e)),
            )
        }),
    };

    if let Some(response) = response {
        if tx.send(response).is_err() {
            // The stream went away while we were dispatching.
            state.remove_session(&query.session_id);
            return (StatusCode::NOT_FOUND, "session closed").into_response();
        }
    }

    StatusCode::ACCEPTED.into_response()
}
