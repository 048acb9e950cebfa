//! Server-sent-events transport.
//!
//! Routes:
//! - `GET /sse`       opens an event stream; the first event is `endpoint`
//! - `POST /messages` submits a JSON-RPC message; the response arrives on the stream
//! - `GET /health`    transport status

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR};
use crate::server::{ServerContext, handle_request};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tsdef_core::config::SessionRouting;
use tsdef_core::constants;

/// Open event streams, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Sessions>,
    counter: AtomicU64,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<String, mpsc::UnboundedSender<String>>,
    latest: Option<String>,
}

/// Removes its session from the registry when the event stream is dropped.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.registry.inner.lock() {
            sessions.by_id.remove(&self.id);
            if sessions.latest.as_deref() == Some(self.id.as_str()) {
                sessions.latest = None;
            }
        }
        debug!(session_id = %self.id, "SSE session closed");
    }
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new session; it becomes the latest one.
    pub fn open(self: &Arc<Self>) -> (String, mpsc::UnboundedReceiver<String>, SessionGuard) {
        let id = self.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut sessions) = self.inner.lock() {
            sessions.by_id.insert(id.clone(), tx);
            sessions.latest = Some(id.clone());
        }
        let guard = SessionGuard {
            registry: Arc::clone(self),
            id: id.clone(),
        };
        (id, rx, guard)
    }

    /// Pick the session a message should be delivered to.
    pub fn route(
        &self,
        routing: SessionRouting,
        session_id: Option<&str>,
    ) -> Option<(String, mpsc::UnboundedSender<String>)> {
        let sessions = self.inner.lock().ok()?;
        let id = match routing {
            SessionRouting::BySessionId => session_id?.to_string(),
            SessionRouting::LatestSession => sessions.latest.clone()?,
        };
        let sender = sessions.by_id.get(&id)?.clone();
        Some((id, sender))
    }

    pub fn active(&self) -> usize {
        self.inner.lock().map(|s| s.by_id.len()).unwrap_or(0)
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mut hasher = blake3::Hasher::new();
        hasher.update(&n.to_le_bytes());
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        hasher.finalize().to_hex()[..32].to_string()
    }
}

/// Shared state for the SSE transport.
pub struct SseState {
    pub context: Arc<ServerContext>,
    pub sessions: Arc<SessionRegistry>,
    pub routing: SessionRouting,
}

impl SseState {
    pub fn new(context: Arc<ServerContext>) -> Self {
        let routing = context.config.transport.session_routing;
        Self {
            context,
            sessions: SessionRegistry::new(),
            routing,
        }
    }
}

pub fn router(state: Arc<SseState>) -> Router {
    Router::new()
        .route(constants::SSE_PATH, get(sse_handler))
        .route(constants::MESSAGES_PATH, post(messages_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the SSE transport on the configured bind address and port.
pub async fn run_sse_server(context: Arc<ServerContext>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!(
        "{}:{}",
        context.config.transport.bind_addr, context.config.transport.port
    );
    let state = Arc::new(SseState::new(context));
    let routing = state.routing;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, ?routing, "MCP SSE server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /sse
async fn sse_handler(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx, guard) = state.sessions.open();
    info!(session_id = %id, "SSE session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?sessionId={}", constants::MESSAGES_PATH, id));
    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let message = rx.recv().await?;
        Some((
            Ok::<_, Infallible>(Event::default().event("message").data(message)),
            (rx, guard),
        ))
    });

    let events = stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages);
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// POST /messages
async fn messages_handler(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessagesQuery>,
    body: Bytes,
) -> impl IntoResponse {
    let Some((session_id, sender)) = state
        .sessions
        .route(state.routing, query.session_id.as_deref())
    else {
        warn!(requested = ?query.session_id, "no SSE session for message");
        return (StatusCode::NOT_FOUND, "No active session").into_response();
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON-RPC message: {}", e),
            )
                .into_response();
        }
    };

    let context = Arc::clone(&state.context);
    tokio::spawn(async move {
        let id = request.id.clone();
        let result = tokio::task::spawn_blocking(move || handle_request(&context, &request)).await;
        let response = match result {
            Ok(Some(response)) => response,
            Ok(None) => return,
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {}", e)),
        };
        match serde_json::to_string(&response) {
            Ok(text) => {
                if sender.send(text).is_err() {
                    debug!(%session_id, "SSE session closed before response");
                }
            }
            Err(e) => warn!(%session_id, error = %e, "failed to encode response"),
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

/// GET /health
async fn health_handler(State(state): State<Arc<SseState>>) -> impl IntoResponse {
    let routing = match state.routing {
        SessionRouting::BySessionId => "by_session_id",
        SessionRouting::LatestSession => "latest_session",
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "transport": "sse",
        "session_routing": routing,
        "active_sessions": state.sessions.active(),
    }))
}
