//! HTTP/WebSocket Handlers

use axum::{
    Json,
    extract::{
        FromRequestParts, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::provider::ModelInfo;
use agent_core::{RunContext, Session, SessionId};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub llm_connected: bool,
    pub shop_connected: bool,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Credentials
// ============================================================================

/// Caller's store credential, from `Authorization: Bearer` or the `token`
/// cookie. Requests without one are rejected with 401.
pub struct Credential(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Credential {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        token_from_headers(&parts.headers).map(Self).ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication error: no token provided",
            )
        })
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let cookie = || {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .find_map(|pair| pair.trim().strip_prefix("token="))
    };

    bearer
        .filter(|t| !t.is_empty())
        .or_else(|| cookie().filter(|t| !t.is_empty()))
        .map(str::to_string)
}

/// Session owner key: hex SHA-256 of the credential
fn owner_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ============================================================================
// Conversation
// ============================================================================

/// Answer one message, inside a stored conversation when an id is given.
///
/// The run stops early once `cancel` fires.
async fn converse(
    state: &AppState,
    token: &str,
    message: &str,
    conversation_id: Option<&str>,
    transport: &'static str,
    cancel: CancellationToken,
) -> Result<String, ApiError> {
    if message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "Message must not be empty",
        ));
    }

    let ctx = RunContext::with_token(token)
        .cancellation(cancel)
        .metadata("transport", transport.into());
    let Some(id) = conversation_id else {
        return Ok(state.agent.invoke(message, &ctx).await);
    };

    let owner = owner_key(token);
    let id = SessionId::from_string(id);
    let stored = state.sessions.load(&id).map_err(session_error)?;

    let mut session = match stored {
        Some(session) if session.is_owned_by(Some(&owner)) => session,
        Some(_) => {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                "CONVERSATION_NOT_FOUND",
                "Conversation not found",
            ));
        }
        None => Session::new(id, Some(owner)),
    };

    session.transcript.truncate_to_fit();
    let reply = state.agent.reply(&mut session.transcript, message, &ctx).await;
    session.touch();
    state.sessions.save(&session).map_err(session_error)?;

    Ok(reply)
}

fn session_error(e: agent_core::AgentError) -> ApiError {
    tracing::error!(error = %e, "Session store failure");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "SESSION_ERROR", e.user_message())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let llm_connected = state.agent.provider().health_check().await.unwrap_or(false);
    let shop_connected = state.backend.health_check().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        llm_connected,
        shop_connected,
        tools: state.agent.tools().names().into_iter().map(String::from).collect(),
    })
}

/// Models offered by the configured provider
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state
        .agent
        .provider()
        .list_models()
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %e, "Listing models failed");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE", e.user_message())
        })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Credential(token): Credential,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // Cancelled when the client goes away and axum drops this future
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let message = converse(
        &state,
        &token,
        &payload.message,
        payload.conversation_id.as_deref(),
        "http",
        cancel,
    )
    .await?;

    Ok(Json(ChatResponse {
        message,
        conversation_id: payload.conversation_id,
    }))
}

/// WebSocket chat
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Credential(token): Credential,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

/// Frames are plain text or `{"message": ..., "conversation_id": ...}`
fn parse_frame(text: &str) -> ChatRequest {
    serde_json::from_str(text).unwrap_or_else(|_| ChatRequest {
        message: text.to_string(),
        conversation_id: None,
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, token: String) {
    let (mut sender, mut receiver) = socket.split();
    let cancel = CancellationToken::new();
    let (frames_tx, mut frames) = mpsc::channel::<String>(8);
    tracing::info!("Chat socket connected");

    // The reader keeps draining the socket while a run is in flight, so a
    // close frame cancels the run instead of waiting behind it.
    let reader = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        if frames_tx.send(text.as_str().to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Err(e) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            cancel.cancel();
        }
    });

    while let Some(text) = frames.recv().await {
        let request = parse_frame(&text);
        let frame = match converse(
            &state,
            &token,
            &request.message,
            request.conversation_id.as_deref(),
            "ws",
            cancel.child_token(),
        )
        .await
        {
            Ok(content) => serde_json::json!({"type": "message", "content": content}),
            Err((_, Json(err))) => serde_json::json!({"type": "error", "error": err.error}),
        };

        if cancel.is_cancelled() {
            break;
        }
        if sender.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
            break;
        }
    }

    cancel.cancel();
    reader.abort();
    tracing::info!("Chat socket disconnected");
}
