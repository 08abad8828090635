//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, WebhookAck};
use super::AppState;
use crate::line::verify_signature;
use crate::line::webhook::{MessageContent, WebhookBody, WebhookEvent, SIGNATURE_HEADER};
use crate::runtime::{InboundMessage, ReplyToken, Responder};
use crate::session::SessionStats;
use crate::state_machine::replies;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/api/sessions", get(session_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

/// Verify, parse, and hand each event to a background task. LINE expects a
/// quick 200, so nothing here waits for a conversation turn.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing signature".to_string()))?;

    if !verify_signature(&state.channel_secret, &body, signature) {
        tracing::warn!("Rejected webhook with bad signature");
        return Err(AppError::Unauthorized("Invalid signature".to_string()));
    }

    let payload: WebhookBody = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook body: {e}")))?;

    tracing::debug!(events = payload.events.len(), "Webhook received");
    drop(spawn_events(&state, payload.events));

    Ok(Json(WebhookAck { ok: true }))
}

/// One task per event; handles are returned so tests can wait on them
fn spawn_events(state: &AppState, events: Vec<WebhookEvent>) -> Vec<JoinHandle<()>> {
    events
        .into_iter()
        .filter_map(|event| spawn_event(state, event))
        .collect()
}

fn spawn_event(state: &AppState, event: WebhookEvent) -> Option<JoinHandle<()>> {
    let runtime = state.runtime.clone();

    match event {
        WebhookEvent::Message {
            reply_token,
            source,
            message,
        } => {
            let Some(user_id) = source.user_id else {
                tracing::debug!("Message without a user id ignored");
                return None;
            };
            let reply = ReplyToken(reply_token);

            Some(match message {
                MessageContent::Text { text } => tokio::spawn(async move {
                    let outcome = runtime
                        .handle_message(InboundMessage {
                            user_id: user_id.clone(),
                            text,
                            reply,
                        })
                        .await;
                    tracing::debug!(user_id = %user_id, outcome = ?outcome, "Message handled");
                }),
                MessageContent::Other => tokio::spawn(async move {
                    tracing::info!(user_id = %user_id, "Non-text message received");
                    let text = replies::non_text_message();
                    if let Err(e) = runtime.responder().send_text(&reply, &text).await {
                        tracing::warn!(user_id = %user_id, error = %e, "Reply delivery failed");
                    }
                }),
            })
        }

        WebhookEvent::Follow {
            reply_token,
            source,
        } => {
            let user_id = source.user_id.unwrap_or_default();
            Some(tokio::spawn(async move {
                tracing::info!(user_id = %user_id, "User followed");
                let reply = ReplyToken(reply_token);
                let text = replies::follow_greeting();
                if let Err(e) = runtime.responder().send_text(&reply, &text).await {
                    tracing::warn!(user_id = %user_id, error = %e, "Reply delivery failed");
                }
            }))
        }

        WebhookEvent::Unfollow { source } => {
            tracing::info!(user_id = ?source.user_id, "User unfollowed");
            None
        }

        WebhookEvent::Other => {
            tracing::debug!("Unhandled webhook event type");
            None
        }
    }
}

// ============================================================
// Health and admin
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version.to_string(),
    })
}

async fn session_stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.runtime.store().stats())
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
