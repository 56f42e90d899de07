//! HTTP surface for Slack's Events API.
//!
//! Exposes `POST /api/slack/events` plus a `GET /health` liveness check. The events
//! handler answers synchronously; replies are produced on background tasks
//! spawned by [`handlers::events::spawn_event`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::dispatch::{self, Classification};
use crate::error::ServerError;
use crate::handlers;
use crate::state::AppState;

/// Path Slack is configured to deliver events to.
pub const EVENTS_PATH: &str = "/api/slack/events";

/// Header Slack sets on redeliveries.
const RETRY_NUM_HEADER: &str = "x-slack-retry-num";

const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(EVENTS_PATH, post(slack_events))
        .route("/health", get(health))
        .with_state(state)
}

fn ok_status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn health() -> Json<Value> {
    ok_status()
}

/// Receives one Events API delivery.
///
/// Verification handshakes are answered with the echoed challenge.
/// Actionable events are handed to a background task and acknowledged
/// immediately. Everything else is acknowledged and dropped. Retries of an
/// `event_id` that was already scheduled are acknowledged without being
/// scheduled again.
///
/// # Errors
///
/// Returns `ServerError::BadRequest` (HTTP 400) if the body is not JSON.
#[instrument(skip_all)]
async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServerError> {
    debug!(body = %String::from_utf8_lossy(&body), "Received Slack event");

    if let Some(retry_num) = header_str(&headers, RETRY_NUM_HEADER) {
        info!(
            retry_num,
            reason = ?header_str(&headers, RETRY_REASON_HEADER),
            "Slack retry delivery"
        );
    }

    let payload = dispatch::parse_payload(&body)?;

    match dispatch::classify(&payload) {
        Classification::VerificationChallenge(challenge) => {
            info!("Answering URL verification challenge");
            Ok(Json(json!({ "challenge": challenge })))
        }
        Classification::Actionable(record) => {
            let first_delivery = payload
                .event_id
                .as_deref()
                .is_none_or(|id| state.seen_events().check_and_insert(id));

            if first_delivery {
                debug!(event_id = ?payload.event_id, "Scheduling event");
                // Detached; the response does not wait on the reply.
                drop(handlers::events::spawn_event(Arc::clone(&state), record));
            } else {
                info!(event_id = ?payload.event_id, "Duplicate delivery, not scheduling");
            }
            Ok(ok_status())
        }
        Classification::Ignore => Ok(ok_status()),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Serves the router on `listener` until `shutdown` flips to `true`.
///
/// # Errors
///
/// Returns `ServerError::Io` if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, path = EVENTS_PATH, "Listening for Slack events");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}
