//! Shared fixtures for HTTP-level tests.
//!
//! Drives the router in-process via `tower::ServiceExt::oneshot`, with a
//! [`RecordingNotifier`] standing in for Slack.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use emma_server::error::ServerError;
use emma_server::notifier::Notifier;
use emma_server::responder::CannedResponder;
use emma_server::server::{EVENTS_PATH, router};
use emma_server::state::AppState;
use http_body_util::BodyExt;
use tokio::sync::{Notify, mpsc};
use tower::ServiceExt;

pub const BOT_USER_ID: &str = "UBOT";

/// A send observed by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub text: String,
}

/// Records every send and reports it on a channel.
///
/// When built with [`RecordingNotifier::gated`], each send blocks until the
/// gate is opened, which lets tests observe the HTTP response while the
/// reply is still in flight.
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    tx: mpsc::UnboundedSender<SentMessage>,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ServerError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let msg = SentMessage {
            channel: channel.to_string(),
            text: text.to_string(),
        };
        self.sent.lock().expect("lock").push(msg.clone());
        let _ = self.tx.send(msg);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub notifier: Arc<RecordingNotifier>,
    rx: mpsc::UnboundedReceiver<SentMessage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self::build(Some(gate))
    }

    fn build(gate: Option<Arc<Notify>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(RecordingNotifier {
            sent: Mutex::new(Vec::new()),
            tx,
            gate,
        });
        let state = Arc::new(AppState::new(
            notifier.clone(),
            Arc::new(CannedResponder),
            BOT_USER_ID.into(),
            Duration::from_secs(600),
        ));
        Self {
            router: router(state),
            notifier,
            rx,
        }
    }

    /// POST `body` to the events endpoint.
    pub async fn post_event(&self, body: impl Into<Body>) -> Response<Body> {
        self.post_event_with(body, &[]).await
    }

    pub async fn post_event_with(
        &self,
        body: impl Into<Body>,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(EVENTS_PATH)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let req = builder.body(body.into()).expect("request");
        self.oneshot(req).await
    }

    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Waits for the next outbound send, failing after two seconds.
    pub async fn next_send(&mut self) -> SentMessage {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for outbound send")
            .expect("notifier dropped")
    }

    /// Asserts that no send happens within a short grace period.
    pub async fn assert_no_send(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(200), self.rx.recv()).await;
        assert!(result.is_err(), "unexpected outbound send: {result:?}");
        assert!(self.sent().is_empty());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.notifier.sent.lock().expect("lock").clone()
    }
}

pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

pub fn mention(user: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "event_callback",
        "event": {
            "type": "app_mention",
            "text": text,
            "user": user,
            "channel": "C1"
        }
    })
}
