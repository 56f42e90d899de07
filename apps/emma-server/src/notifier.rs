//! Outbound reply delivery.
//!
//! Event handlers depend on [`Notifier`] rather than on [`SlackClient`]
//! directly, so the delivery path can be replaced.

use async_trait::async_trait;
use tracing::info;

use crate::error::ServerError;
use crate::slack_client::SlackClient;

/// Delivers a reply to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::SlackApi` when the platform rejects the send.
    async fn send(&self, channel: &str, text: &str) -> Result<(), ServerError>;
}

#[async_trait]
impl Notifier for SlackClient {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ServerError> {
        let resp = self.post_message(channel, text).await?;
        info!(channel = resp.channel, ts = ?resp.ts, "Reply posted");
        Ok(())
    }
}
