//! Background handling of actionable events.
//!
//! The webhook acknowledges Slack before any of this runs. Each actionable
//! [`EventRecord`] gets its own detached task that filters out the bot's own
//! traffic, builds a reply and posts it. Failures stop at the task boundary:
//! they are logged and never reach the HTTP caller or the process.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::EventRecord;
use crate::state::AppState;

/// How a background event task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event had subtype `bot_message`.
    SkippedBotMessage,

    /// The event was authored by the bot itself.
    SkippedOwnMessage,

    /// The event has no channel to reply in.
    MissingChannel,

    /// A reply was posted.
    Replied,

    /// Posting the reply failed.
    SendFailed,
}

/// Processes one actionable event to completion.
///
/// Bot messages and the bot's own messages are skipped. Everything else
/// gets the responder's reply for its text, posted to the event's channel.
#[instrument(
    skip(state, record),
    fields(channel = ?record.channel, user = ?record.user, ts = ?record.ts)
)]
pub async fn handle_event(state: Arc<AppState>, record: EventRecord) -> EventOutcome {
    if record.subtype.as_deref() == Some("bot_message") {
        debug!("Skipping bot message");
        return EventOutcome::SkippedBotMessage;
    }

    if record.user.as_deref().is_some_and(|user| state.is_self(user)) {
        debug!("Skipping own message");
        return EventOutcome::SkippedOwnMessage;
    }

    let Some(channel) = record.channel.as_deref() else {
        warn!(event_type = ?record.event_type, "Event has no channel, cannot reply");
        return EventOutcome::MissingChannel;
    };

    let reply = state.responder().respond(record.text());

    match state.notifier().send(channel, &reply).await {
        Ok(()) => {
            info!(channel, "Handled event");
            EventOutcome::Replied
        }
        Err(e) => {
            error!(channel, error = %e, "Error sending message to Slack");
            EventOutcome::SendFailed
        }
    }
}

/// Runs [`handle_event`] on a detached tokio task.
///
/// There is no cancellation and no timeout: the task runs until the send
/// completes or fails. Callers on the request path drop the handle; tests
/// await it to observe the outcome.
pub fn spawn_event(state: Arc<AppState>, record: EventRecord) -> JoinHandle<EventOutcome> {
    tokio::spawn(handle_event(state, record))
}
