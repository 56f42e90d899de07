//! Emma — a Slack Events API webhook that answers mentions and direct messages.
//!
//! Slack posts events to `POST /api/slack/events`. The handler echoes
//! verification challenges, acknowledges everything else at once, and replies
//! to `app_mention` events and direct messages from a background task.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod responder;
pub mod server;
pub mod slack_client;
pub mod state;
