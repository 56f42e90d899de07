//! Handlers that run after the webhook has answered Slack.
//!
//! - [`events`]: replies to mentions and direct messages

pub mod events;
