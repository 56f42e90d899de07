//! Reply text generation.
//!
//! [`generate_response`] is the built-in canned reply table. [`Responder`]
//! is the seam for plugging in a richer engine without touching handlers.

/// Reply to any message containing "hello".
pub const GREETING_REPLY: &str = "Hello! How can I assist you?";

/// Reply to everything else.
pub const FALLBACK_REPLY: &str = "I'm not sure how to respond to that.";

/// Picks a canned reply for `message`.
///
/// Matching is a case-insensitive substring search for `hello`.
///
/// # Examples
///
/// ```
/// use emma_server::responder::{generate_response, FALLBACK_REPLY, GREETING_REPLY};
///
/// assert_eq!(generate_response("well HELLO!"), GREETING_REPLY);
/// assert_eq!(generate_response("goodbye"), FALLBACK_REPLY);
/// ```
pub fn generate_response(message: &str) -> &'static str {
    if message.to_lowercase().contains("hello") {
        GREETING_REPLY
    } else {
        FALLBACK_REPLY
    }
}

/// Produces reply text for an incoming message.
pub trait Responder: Send + Sync {
    /// Returns the reply for `text`. Must not fail.
    fn respond(&self, text: &str) -> String;
}

/// [`Responder`] backed by [`generate_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedResponder;

impl Responder for CannedResponder {
    fn respond(&self, text: &str) -> String {
        generate_response(text).to_string()
    }
}
