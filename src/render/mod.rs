//! Transcript and feedback rendering for the HTTP surface.

pub mod pills;
pub mod trace;

use serde::Serialize;

use crate::models::{Message, Role};
use pills::{render_feedback, FeedbackPanel};

#[derive(Debug, Clone, Serialize)]
pub struct RenderedMessage {
    pub role: Role,
    pub content: String,
    pub record_id: Option<String>,
    pub feedback: Option<FeedbackPanel>,
}

/// Render one transcript message. Pills are keyed with the record's prompt as
/// suffix, so re-renders of the same message produce the same keys.
pub fn render_message(message: &Message, refresh_interval_ms: u64) -> RenderedMessage {
    let record = message.record.as_deref();
    RenderedMessage {
        role: message.role,
        content: message.content.clone(),
        record_id: record.map(|r| r.record_id.clone()),
        feedback: record.map(|r| render_feedback(r, &r.main_input, refresh_interval_ms)),
    }
}
