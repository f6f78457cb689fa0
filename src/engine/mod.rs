//! Query and chat engines over the document index.
//!
//! [`query::QueryEngine`] answers one standalone question. [`chat::ChatEngine`]
//! keeps a session's history and condenses follow-ups before querying.

pub mod chat;
pub mod query;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::models::RetrievedChunk;

/// Result of one engine call.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub response: String,
    /// Chunks the answer was synthesized from
    pub source_chunks: Vec<RetrievedChunk>,
    /// Steps taken to produce the answer, in order
    pub trace: Vec<TraceSpan>,
}

/// One timed step of an engine call.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSpan {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub input: String,
    pub output: String,
}

/// Open span; closed with [`SpanTimer::finish`].
pub(crate) struct SpanTimer {
    name: &'static str,
    started_at: DateTime<Utc>,
    start: Instant,
    input: String,
}

impl SpanTimer {
    pub(crate) fn start(name: &'static str, input: impl Into<String>) -> Self {
        Self {
            name,
            started_at: Utc::now(),
            start: Instant::now(),
            input: input.into(),
        }
    }

    pub(crate) fn finish(self, output: impl Into<String>) -> TraceSpan {
        TraceSpan {
            name: self.name.to_string(),
            started_at: self.started_at,
            duration_ms: self.start.elapsed().as_millis() as u64,
            input: self.input,
            output: output.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_timer_records_io() {
        let span = SpanTimer::start("retrieve", "what is st.write").finish("2 chunks");
        assert_eq!(span.name, "retrieve");
        assert_eq!(span.input, "what is st.write");
        assert_eq!(span.output, "2 chunks");
        assert!(span.started_at <= Utc::now());
    }
}
