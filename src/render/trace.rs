use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::TraceSpan;
use crate::feedback::record::{FeedbackResult, Record};

#[derive(Debug, Clone, Serialize)]
pub struct ContextView {
    pub doc_path: String,
    pub title: String,
    pub start_line: usize,
    pub end_line: usize,
    pub combined_score: f32,
    pub content: String,
}

/// Raw view of a record: the engine spans, the retrieved context and every
/// feedback result as stored.
#[derive(Debug, Clone, Serialize)]
pub struct TraceView {
    pub record_id: String,
    pub app_id: String,
    pub main_input: String,
    pub main_output: String,
    pub created_at: DateTime<Utc>,
    pub total_ms: u64,
    pub spans: Vec<TraceSpan>,
    pub contexts: Vec<ContextView>,
    pub feedback: Vec<FeedbackResult>,
}

pub fn render_trace(record: &Record) -> TraceView {
    TraceView {
        record_id: record.record_id.clone(),
        app_id: record.app_id.clone(),
        main_input: record.main_input.clone(),
        main_output: record.main_output.clone(),
        created_at: record.created_at,
        total_ms: record.trace.iter().map(|s| s.duration_ms).sum(),
        spans: record.trace.clone(),
        contexts: record
            .contexts
            .iter()
            .map(|c| ContextView {
                doc_path: c.doc_path.clone(),
                title: c.title.clone(),
                start_line: c.start_line,
                end_line: c.end_line,
                combined_score: c.combined_score,
                content: c.content.clone(),
            })
            .collect(),
        feedback: record.feedback_results(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineResponse;

    fn span(name: &str, ms: u64) -> TraceSpan {
        TraceSpan {
            name: name.into(),
            started_at: Utc::now(),
            duration_ms: ms,
            input: "in".into(),
            output: "out".into(),
        }
    }

    #[test]
    fn test_trace_keeps_span_order_and_totals() {
        let response = EngineResponse {
            response: "answer".into(),
            source_chunks: Vec::new(),
            trace: vec![span("condense", 5), span("retrieve", 10), span("synthesize", 30)],
        };
        let rec = Record::new("app", "q", &response, &[]);
        let view = render_trace(&rec);
        let names: Vec<&str> = view.spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["condense", "retrieve", "synthesize"]);
        assert_eq!(view.total_ms, 45);
        assert_eq!(view.main_output, "answer");
        assert!(view.feedback.is_empty());
    }
}
