use serde::Serialize;
use std::collections::BTreeMap;

use crate::feedback::record::{FeedbackCall, FeedbackResult, FeedbackStatus, Record};

const PASS_THRESHOLD: f64 = 0.8;
const WARNING_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Pass,
    Warning,
    Fail,
}

impl Icon {
    /// Category for `score`; thresholds mirror for lower-is-better feedbacks.
    pub fn for_score(score: f64, higher_is_better: bool) -> Self {
        let normalized = if higher_is_better { score } else { 1.0 - score };
        if normalized >= PASS_THRESHOLD {
            Icon::Pass
        } else if normalized >= WARNING_THRESHOLD {
            Icon::Warning
        } else {
            Icon::Fail
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Icon::Pass => "✅",
            Icon::Warning => "⚠️",
            Icon::Fail => "🛑",
        }
    }
}

/// Render-time view of one completed feedback. Never stored.
#[derive(Debug, Clone)]
pub struct FeedbackDisplay {
    pub score: f64,
    pub calls: Vec<FeedbackCall>,
    pub icon: Icon,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pill {
    pub key: String,
    pub name: String,
    pub label: String,
    pub score: f64,
    pub icon: Icon,
    pub symbol: &'static str,
}

/// Pills for one record plus what is still outstanding.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackPanel {
    pub record_id: String,
    pub pills: Vec<Pill>,
    pub pending: Vec<String>,
    pub failed: Vec<String>,
    /// No more results will arrive; clients can stop refreshing
    pub settled: bool,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    pub args: BTreeMap<String, String>,
    pub reason: String,
    pub score: f64,
}

pub fn render_key(feedback_name: &str, record_id: &str, key_suffix: &str) -> String {
    format!("{feedback_name}_{record_id}_{key_suffix}")
}

pub fn format_label(name: &str, score: f64) -> String {
    format!("{name} {score:.4}")
}

/// Displays for every result that has a score, in definition order.
pub fn feedback_displays(results: &[FeedbackResult]) -> Vec<(String, FeedbackDisplay)> {
    results
        .iter()
        .filter(|r| r.status == FeedbackStatus::Done)
        .filter_map(|r| {
            let score = r.result?;
            Some((
                r.name.clone(),
                FeedbackDisplay {
                    score,
                    calls: r.calls.clone(),
                    icon: Icon::for_score(score, r.higher_is_better),
                },
            ))
        })
        .collect()
}

/// One pill per available feedback. Pending and failed feedbacks get no
/// pill; they are listed by name instead. Everything comes from a single
/// snapshot, so a settled panel always carries every finished pill.
pub fn render_feedback(record: &Record, key_suffix: &str, refresh_interval_ms: u64) -> FeedbackPanel {
    let results = record.feedback_results();

    let pills = feedback_displays(&results)
        .into_iter()
        .map(|(name, display)| Pill {
            key: render_key(&name, &record.record_id, key_suffix),
            label: format_label(&name, display.score),
            score: display.score,
            icon: display.icon,
            symbol: display.icon.symbol(),
            name,
        })
        .collect();

    let names_with = |status: FeedbackStatus| -> Vec<String> {
        results
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.name.clone())
            .collect()
    };
    let pending = names_with(FeedbackStatus::Pending);
    let failed = names_with(FeedbackStatus::Failed);

    FeedbackPanel {
        record_id: record.record_id.clone(),
        pills,
        settled: pending.is_empty(),
        pending,
        failed,
        refresh_interval_ms,
    }
}

/// Detail table behind a pill: one row per provider call. Empty for an
/// unknown or unfinished feedback.
pub fn feedback_detail(record: &Record, name: &str) -> Vec<DetailRow> {
    record
        .feedback_result(name)
        .filter(|r| r.status == FeedbackStatus::Done && r.result.is_some())
        .map(|r| {
            r.calls
                .into_iter()
                .map(|call| DetailRow {
                    args: call.args,
                    reason: call.reason,
                    score: call.score,
                })
                .collect()
        })
        .unwrap_or_default()
}
