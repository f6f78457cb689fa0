use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;

use super::definition::FeedbackDefinition;
use crate::engine::{EngineResponse, TraceSpan};
use crate::models::RetrievedChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Pending,
    Done,
    Failed,
}

/// One provider invocation and its normalized score.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackCall {
    pub args: BTreeMap<String, String>,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResult {
    pub name: String,
    pub status: FeedbackStatus,
    /// Aggregated score; `None` until done, or when there was nothing to score
    pub result: Option<f64>,
    pub calls: Vec<FeedbackCall>,
    pub error: Option<String>,
    pub higher_is_better: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FeedbackResult {
    fn pending(def: &FeedbackDefinition) -> Self {
        Self {
            name: def.name.clone(),
            status: FeedbackStatus::Pending,
            result: None,
            calls: Vec::new(),
            error: None,
            higher_is_better: def.higher_is_better,
            completed_at: None,
        }
    }
}

/// The evaluation unit of one assistant turn.
///
/// Everything but the feedback results is fixed at creation. Results start
/// pending and are settled exactly once each by background tasks; every
/// settlement bumps the version published on the record's watch channel.
#[derive(Debug)]
pub struct Record {
    pub record_id: String,
    pub app_id: String,
    pub main_input: String,
    pub main_output: String,
    pub contexts: Vec<RetrievedChunk>,
    pub trace: Vec<TraceSpan>,
    pub created_at: DateTime<Utc>,
    feedback: RwLock<Vec<FeedbackResult>>,
    version: watch::Sender<u64>,
}

impl Record {
    pub fn new(
        app_id: &str,
        main_input: &str,
        response: &EngineResponse,
        definitions: &[FeedbackDefinition],
    ) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.to_string(),
            main_input: main_input.to_string(),
            main_output: response.response.clone(),
            contexts: response.source_chunks.clone(),
            trace: response.trace.clone(),
            created_at: Utc::now(),
            feedback: RwLock::new(definitions.iter().map(FeedbackResult::pending).collect()),
            version,
        }
    }

    /// Snapshot of every feedback result, in definition order.
    pub fn feedback_results(&self) -> Vec<FeedbackResult> {
        self.feedback.read().clone()
    }

    pub fn feedback_result(&self, name: &str) -> Option<FeedbackResult> {
        self.feedback.read().iter().find(|r| r.name == name).cloned()
    }

    /// Settle `name` as done. Returns false if it was unknown or already settled.
    pub fn complete(&self, name: &str, result: Option<f64>, calls: Vec<FeedbackCall>) -> bool {
        self.settle(name, |r| {
            r.status = FeedbackStatus::Done;
            r.result = result;
            r.calls = calls;
        })
    }

    /// Settle `name` as failed with `error`.
    pub fn fail(&self, name: &str, error: String) -> bool {
        self.settle(name, |r| {
            r.status = FeedbackStatus::Failed;
            r.error = Some(error);
        })
    }

    fn settle(&self, name: &str, apply: impl FnOnce(&mut FeedbackResult)) -> bool {
        {
            let mut feedback = self.feedback.write();
            let Some(slot) = feedback
                .iter_mut()
                .find(|r| r.name == name && r.status == FeedbackStatus::Pending)
            else {
                return false;
            };
            apply(slot);
            slot.completed_at = Some(Utc::now());
        }
        self.version.send_modify(|v| *v += 1);
        true
    }

    /// True once no result is pending.
    pub fn is_settled(&self) -> bool {
        self.feedback
            .read()
            .iter()
            .all(|r| r.status != FeedbackStatus::Pending)
    }

    /// Receiver that wakes on every settlement.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Wait until every feedback is settled or `timeout` elapses. Returns
    /// whether the record settled in time.
    pub async fn wait_for_feedback_results(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let settled = async {
            while !self.is_settled() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(timeout, settled).await.is_ok() && self.is_settled()
    }
}
