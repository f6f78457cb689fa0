use anyhow::{Context, Result};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::definition::{FeedbackDefinition, FeedbackKind};
use super::provider::FeedbackProvider;
use super::record::{FeedbackCall, Record};
use crate::engine::EngineResponse;

/// Wraps engine calls, turning each into a [`Record`] whose feedbacks are
/// computed in the background.
///
/// Each definition has its own limiter, so a feedback that fans out into
/// many calls never queues ahead of the others.
pub struct Recorder {
    app_id: String,
    definitions: Vec<FeedbackDefinition>,
    provider: Arc<FeedbackProvider>,
    limiters: Vec<Arc<Semaphore>>,
}

impl Recorder {
    pub fn new(
        app_id: String,
        definitions: Vec<FeedbackDefinition>,
        provider: FeedbackProvider,
        max_concurrent_calls: usize,
    ) -> Self {
        let limiters = definitions
            .iter()
            .map(|_| Arc::new(Semaphore::new(max_concurrent_calls.max(1))))
            .collect();
        Self {
            app_id,
            definitions,
            provider: Arc::new(provider),
            limiters,
        }
    }

    /// Run `app_call`, create exactly one record for it and schedule every
    /// feedback on that record. Returns without waiting for feedback.
    /// An error from `app_call` propagates and no record is created.
    pub async fn record<F, Fut>(&self, main_input: &str, app_call: F) -> Result<(EngineResponse, Arc<Record>)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EngineResponse>>,
    {
        let start = Instant::now();
        let response = app_call().await?;
        let record = Arc::new(Record::new(
            &self.app_id,
            main_input,
            &response,
            &self.definitions,
        ));

        tracing::info!(
            "Recorded {} for {} in {}ms ({} context chunks)",
            record.record_id,
            self.app_id,
            start.elapsed().as_millis(),
            record.contexts.len()
        );

        for (def, limiter) in self.definitions.iter().zip(&self.limiters) {
            let task = tokio::spawn(run_feedback(
                def.clone(),
                record.clone(),
                self.provider.clone(),
                limiter.clone(),
            ));
            tokio::spawn(supervise(def.name.clone(), record.clone(), task));
        }

        Ok((response, record))
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn definitions(&self) -> &[FeedbackDefinition] {
        &self.definitions
    }

    pub fn provider_model(&self) -> &str {
        self.provider.model_name()
    }
}

async fn run_feedback(
    def: FeedbackDefinition,
    record: Arc<Record>,
    provider: Arc<FeedbackProvider>,
    limiter: Arc<Semaphore>,
) {
    let contexts: Vec<String> = record.contexts.iter().map(|c| c.content.clone()).collect();
    let selections = def.select(&record.main_input, &record.main_output, &contexts);

    let outcomes = join_all(
        selections
            .into_iter()
            .map(|args| evaluate_limited(&provider, &limiter, def.kind, args)),
    )
    .await;

    match outcomes.into_iter().collect::<Result<Vec<FeedbackCall>>>() {
        Ok(calls) => {
            let scores: Vec<f64> = calls.iter().map(|c| c.score).collect();
            let result = def.aggregation.aggregate(&scores);
            tracing::debug!(
                "{} on {}: {:?} from {} calls",
                def.name,
                record.record_id,
                result,
                calls.len()
            );
            record.complete(&def.name, result, calls);
        }
        Err(e) => {
            tracing::warn!("{} failed on {}: {e:#}", def.name, record.record_id);
            record.fail(&def.name, format!("{e:#}"));
        }
    }
}

/// A feedback task that panics or is cancelled still settles its result.
async fn supervise(name: String, record: Arc<Record>, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        tracing::error!("{name} task on {} died: {e}", record.record_id);
        record.fail(&name, format!("Feedback task failed: {e}"));
    }
}

async fn evaluate_limited(
    provider: &FeedbackProvider,
    limiter: &Semaphore,
    kind: FeedbackKind,
    args: BTreeMap<String, String>,
) -> Result<FeedbackCall> {
    let _permit = limiter
        .acquire()
        .await
        .context("Feedback limiter closed")?;
    provider.evaluate(kind, args).await
}
