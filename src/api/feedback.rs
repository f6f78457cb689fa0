use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::{lookup_record, ApiError};
use crate::feedback::record::{FeedbackStatus, Record};
use crate::render::pills::{feedback_detail, render_feedback, DetailRow, FeedbackPanel};
use crate::render::trace::{render_trace, TraceView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    pub key_suffix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackDetail {
    pub name: String,
    pub status: Option<FeedbackStatus>,
    pub result: Option<f64>,
    pub rows: Vec<DetailRow>,
}

fn panel(state: &AppState, record: &Record, key_suffix: Option<&str>) -> FeedbackPanel {
    render_feedback(
        record,
        key_suffix.unwrap_or(&record.main_input),
        state.config.feedback.refresh_interval_ms,
    )
}

/// GET /api/sessions/{id}/records/{record_id}/feedback — current pills.
pub async fn get_feedback(
    State(state): State<AppState>,
    Path((id, record_id)): Path<(Uuid, String)>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<FeedbackPanel>, ApiError> {
    let record = lookup_record(&state, &id, &record_id)?;
    Ok(Json(panel(&state, &record, query.key_suffix.as_deref())))
}

/// GET /api/sessions/{id}/records/{record_id}/feedback/{name} — detail table
/// behind one pill. Unknown or unfinished feedbacks yield no rows.
pub async fn get_feedback_detail(
    State(state): State<AppState>,
    Path((id, record_id, name)): Path<(Uuid, String, String)>,
) -> Result<Json<FeedbackDetail>, ApiError> {
    let record = lookup_record(&state, &id, &record_id)?;
    let result = record.feedback_result(&name);
    Ok(Json(FeedbackDetail {
        rows: feedback_detail(&record, &name),
        status: result.as_ref().map(|r| r.status),
        result: result.and_then(|r| r.result),
        name,
    }))
}

/// GET /api/sessions/{id}/records/{record_id}/feedback/stream — pushes the
/// panel now and after every settlement; ends once nothing is pending.
pub async fn stream_feedback(
    State(state): State<AppState>,
    Path((id, record_id)): Path<(Uuid, String)>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let record = lookup_record(&state, &id, &record_id)?;
    let rx = record.subscribe();

    let events = futures_util::stream::unfold(
        Some((rx, true)),
        move |stream_state: Option<(watch::Receiver<u64>, bool)>| {
            let state = state.clone();
            let record = Arc::clone(&record);
            let key_suffix = query.key_suffix.clone();
            async move {
                let (mut rx, first) = stream_state?;
                if !first && rx.changed().await.is_err() {
                    return None;
                }
                rx.borrow_and_update();

                let panel = panel(&state, &record, key_suffix.as_deref());
                let event = Event::default()
                    .event("feedback")
                    .json_data(&panel)
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));

                let next = if panel.settled { None } else { Some((rx, false)) };
                Some((Ok::<Event, Infallible>(event), next))
            }
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /api/sessions/{id}/records/{record_id}/trace
pub async fn get_trace(
    State(state): State<AppState>,
    Path((id, record_id)): Path<(Uuid, String)>,
) -> Result<Json<TraceView>, ApiError> {
    let record = lookup_record(&state, &id, &record_id)?;
    Ok(Json(render_trace(&record)))
}
