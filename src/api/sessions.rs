use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::{lookup_session, ApiError};
use crate::models::ChatRequest;
use crate::render::{render_message, RenderedMessage};
use crate::state::AppState;

const MAX_PROMPT_LEN: usize = 4000;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub messages: Vec<RenderedMessage>,
}

/// POST /api/sessions — start a conversation seeded with the greeting.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.create_session().await.map_err(|e| {
        tracing::error!("Failed to create session: {e:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id,
            messages: session.render_all(),
        }),
    ))
}

/// GET /api/sessions/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RenderedMessage>>, ApiError> {
    Ok(Json(lookup_session(&state, &id)?.render_all()))
}

/// POST /api/sessions/{id}/chat — one turn; returns the assistant message.
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<RenderedMessage>, ApiError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Prompt is required".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Prompt exceeds {MAX_PROMPT_LEN} characters"),
        ));
    }

    let session = lookup_session(&state, &id)?;
    let message = session
        .submit(prompt)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("LLM error: {e:#}")))?;

    Ok(Json(render_message(&message, session.refresh_interval_ms())))
}
