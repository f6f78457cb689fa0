pub mod config;
pub mod feedback;
pub mod sessions;

use axum::http::StatusCode;
use std::sync::Arc;
use uuid::Uuid;

use crate::feedback::record::Record;
use crate::session::SessionContext;
use crate::state::AppState;

pub type ApiError = (StatusCode, String);

fn lookup_session(state: &AppState, id: &Uuid) -> Result<Arc<SessionContext>, ApiError> {
    state
        .session(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Session not found".to_string()))
}

fn lookup_record(state: &AppState, id: &Uuid, record_id: &str) -> Result<Arc<Record>, ApiError> {
    lookup_session(state, id)?
        .find_record(record_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Record not found".to_string()))
}
