use axum::extract::State;
use axum::Json;

use crate::config::Config;
use crate::state::AppState;

/// GET /api/config — effective configuration. The API key never serializes.
pub async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.clone())
}
