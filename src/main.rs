use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use docs_chat::api;
use docs_chat::config::Config;
use docs_chat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Documents directory: {}", config.docs_dir.display());
    tracing::info!(
        "LLM provider: {} ({}), chat model {}, mode {:?}",
        config.llm.provider,
        config.llm.base_url,
        config.llm.chat_model,
        config.chat_mode
    );

    let state = AppState::new(config.clone())?;
    state.warm_up().await?;

    let app = Router::new()
        .route("/", get(serve_index))
        .route("/api/config", get(api::config::get_config))
        .route("/api/sessions", post(api::sessions::create_session))
        .route("/api/sessions/{id}/messages", get(api::sessions::list_messages))
        .route("/api/sessions/{id}/chat", post(api::sessions::chat))
        .route(
            "/api/sessions/{id}/records/{record_id}/feedback",
            get(api::feedback::get_feedback),
        )
        .route(
            "/api/sessions/{id}/records/{record_id}/feedback/stream",
            get(api::feedback::stream_feedback),
        )
        .route(
            "/api/sessions/{id}/records/{record_id}/feedback/{name}",
            get(api::feedback::get_feedback_detail),
        )
        .route(
            "/api/sessions/{id}/records/{record_id}/trace",
            get(api::feedback::get_trace),
        )
        .with_state(state)
        .fallback(get(serve_index));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}
