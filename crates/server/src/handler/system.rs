use crate::AppState;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

pub async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
    }))
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.load();
    Json(serde_json::json!({
        "status": "OK",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime-secs": state.started_at.elapsed().as_secs(),
        "site-url": config.site_url,
    }))
}
