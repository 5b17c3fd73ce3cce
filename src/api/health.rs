use crate::services::Backend;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: &'static str,
    pending_tasks: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match state.game.store().as_ref() {
        Backend::Memory(_) => "memory",
        Backend::Redis(redis) => {
            if redis.is_connected().await {
                "redis"
            } else {
                "redis (disconnected)"
            }
        }
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store,
        pending_tasks: state.game.deferred().pending(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
