use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::http::server::AppState;

/// `GET /v1/health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "env": state.env.as_str(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
