use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Liveness only; the reconciliation service is not probed.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "recon-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
