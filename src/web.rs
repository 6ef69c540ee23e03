use crate::bridge::UiBridge;
use crate::channel::StateView;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    status: &'static str,
    mic: &'static str,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn router(bridge: Arc<UiBridge>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(state))
        .route("/api/toggle_mic", post(toggle_mic))
        .with_state(bridge)
}

/// Serve the JSON bridge until `cancel` fires.
pub async fn serve(
    bridge: Arc<UiBridge>,
    host: &str,
    port: u16,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("web bridge listening on http://{local_addr}");
    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn state(State(bridge): State<Arc<UiBridge>>) -> Json<StateView> {
    Json(bridge.view())
}

async fn toggle_mic(
    State(bridge): State<Arc<UiBridge>>,
) -> Result<Json<ToggleResponse>, ApiError> {
    match bridge.toggle_microphone() {
        Ok(flag) => Ok(Json(ToggleResponse {
            status: "ok",
            mic: flag.encode(),
        })),
        Err(e) => {
            tracing::error!("Failed to toggle microphone: {:#}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("{e:#}") })),
            ))
        }
    }
}
