//! Router de la API

pub mod request_routes;
pub mod vehicle_routes;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::cors::cors_layer_for;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer_for(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/api/requests", request_routes::create_request_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "sessions": state.sessions.session_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
