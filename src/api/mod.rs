pub mod models;
pub mod ratings;
pub mod songs;

// Re-exports
pub use models::*;

use axum::{Json, Router, extract::State, routing::get};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, AppError> {
    let total_songs = state.songs().list_all().await?.len();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        profile: state.profile.to_string(),
        total_songs,
    }))
}

/// Answer for the verb a resource does not serve.
pub async fn not_allowed_handler() -> AppError {
    AppError::not_allowed()
}

/// Full application router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(songs::routes())
        .merge(ratings::routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
