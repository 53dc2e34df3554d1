use crate::config::Profile;
use crate::repository::{RatingRepository, RepositoryError, Song, SongRepository};
use crate::storage::DocumentStore;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub profile: Profile,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, profile: Profile) -> Self {
        Self { store, profile }
    }

    pub fn songs(&self) -> SongRepository {
        SongRepository::new(self.store.clone())
    }

    pub fn ratings(&self) -> RatingRepository {
        RatingRepository::new(self.store.clone())
    }

    pub fn is_test_mode(&self) -> bool {
        self.profile.is_test_mode()
    }
}

/// Query string of `GET /songs`
#[derive(Debug, Default, Deserialize)]
pub struct ListSongsParams {
    pub limit: Option<String>,
    pub page: Option<String>,
}

/// Query string of `GET /songs/avg/difficulty`
#[derive(Debug, Default, Deserialize)]
pub struct LevelParams {
    pub level: Option<String>,
}

/// Query string of `GET /songs/search`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub message: Option<String>,
}

/// Response after creating a song or a rating
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub created_id: String,
}

#[derive(Debug, Serialize)]
pub struct SongListResponse {
    pub result: Vec<Song>,
    pub total: usize,
}

/// Songs of one level together with the difficulty average of the catalog
#[derive(Debug, Serialize)]
pub struct LevelSearchResponse {
    pub total: usize,
    pub avg_value: Option<f64>,
    pub result: Vec<Song>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub total: usize,
    pub result: Vec<Song>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub profile: String,
    pub total_songs: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_message: String,
}

/// Application error type.
///
/// Every client-side failure is answered with 404 and an `error_message`.
#[derive(Debug)]
pub enum AppError {
    Rejected(String),
    Internal(String),
}

impl AppError {
    pub fn rejected(message: impl Into<String>) -> Self {
        AppError::Rejected(message.into())
    }

    pub fn not_allowed() -> Self {
        AppError::rejected("Operation is not allowed")
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidValue(msg) | RepositoryError::InvalidArgument(msg) => {
                AppError::Rejected(msg)
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Rejected(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Rejected(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Rejected(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Rejected(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error_message: message })).into_response()
    }
}
