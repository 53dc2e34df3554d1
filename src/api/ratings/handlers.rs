use crate::api::models::*;
use crate::repository::{NewRating, RatingInput, RatingList, RatingStat};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use serde_json::Value;
use tracing::{debug, info};

pub async fn rate_song_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreatedResponse>, AppError> {
    let Json(body) = payload?;
    debug!(%body, "Rating song");

    let song_id = match body.get("song_id") {
        None | Some(Value::Null) => return Err(AppError::rejected("Missing song id parameter")),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let rating: RatingInput = match body.get("rating") {
        None | Some(Value::Null) => return Err(AppError::rejected("Missing rating parameter")),
        Some(value) => value.clone().into(),
    };

    // Any creation failure is reported to the client as-is.
    let created_id = state
        .ratings()
        .create(&NewRating { song_id, rating })
        .await
        .map_err(|e| {
            debug!(error = %e, "Rating rejected");
            AppError::Rejected(e.to_string())
        })?;

    info!(%created_id, "Rating added");
    Ok(Json(CreatedResponse { created_id }))
}

pub async fn list_ratings_handler(
    State(state): State<AppState>,
) -> Result<Json<RatingList>, AppError> {
    Ok(Json(state.ratings().list_all().await?))
}

pub async fn rating_stat_handler(
    State(state): State<AppState>,
    song_id: Result<Path<String>, PathRejection>,
) -> Result<Json<RatingStat>, AppError> {
    let Path(song_id) = song_id?;
    debug!(%song_id, "Rating statistics");
    Ok(Json(state.ratings().stat(&song_id).await?))
}
