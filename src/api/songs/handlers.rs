use crate::api::models::*;
use crate::repository::NewSong;
use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use tracing::{debug, info};

pub async fn add_song_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewSong>, JsonRejection>,
) -> Result<Json<CreatedResponse>, AppError> {
    let Json(song) = payload?;
    debug!(?song, "Adding song");

    let created_id = state.songs().create(&song).await?;
    info!(%created_id, "Song added");

    Ok(Json(CreatedResponse { created_id }))
}

/// All songs, or one page when `limit` is given.
pub async fn list_songs_handler(
    State(state): State<AppState>,
    params: Result<Query<ListSongsParams>, QueryRejection>,
) -> Result<Json<SongListResponse>, AppError> {
    let Query(params) = params?;
    debug!(?params, "Listing songs");

    let page_size = match params.limit.as_deref() {
        None => None,
        Some("") => {
            return Err(AppError::rejected(
                "Value in limit parameter cannot be empty string",
            ));
        }
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| AppError::rejected("Except numeric value for limit parameter"))?,
        ),
    };

    let page_number = match params.page.as_deref() {
        None | Some("") => 1,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::rejected("Except numeric value for page parameter"))?
            .max(1) as u64,
    };

    let songs = state.songs();
    let result = match page_size {
        Some(size) => songs.list(size, page_number).await?,
        None => songs.list_all().await?,
    };

    Ok(Json(SongListResponse {
        total: result.len(),
        result,
    }))
}

fn parse_level(raw: &str) -> Option<i64> {
    if !raw.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Songs of one level plus the catalog-wide difficulty average.
pub async fn songs_by_level_handler(
    State(state): State<AppState>,
    params: Result<Query<LevelParams>, QueryRejection>,
) -> Result<Json<LevelSearchResponse>, AppError> {
    let Query(params) = params?;
    let raw = params
        .level
        .ok_or_else(|| AppError::rejected("Missing level parameter"))?;
    let level = parse_level(&raw)
        .ok_or_else(|| AppError::rejected("Except numeric value for level parameter"))?;

    let songs = state.songs();
    let result = songs.search_by_level(level).await?;
    let avg_value = songs.average_difficulty().await?;

    info!(level, found = result.len(), "Level search complete");

    Ok(Json(LevelSearchResponse {
        total: result.len(),
        avg_value,
        result,
    }))
}

pub async fn search_songs_handler(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params?;
    let message = match params.message {
        Some(message) if !message.is_empty() => message,
        _ => return Err(AppError::rejected("Missing message parameter")),
    };

    let result = state.songs().search_by(&message).await?;
    info!(query = %message, found = result.len(), "Search complete");

    Ok(Json(SearchResponse {
        total: result.len(),
        result,
    }))
}
