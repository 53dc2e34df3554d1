use crate::api::models::AppState;
use crate::api::not_allowed_handler;
use crate::api::songs::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/songs", get(list_songs_handler).post(not_allowed_handler))
        .route("/songs/add", post(add_song_handler).get(not_allowed_handler))
        .route(
            "/songs/avg/difficulty",
            get(songs_by_level_handler).post(not_allowed_handler),
        )
        .route(
            "/songs/search",
            get(search_songs_handler).post(not_allowed_handler),
        )
}
