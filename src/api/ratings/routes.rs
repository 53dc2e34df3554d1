use crate::api::models::AppState;
use crate::api::not_allowed_handler;
use crate::api::ratings::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/songs/rating", post(rate_song_handler).get(not_allowed_handler))
        .route("/rating", get(list_ratings_handler).post(not_allowed_handler))
        .route(
            "/songs/avg/rating/{song_id}",
            get(rating_stat_handler).post(not_allowed_handler),
        )
}
