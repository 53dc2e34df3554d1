//! REST service for a song catalog and per-song ratings.

pub mod api;
pub mod config;
pub mod repository;
pub mod seed;
pub mod storage;

pub use api::{AppState, router};
pub use config::{AppConfig, Profile};
