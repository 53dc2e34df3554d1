//! Bootstrap import of seed data into empty collections.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SeedConfig;
use crate::repository::rating::RATINGS;
use crate::repository::song::SONGS;
use crate::repository::{NewRating, NewSong, RatingRepository, RepositoryError, SongRepository};
use crate::storage::DocumentStore;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid seed file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to import record {index} of {path}: {source}")]
    Import {
        path: PathBuf,
        index: usize,
        source: RepositoryError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub songs: usize,
    pub ratings: usize,
}

async fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, SeedError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&contents).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Import songs from a JSON array file. Returns the number imported.
///
/// The whole file is decoded before the first insert. If an insert fails the
/// collection is dropped again so the next start retries the import.
pub async fn import_songs(repo: &SongRepository, path: &Path) -> Result<usize, SeedError> {
    let songs: Vec<NewSong> = read_records(path).await?;
    for (index, song) in songs.iter().enumerate() {
        if let Err(source) = repo.create(song).await {
            repo.drop_collection().await?;
            return Err(SeedError::Import {
                path: path.to_path_buf(),
                index,
                source,
            });
        }
    }
    Ok(songs.len())
}

/// Import ratings from a JSON array file. Every rating is validated before
/// anything is written; a failed insert drops the collection again.
pub async fn import_ratings(repo: &RatingRepository, path: &Path) -> Result<usize, SeedError> {
    let ratings: Vec<NewRating> = read_records(path).await?;
    let import_error = |index, source| SeedError::Import {
        path: path.to_path_buf(),
        index,
        source,
    };

    for (index, rating) in ratings.iter().enumerate() {
        rating.validate().map_err(|source| import_error(index, source))?;
    }

    for (index, rating) in ratings.iter().enumerate() {
        if let Err(source) = repo.create(rating).await {
            repo.drop_collection().await?;
            return Err(import_error(index, source));
        }
    }
    Ok(ratings.len())
}

/// Seed each collection that does not exist yet. Missing seed files are
/// skipped with a warning.
pub async fn seed_missing(
    store: Arc<dyn DocumentStore>,
    config: &SeedConfig,
) -> Result<SeedReport, SeedError> {
    let songs = SongRepository::new(store.clone());
    let ratings = RatingRepository::new(store);
    let existing = songs.list_collection_names().await?;
    let mut report = SeedReport::default();

    if let Some(path) = &config.songs_path {
        if existing.iter().any(|c| c == SONGS) {
            info!("Songs collection present, skipping seed");
        } else if path.exists() {
            report.songs = import_songs(&songs, path).await?;
            info!(count = report.songs, path = %path.display(), "Imported songs");
        } else {
            warn!(path = %path.display(), "Songs seed file not found");
        }
    }

    if let Some(path) = &config.ratings_path {
        if existing.iter().any(|c| c == RATINGS) {
            info!("Ratings collection present, skipping seed");
        } else if path.exists() {
            report.ratings = import_ratings(&ratings, path).await?;
            info!(count = report.ratings, path = %path.display(), "Imported ratings");
        } else {
            warn!(path = %path.display(), "Ratings seed file not found");
        }
    }

    Ok(report)
}
