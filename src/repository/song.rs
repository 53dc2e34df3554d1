use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{RepositoryError, RepositoryResult, decode_all, parse_object_id, to_document};
use crate::storage::{Accumulator, Bson, DocumentStore, Filter, FindOptions, Group, Pipeline};

pub const SONGS: &str = "songs";

/// Fields accepted when adding a song. Unknown keys are kept in `extra` and
/// stored alongside the known ones, except `_id`, which the store assigns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSong {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored song with its identifier as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone)]
pub struct SongRepository {
    store: Arc<dyn DocumentStore>,
}

impl SongRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list_collection_names(&self) -> RepositoryResult<Vec<String>> {
        let names = self.store.list_collection_names().await?;
        debug!(?names, "Collection names");
        Ok(names)
    }

    /// Insert a song and return its new identifier.
    pub async fn create(&self, song: &NewSong) -> RepositoryResult<String> {
        let mut doc = to_document(song)?;
        if doc.remove("_id").is_some() {
            warn!("Ignoring client supplied _id on new song");
        }
        let id = self.store.insert_one(SONGS, doc).await?;
        debug!(%id, "Created song");
        Ok(id.to_hex())
    }

    pub async fn list_all(&self) -> RepositoryResult<Vec<Song>> {
        let docs = self
            .store
            .find(SONGS, &Filter::All, FindOptions::default())
            .await?;
        decode_all(docs)
    }

    /// One page of songs in natural order. Pages are numbered from 1; lower
    /// numbers are treated as the first page.
    pub async fn list(&self, page_size: u64, page_number: u64) -> RepositoryResult<Vec<Song>> {
        let skip = page_size.saturating_mul(page_number.max(1) - 1);
        debug!(page_size, page_number, skip, "Listing songs page");

        let docs = self
            .store
            .find(SONGS, &Filter::All, FindOptions::page(skip, page_size))
            .await?;
        decode_all(docs)
    }

    /// Case-insensitive substring search over artist and title.
    pub async fn search_by(&self, keyword: &str) -> RepositoryResult<Vec<Song>> {
        debug!(keyword, "Searching songs");
        let filter = Filter::Or(vec![
            Filter::contains("artist", keyword),
            Filter::contains("title", keyword),
        ]);
        let docs = self.store.find(SONGS, &filter, FindOptions::default()).await?;
        decode_all(docs)
    }

    pub async fn search_by_level(&self, level: i64) -> RepositoryResult<Vec<Song>> {
        let docs = self
            .store
            .find(SONGS, &Filter::eq("level", level), FindOptions::default())
            .await?;
        decode_all(docs)
    }

    /// Mean `level` over the whole collection, `None` when it is empty.
    pub async fn average_level(&self) -> RepositoryResult<Option<f64>> {
        self.average_of("level").await
    }

    /// Mean `difficulty` over the whole collection, `None` when it is empty.
    pub async fn average_difficulty(&self) -> RepositoryResult<Option<f64>> {
        self.average_of("difficulty").await
    }

    async fn average_of(&self, field: &str) -> RepositoryResult<Option<f64>> {
        let pipeline = Pipeline::group(
            Group::all().with("avg_value", Accumulator::Avg(field.to_string())),
        );
        let groups = self.store.aggregate(SONGS, &pipeline).await?;

        Ok(groups
            .first()
            .and_then(|doc| doc.get("avg_value"))
            .and_then(Bson::as_f64))
    }

    /// Delete one song. Returns `false` when nothing matched.
    pub async fn delete(&self, song_id: &str) -> RepositoryResult<bool> {
        if song_id.is_empty() {
            return Err(RepositoryError::InvalidArgument(
                "Missing song_id parameter".to_string(),
            ));
        }

        let id = parse_object_id(song_id)?;
        let deleted = self.store.delete_one(SONGS, &Filter::id(id)).await?;
        debug!(%id, deleted, "Delete song");
        Ok(deleted == 1)
    }

    /// Remove the songs collection. Used to undo a partial import.
    pub async fn drop_collection(&self) -> RepositoryResult<()> {
        self.store.drop_collection(SONGS).await?;
        Ok(())
    }

    pub async fn drop_database(&self) -> RepositoryResult<()> {
        self.store.drop_database().await?;
        Ok(())
    }
}
