//! Data access for the `songs` and `ratings` collections.

pub mod rating;
pub mod song;

pub use rating::{NewRating, Rating, RatingInput, RatingList, RatingRepository, RatingStat};
pub use song::{NewSong, Song, SongRepository};

use crate::storage::{self, Bson, Document, ObjectId, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Input rejected by a business rule. The message is user facing.
    #[error("{0}")]
    InvalidValue(String),

    /// A required argument was not supplied.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Stored document has unexpected shape: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Could not encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parse a client-supplied identifier, reporting failures as invalid input.
pub(crate) fn parse_object_id(raw: &str) -> RepositoryResult<ObjectId> {
    storage::parse_object_id(raw).map_err(|e| RepositoryError::InvalidValue(e.to_string()))
}

pub(crate) fn to_document<T: Serialize>(value: &T) -> RepositoryResult<Document> {
    Ok(mongodb::bson::to_document(value)?)
}

/// Render a stored document as JSON, replacing ObjectIds and dates at the top
/// level with their string forms.
pub(crate) fn to_plain(doc: Document) -> Map<String, Value> {
    let Value::Object(fields) = Bson::Document(doc).into_relaxed_extjson() else {
        return Map::new();
    };

    fields
        .into_iter()
        .map(|(key, value)| {
            let plain = match &value {
                Value::Object(inner) if inner.len() == 1 => inner
                    .get("$oid")
                    .or_else(|| inner.get("$date"))
                    .and_then(Value::as_str)
                    .map(|s| Value::String(s.to_string())),
                _ => None,
            };
            (key, plain.unwrap_or(value))
        })
        .collect()
}

pub(crate) fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> RepositoryResult<Vec<T>> {
    docs.into_iter()
        .map(|doc| -> RepositoryResult<T> {
            Ok(serde_json::from_value(Value::Object(to_plain(doc)))?)
        })
        .collect()
}

/// Integer value of a numeric aggregation result.
pub(crate) fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}
