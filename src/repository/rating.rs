use mongodb::bson::{Bson, DateTime, doc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{RepositoryError, RepositoryResult, as_i64, decode_all, parse_object_id};
use crate::storage::{Accumulator, DocumentStore, Filter, FindOptions, Group, ObjectId, Pipeline};

pub const RATINGS: &str = "ratings";

pub const INVALID_RATING: &str = "Invalid rating value. Accepted values are 1, 2, 3, 4 and 5";

/// A rating as submitted: an integer, a numeric string, or any other JSON
/// value. Of the latter only whole numbers such as `3.0` pass validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingInput {
    Integer(i64),
    Text(String),
    Other(Value),
}

impl RatingInput {
    fn is_empty(&self) -> bool {
        matches!(self, RatingInput::Text(s) if s.is_empty())
    }

    /// The rating as an integer in 1..=5.
    pub fn validate(&self) -> RepositoryResult<i64> {
        let value = match self {
            RatingInput::Integer(n) => Some(*n),
            RatingInput::Text(s) if s.len() == 1 => s.parse().ok(),
            RatingInput::Other(Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64),
            _ => None,
        };

        value
            .filter(|n| (1..=5).contains(n))
            .ok_or_else(|| RepositoryError::InvalidValue(INVALID_RATING.to_string()))
    }
}

impl From<i64> for RatingInput {
    fn from(n: i64) -> Self {
        RatingInput::Integer(n)
    }
}

impl From<i32> for RatingInput {
    fn from(n: i32) -> Self {
        RatingInput::Integer(n.into())
    }
}

impl From<Value> for RatingInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => match n.as_i64() {
                Some(i) => RatingInput::Integer(i),
                None => RatingInput::Other(Value::Number(n)),
            },
            Value::String(s) => RatingInput::Text(s),
            other => RatingInput::Other(other),
        }
    }
}

impl From<&str> for RatingInput {
    fn from(s: &str) -> Self {
        RatingInput::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRating {
    pub song_id: String,
    pub rating: RatingInput,
}

impl NewRating {
    pub fn new(song_id: impl Into<String>, rating: impl Into<RatingInput>) -> Self {
        Self {
            song_id: song_id.into(),
            rating: rating.into(),
        }
    }

    /// Check the rating without storing it, in the order the API reports
    /// problems: empty song id, empty rating, rating value, id syntax.
    pub fn validate(&self) -> RepositoryResult<(ObjectId, i64)> {
        if self.song_id.is_empty() {
            return Err(RepositoryError::InvalidValue(
                "Empty string of song ID found".to_string(),
            ));
        }
        if self.rating.is_empty() {
            return Err(RepositoryError::InvalidValue(
                "Empty string of rating found".to_string(),
            ));
        }

        let value = self.rating.validate()?;
        let song_id = parse_object_id(&self.song_id)?;
        Ok((song_id, value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(rename = "_id")]
    pub id: String,
    pub song_id: String,
    pub rating: i64,
    #[serde(default)]
    pub creation_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingList {
    pub total: usize,
    pub output: Vec<Rating>,
}

/// Average, lowest and highest rating of one song. All `None` when the song
/// has no ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatingStat {
    pub avg_value: Option<f64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

#[derive(Clone)]
pub struct RatingRepository {
    store: Arc<dyn DocumentStore>,
}

impl RatingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Validate and store a rating, stamping it with the current UTC time.
    ///
    /// The referenced song is not looked up; only the identifier syntax is
    /// checked.
    pub async fn create(&self, rating: &NewRating) -> RepositoryResult<String> {
        let (song_id, value) = rating.validate()?;
        let doc = doc! {
            "song_id": song_id,
            "rating": value,
            "creation_date": DateTime::now(),
        };

        let id = self.store.insert_one(RATINGS, doc).await?;
        debug!(%id, %song_id, rating = value, "Created rating");
        Ok(id.to_hex())
    }

    pub async fn list_all(&self) -> RepositoryResult<RatingList> {
        let docs = self
            .store
            .find(RATINGS, &Filter::All, FindOptions::default())
            .await?;
        let output: Vec<Rating> = decode_all(docs)?;
        debug!(total = output.len(), "Listed ratings");

        Ok(RatingList {
            total: output.len(),
            output,
        })
    }

    /// Remove the ratings collection. Used to undo a partial import.
    pub async fn drop_collection(&self) -> RepositoryResult<()> {
        self.store.drop_collection(RATINGS).await?;
        Ok(())
    }

    pub async fn stat(&self, song_id: &str) -> RepositoryResult<RatingStat> {
        let id = parse_object_id(song_id)?;
        let pipeline = Pipeline::matching(
            Filter::eq("song_id", id),
            Group::all()
                .with("avg_value", Accumulator::Avg("rating".to_string()))
                .with("min_value", Accumulator::Min("rating".to_string()))
                .with("max_value", Accumulator::Max("rating".to_string())),
        );

        let groups = self.store.aggregate(RATINGS, &pipeline).await?;
        let Some(group) = groups.first() else {
            return Ok(RatingStat::default());
        };

        Ok(RatingStat {
            avg_value: group.get("avg_value").and_then(Bson::as_f64),
            min_value: group.get("min_value").and_then(as_i64),
            max_value: group.get("max_value").and_then(as_i64),
        })
    }
}
