//! Document store abstraction.
//!
//! Repositories talk to a [`DocumentStore`] through named collections of BSON
//! documents. [`MongoStore`] is the backend the service runs on;
//! [`MemoryStore`] evaluates the same queries in process and stands in for
//! MongoDB in tests.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use mongodb::bson::oid::ObjectId;
pub use mongodb::bson::{Bson, Document};

use crate::config::DatabaseConfig;
use async_trait::async_trait;
use mongodb::bson::doc;
use std::sync::Arc;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("'{0}' is not a valid ObjectId, it must be a 12-byte input or a 24-character hex string")]
    InvalidObjectId(String),

    #[error("E11000 duplicate key error collection: {collection} dup key: {{ _id: {id} }}")]
    DuplicateKey { collection: String, id: ObjectId },

    #[error("Unsupported database uri: {0}")]
    UnsupportedUri(String),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// Parse the 24-character hex form of an ObjectId.
pub fn parse_object_id(raw: &str) -> StoreResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| StoreError::InvalidObjectId(raw.to_string()))
}

/// Query predicate over top-level document fields.
#[derive(Debug, Clone, Default)]
pub enum Filter {
    #[default]
    All,
    Eq(String, Bson),
    /// Case-insensitive substring match on a string field.
    Contains(String, String),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn id(id: ObjectId) -> Self {
        Filter::eq("_id", id)
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Contains(field.into(), needle.into())
    }

    /// MongoDB query document for this filter.
    pub fn to_document(&self) -> Document {
        let mut query = Document::new();
        match self {
            Filter::All => {}
            Filter::Eq(field, value) => {
                query.insert(field.clone(), value.clone());
            }
            Filter::Contains(field, needle) => {
                query.insert(
                    field.clone(),
                    doc! { "$regex": regex::escape(needle), "$options": "i" },
                );
            }
            Filter::Or(filters) => {
                let branches: Vec<Document> = filters.iter().map(Filter::to_document).collect();
                query.insert("$or", branches);
            }
        }
        query
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, expected) => doc
                .get(field)
                .is_some_and(|actual| values_equal(actual, expected)),
            Filter::Contains(field, needle) => doc
                .get_str(field)
                .is_ok_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => i64::from(*x) == *y,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Cursor options for [`DocumentStore::find`]. A `limit` of `None` or `0`
/// returns every remaining document.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn page(skip: u64, limit: u64) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Avg(String),
    Min(String),
    Max(String),
}

impl Accumulator {
    fn to_document(&self) -> Document {
        match self {
            Accumulator::Avg(field) => doc! { "$avg": format!("${field}") },
            Accumulator::Min(field) => doc! { "$min": format!("${field}") },
            Accumulator::Max(field) => doc! { "$max": format!("${field}") },
        }
    }

    fn apply(&self, docs: &[&Document]) -> Bson {
        let numbers = |field: &str| {
            docs.iter()
                .filter_map(|d| d.get(field))
                .filter_map(|v| as_number(v).map(|n| (n, v.clone())))
                .collect::<Vec<_>>()
        };

        match self {
            Accumulator::Avg(field) => {
                let values = numbers(field.as_str());
                if values.is_empty() {
                    Bson::Null
                } else {
                    let sum: f64 = values.iter().map(|(n, _)| n).sum();
                    Bson::Double(sum / values.len() as f64)
                }
            }
            Accumulator::Min(field) => numbers(field.as_str())
                .into_iter()
                .min_by(|(a, _), (b, _)| a.total_cmp(b))
                .map_or(Bson::Null, |(_, v)| v),
            Accumulator::Max(field) => numbers(field.as_str())
                .into_iter()
                .max_by(|(a, _), (b, _)| a.total_cmp(b))
                .map_or(Bson::Null, |(_, v)| v),
        }
    }
}

/// Grouping stage that folds every matched document into one group whose
/// `_id` is `null`.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub accumulators: Vec<(String, Accumulator)>,
}

impl Group {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.into(), accumulator));
        self
    }
}

/// A `$match` followed by a `$group`.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub filter: Filter,
    pub group: Group,
}

impl Pipeline {
    pub fn group(group: Group) -> Self {
        Self {
            filter: Filter::All,
            group,
        }
    }

    pub fn matching(filter: Filter, group: Group) -> Self {
        Self { filter, group }
    }

    /// Aggregation stages as sent to MongoDB.
    pub fn to_stages(&self) -> Vec<Document> {
        let mut group = doc! { "_id": Bson::Null };
        for (name, accumulator) in &self.group.accumulators {
            group.insert(name.clone(), accumulator.to_document());
        }
        vec![
            doc! { "$match": self.filter.to_document() },
            doc! { "$group": group },
        ]
    }

    /// Evaluate the pipeline in process. No matching documents means no group.
    pub fn run<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let members: Vec<&Document> = docs
            .into_iter()
            .filter(|d| self.filter.matches(d))
            .collect();
        if members.is_empty() {
            return Vec::new();
        }

        let mut out = doc! { "_id": Bson::Null };
        for (name, accumulator) in &self.group.accumulators {
            out.insert(name.clone(), accumulator.apply(&members));
        }
        vec![out]
    }
}

/// Storage backend shared by all repositories.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of collections that currently exist.
    async fn list_collection_names(&self) -> StoreResult<Vec<String>>;

    /// Insert a document, assigning `_id` when missing. An `_id` that is
    /// already taken fails with [`StoreError::DuplicateKey`].
    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<ObjectId>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>>;

    /// Remove the first matching document, returning how many were removed.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>>;

    /// Remove a collection and its documents. Missing collections are ignored.
    async fn drop_collection(&self, collection: &str) -> StoreResult<()>;

    async fn drop_database(&self) -> StoreResult<()>;
}

/// Open the MongoDB database named by a database configuration.
pub async fn connect(config: &DatabaseConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    let uri = config.uri.as_str();

    if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        let store = MongoStore::connect(uri, &config.name).await?;
        return Ok(Arc::new(store));
    }

    Err(StoreError::UnsupportedUri(config.uri.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_id_reports_input() {
        let id = parse_object_id("5c6c4b562e48ae1c0f1a6d8a").unwrap();
        assert_eq!(id.to_hex(), "5c6c4b562e48ae1c0f1a6d8a");

        let err = parse_object_id("bogus").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'bogus' is not a valid ObjectId, it must be a 12-byte input or a 24-character hex string"
        );
        assert!(parse_object_id("5c6c4b562e48ae1c0f1a6d8").is_err());
    }

    #[test]
    fn eq_compares_numbers_numerically() {
        let d = doc! { "level": 9.0 };
        assert!(Filter::eq("level", 9i64).matches(&d));
        assert!(Filter::eq("level", 9).matches(&doc! { "level": 9i64 }));
        assert!(!Filter::eq("level", 8i64).matches(&d));
        assert!(!Filter::eq("missing", 9i64).matches(&d));
    }

    #[test]
    fn contains_is_case_insensitive_and_literal() {
        let filter = Filter::Or(vec![
            Filter::contains("artist", "NIGHT"),
            Filter::contains("title", "NIGHT"),
        ]);
        assert!(filter.matches(&doc! { "artist": "x", "title": "Wishing In The Night" }));
        assert!(!filter.matches(&doc! { "artist": "x", "title": "Lycanthropic" }));
        assert!(!filter.matches(&doc! { "artist": 1, "title": Bson::Null }));

        assert!(Filter::contains("title", "a.b").matches(&doc! { "title": "xa.by" }));
        assert!(!Filter::contains("title", "a.b").matches(&doc! { "title": "axb" }));
    }

    #[test]
    fn filter_translates_to_mongo_query() {
        assert_eq!(Filter::All.to_document(), doc! {});
        assert_eq!(
            Filter::eq("level", 9i64).to_document(),
            doc! { "level": 9i64 }
        );
        assert_eq!(
            Filter::Or(vec![Filter::contains("title", "a.b")]).to_document(),
            doc! { "$or": [ { "title": { "$regex": "a\\.b", "$options": "i" } } ] }
        );
    }

    #[test]
    fn pipeline_translates_to_match_and_group() {
        let id = parse_object_id("5c6c4b562e48ae1c0f1a6d8a").unwrap();
        let pipeline = Pipeline::matching(
            Filter::eq("song_id", id),
            Group::all()
                .with("avg_value", Accumulator::Avg("rating".into()))
                .with("min_value", Accumulator::Min("rating".into())),
        );

        assert_eq!(
            pipeline.to_stages(),
            vec![
                doc! { "$match": { "song_id": id } },
                doc! { "$group": {
                    "_id": Bson::Null,
                    "avg_value": { "$avg": "$rating" },
                    "min_value": { "$min": "$rating" },
                } },
            ]
        );
    }

    #[test]
    fn pipeline_single_group_stats() {
        let docs = vec![
            doc! { "song_id": "a", "rating": 3i64 },
            doc! { "song_id": "a", "rating": 5i64 },
            doc! { "song_id": "b", "rating": 1i64 },
        ];
        let pipeline = Pipeline::matching(
            Filter::eq("song_id", "a"),
            Group::all()
                .with("avg", Accumulator::Avg("rating".into()))
                .with("min", Accumulator::Min("rating".into()))
                .with("max", Accumulator::Max("rating".into())),
        );

        let out = pipeline.run(&docs);
        assert_eq!(
            out,
            vec![doc! { "_id": Bson::Null, "avg": 4.0, "min": 3i64, "max": 5i64 }]
        );
    }

    #[test]
    fn pipeline_without_matches_yields_no_groups() {
        let docs = vec![doc! { "rating": 3 }];
        let pipeline = Pipeline::matching(
            Filter::eq("song_id", "nope"),
            Group::all().with("avg", Accumulator::Avg("rating".into())),
        );
        assert!(pipeline.run(&docs).is_empty());
    }

    #[test]
    fn avg_ignores_non_numeric_values() {
        let docs = vec![
            doc! { "difficulty": "hard" },
            doc! { "difficulty": 2 },
            doc! {},
        ];
        let out = Pipeline::group(Group::all().with("avg", Accumulator::Avg("difficulty".into())))
            .run(&docs);
        assert_eq!(out[0].get_f64("avg").unwrap(), 2.0);
    }

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        let config = DatabaseConfig {
            name: "songs_db".into(),
            uri: "postgres://localhost/songs_db".into(),
        };
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedUri(_)));
    }

    #[tokio::test]
    async fn connect_accepts_mongodb_uri_without_reaching_server() {
        let config = DatabaseConfig {
            name: "test_songs_db".into(),
            uri: "mongodb://localhost:27017".into(),
        };
        assert!(connect(&config).await.is_ok());
    }
}
