use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::FindOptions as CursorOptions;
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use super::{
    Document, DocumentStore, Filter, FindOptions, ObjectId, Pipeline, StoreError, StoreResult,
};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed store over one database.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Build a client for `uri` and select `database`. The driver connects
    /// lazily, so an unreachable server surfaces on the first operation.
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        info!("Using MongoDB database '{}'", database);
        Ok(Self {
            db: client.database(database),
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

fn insert_error(err: mongodb::error::Error, collection: &str, id: ObjectId) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            }
        }
        _ => StoreError::Mongo(err),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.db.list_collection_names(None).await?)
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> StoreResult<ObjectId> {
        let id = match doc.get_object_id("_id") {
            Ok(id) => id,
            Err(_) => {
                let id = ObjectId::new();
                doc.insert("_id", id);
                id
            }
        };

        self.collection(collection)
            .insert_one(doc, None)
            .await
            .map_err(|e| insert_error(e, collection, id))?;
        debug!("Inserted {} into {}", id, collection);
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let cursor_options = CursorOptions::builder()
            .skip(options.skip)
            .limit(options.limit.filter(|l| *l > 0).map(|l| l as i64))
            .build();

        let cursor = self
            .collection(collection)
            .find(filter.to_document(), cursor_options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let result = self
            .collection(collection)
            .delete_one(filter.to_document(), None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .aggregate(pipeline.to_stages(), None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.collection(collection).drop(None).await?;
        Ok(())
    }

    async fn drop_database(&self) -> StoreResult<()> {
        self.db.drop(None).await?;
        Ok(())
    }
}
