use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{
    Document, DocumentStore, Filter, FindOptions, ObjectId, Pipeline, StoreError, StoreResult,
};

/// In-process stand-in for [`super::MongoStore`], used by tests. Collections
/// keep insertion order and `_id` is unique per collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> StoreResult<ObjectId> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = match doc.get_object_id("_id") {
            Ok(id) => id,
            Err(_) => {
                let id = ObjectId::new();
                doc.insert("_id", id);
                id
            }
        };

        let taken = docs
            .iter()
            .any(|d| d.get_object_id("_id").is_ok_and(|existing| existing == id));
        if taken {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            });
        }

        docs.push(doc);
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let matched = docs
            .iter()
            .filter(|d| filter.matches(d))
            .skip(options.skip as usize);

        let out = match options.limit {
            Some(limit) if limit > 0 => matched.take(limit as usize).cloned().collect(),
            _ => matched.cloned().collect(),
        };
        Ok(out)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| pipeline.run(docs))
            .unwrap_or_default())
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn drop_database(&self) -> StoreResult<()> {
        self.collections.write().await.clear();
        Ok(())
    }
}
