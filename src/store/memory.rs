/// In-memory record store
use super::{document_id, strip_identity, Collection, Document, Filter, FindOptions, RecordStore};
use crate::error::CatalogResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    documents: HashMap<Collection, BTreeMap<i64, Document>>,
    /// Highest identity ever handed out per collection
    last_ids: HashMap<Collection, i64>,
}

/// Record store kept entirely in process memory
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Collections>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store documents under the identities they already carry.
    ///
    /// Used to load fixtures; documents without an integral `_id` are skipped.
    pub async fn seed(&self, collection: Collection, documents: Vec<Document>) {
        let mut inner = self.inner.write().await;
        for doc in documents {
            if let Some(id) = document_id(&doc) {
                inner.documents.entry(collection).or_default().insert(id, doc);
                let last = inner.last_ids.entry(collection).or_insert(0);
                *last = (*last).max(id);
            }
        }
    }
}

fn apply_fields(doc: &mut Document, fields: &Document) {
    for (key, value) in fields {
        doc.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> CatalogResult<Vec<Document>> {
        let inner = self.inner.read().await;
        let Some(docs) = inner.documents.get(&collection) else {
            return Ok(Vec::new());
        };

        let matching = docs
            .values()
            .filter(|doc| filter.matches(doc))
            .skip(options.skip as usize)
            .cloned();

        Ok(match options.limit {
            Some(limit) => matching.take(limit as usize).collect(),
            None => matching.collect(),
        })
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> CatalogResult<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(&collection)
            .and_then(|docs| docs.values().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> CatalogResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(&collection)
            .map_or(0, |docs| docs.values().filter(|doc| filter.matches(doc)).count() as u64))
    }

    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> CatalogResult<Vec<i64>> {
        let mut inner = self.inner.write().await;
        let mut next = inner.last_ids.get(&collection).copied().unwrap_or(0);

        let mut ids = Vec::with_capacity(documents.len());
        let docs = inner.documents.entry(collection).or_default();
        for mut doc in documents {
            next += 1;
            doc.insert(super::ID_FIELD.to_string(), Value::from(next));
            docs.insert(next, doc);
            ids.push(next);
        }
        inner.last_ids.insert(collection, next);

        Ok(ids)
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: i64,
        fields: Document,
    ) -> CatalogResult<bool> {
        let fields = strip_identity(fields);
        let mut inner = self.inner.write().await;
        match inner
            .documents
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(&id))
        {
            Some(doc) => {
                apply_fields(doc, &fields);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Document,
    ) -> CatalogResult<u64> {
        let fields = strip_identity(fields);
        let mut inner = self.inner.write().await;
        let Some(docs) = inner.documents.get_mut(&collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        for doc in docs.values_mut().filter(|doc| filter.matches(doc)) {
            apply_fields(doc, &fields);
            matched += 1;
        }
        Ok(matched)
    }

    async fn delete_one(&self, collection: Collection, id: i64) -> CatalogResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .documents
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id))
            .is_some())
    }

    async fn ping(&self) -> CatalogResult<()> {
        Ok(())
    }
}
