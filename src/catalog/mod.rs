/// Book catalog
///
/// Aggregations, ranking and record management for books, users and
/// comments.

pub mod aggregation;
pub mod books;
pub mod comments;
pub mod enrichment;
pub mod models;
pub mod ranking;
pub mod users;

pub use aggregation::AggregationEngine;
pub use books::BookManager;
pub use comments::CommentManager;
pub use users::UserManager;

use crate::{
    config::QueryConfig,
    error::{CatalogError, CatalogResult},
    store::{Collection, Document, Filter, FindOptions, RecordStore, ID_FIELD},
};
use serde::Serialize;

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Parse raw `page` / `limit` query values. Missing values fall back to
    /// page 1 and the configured page size; `limit` is capped at the maximum.
    pub fn parse(page: Option<&str>, limit: Option<&str>, config: &QueryConfig) -> CatalogResult<Self> {
        let page = match page {
            Some(raw) => parse_positive(raw, "page")?,
            None => 1,
        };
        let limit = match limit {
            Some(raw) => parse_positive(raw, "limit")?,
            None => config.default_page_size,
        };

        Ok(Self {
            page,
            limit: limit.min(config.max_page_size),
        })
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_positive(raw: &str, name: &str) -> CatalogResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(CatalogError::InvalidArgument(format!(
            "'{}' must be a positive integer",
            name
        ))),
    }
}

/// One page of records with paging metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub data: Vec<Document>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total: u64,
    pub limit: u64,
}

/// Shared record operations for a single collection
#[derive(Clone)]
pub(crate) struct Records {
    collection: Collection,
    /// Singular noun used in messages
    noun: &'static str,
}

impl Records {
    pub(crate) const fn new(collection: Collection, noun: &'static str) -> Self {
        Self { collection, noun }
    }

    pub(crate) async fn page(&self, store: &dyn RecordStore, request: PageRequest) -> CatalogResult<Page> {
        let data = store
            .find(
                self.collection,
                &Filter::All,
                FindOptions::page(request.skip(), request.limit),
            )
            .await?;
        let total = store.count_documents(self.collection, &Filter::All).await?;

        Ok(Page {
            data,
            current_page: request.page,
            total_pages: total.div_ceil(request.limit),
            total,
            limit: request.limit,
        })
    }

    pub(crate) async fn get(&self, store: &dyn RecordStore, id: i64) -> CatalogResult<Document> {
        store
            .find_one(self.collection, &Filter::Id(id))
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("{} {} not found", self.noun, id)))
    }

    pub(crate) async fn insert(&self, store: &dyn RecordStore, documents: Vec<Document>) -> CatalogResult<Vec<i64>> {
        // Identities come from the store, never from the client
        let documents = documents
            .into_iter()
            .map(|mut doc| {
                doc.remove(ID_FIELD);
                doc
            })
            .collect();
        let ids = store.insert_many(self.collection, documents).await?;
        tracing::info!(collection = %self.collection, count = ids.len(), "records_inserted");
        Ok(ids)
    }

    pub(crate) async fn update(&self, store: &dyn RecordStore, id: i64, mut fields: Document) -> CatalogResult<()> {
        fields.remove(ID_FIELD);
        if fields.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "No fields provided for update".to_string(),
            ));
        }

        if !store.update_one(self.collection, id, fields).await? {
            return Err(CatalogError::NotFound(format!("{} {} not found", self.noun, id)));
        }
        tracing::info!(collection = %self.collection, id, "record_updated");
        Ok(())
    }

    pub(crate) async fn delete(&self, store: &dyn RecordStore, id: i64) -> CatalogResult<()> {
        if !store.delete_one(self.collection, id).await? {
            return Err(CatalogError::NotFound(format!("{} {} not found", self.noun, id)));
        }
        tracing::info!(collection = %self.collection, id, "record_deleted");
        Ok(())
    }
}
