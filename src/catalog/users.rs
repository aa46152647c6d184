/// User records and the per-user top books view
use super::{
    enrichment::{render, Enriched},
    models::{decode, validate_payload, Review, Reviewer, UserPayload},
    ranking::{top_n, TopLimit},
    Page, PageRequest, Records,
};
use crate::{
    error::{CatalogError, CatalogResult},
    store::{document_id, Collection, Document, Filter, FindOptions, RecordStore},
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};

const USERS: Records = Records::new(Collection::Users, "User");

/// User detail view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user: Document,
    /// Highest scored books first, each carrying the user's `score`
    pub top_books: Vec<Document>,
}

/// User manager
#[derive(Clone)]
pub struct UserManager {
    store: Arc<dyn RecordStore>,
    top_reviews: TopLimit,
}

impl UserManager {
    pub fn new(store: Arc<dyn RecordStore>, top_reviews: TopLimit) -> Self {
        Self { store, top_reviews }
    }

    pub async fn list(&self, request: PageRequest) -> CatalogResult<Page> {
        USERS.page(self.store.as_ref(), request).await
    }

    /// One user with their best scored books.
    ///
    /// Reviews are ranked by score before truncation, ties keep the order in
    /// which the user wrote them. Reviews of books that no longer exist are
    /// skipped.
    pub async fn detail(&self, id: i64) -> CatalogResult<UserDetail> {
        let user = USERS.get(self.store.as_ref(), id).await?;
        let reviewer: Reviewer = decode(&user)?;

        let top: Vec<Review> = top_n(reviewer.reviews().to_vec(), self.top_reviews, Review::points);
        let ids: Vec<i64> = top.iter().map(|r| r.book_id).collect();
        let books: HashMap<i64, Document> = self
            .store
            .find(Collection::Books, &Filter::IdIn(ids), FindOptions::default())
            .await?
            .into_iter()
            .filter_map(|book| Some((document_id(&book)?, book)))
            .collect();

        let top_books = top
            .iter()
            .filter_map(|review| {
                Some(Enriched {
                    record: books.get(&review.book_id)?.clone(),
                    metric: review.score.clone(),
                })
            })
            .collect();

        Ok(UserDetail {
            user,
            top_books: render(top_books, "score"),
        })
    }

    pub async fn create(&self, users: Vec<Document>) -> CatalogResult<Vec<i64>> {
        if users.is_empty() {
            return Err(CatalogError::InvalidArgument("No users provided".to_string()));
        }
        for user in &users {
            validate_payload::<UserPayload>(user)?;
        }
        USERS.insert(self.store.as_ref(), users).await
    }

    pub async fn update(&self, id: i64, fields: Document) -> CatalogResult<()> {
        USERS.update(self.store.as_ref(), id, fields).await
    }

    pub async fn delete(&self, id: i64) -> CatalogResult<()> {
        USERS.delete(self.store.as_ref(), id).await
    }
}
