/// Book queries: rankings, detail view, filters and record management
use super::{
    aggregation::AggregationEngine,
    enrichment::{join_metric, render, Enriched},
    models::{validate_payload, BookPayload},
    ranking::{rank_by, top_n, SortOrder, TopLimit},
    Page, PageRequest, Records,
};
use crate::{
    error::{CatalogError, CatalogResult},
    store::{Collection, Document, Filter, FindOptions, RecordStore},
};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

const BOOKS: Records = Records::new(Collection::Books, "Book");

/// Book detail view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    pub book: Document,
    /// `null` when the book has no reviews
    pub average_score: Option<f64>,
    pub comments: Vec<Document>,
}

/// Review count for one reviewer job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReviews {
    pub job: Option<String>,
    pub total_reviews: u64,
}

/// Conjunctive book search criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub category: Option<String>,
    pub author: Option<String>,
}

impl BookFilter {
    fn to_filter(&self) -> Filter {
        let mut parts = Vec::new();
        if self.price_min.is_some() || self.price_max.is_some() {
            parts.push(Filter::Range {
                path: "price".to_string(),
                min: self.price_min,
                max: self.price_max,
            });
        }
        if let Some(category) = &self.category {
            parts.push(Filter::contains("categories", category.as_str()));
        }
        if let Some(author) = &self.author {
            parts.push(Filter::contains("authors", author.as_str()));
        }
        Filter::And(parts)
    }
}

/// Year a book was published, from an RFC 3339 string, an extended-JSON
/// `{"$date": ..}` wrapper or epoch milliseconds
fn published_year(book: &Document) -> Option<i32> {
    let value = book.get("publishedDate")?;
    let value = value.get("$date").unwrap_or(value);
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok()
            .map(|dt| dt.with_timezone(&Utc).year()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.year()),
        _ => None,
    }
}

/// Book manager
#[derive(Clone)]
pub struct BookManager {
    store: Arc<dyn RecordStore>,
    aggregation: AggregationEngine,
}

impl BookManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            aggregation: AggregationEngine::new(Arc::clone(&store)),
            store,
        }
    }

    /// Load the books referenced by a metric map, in identity order
    async fn books_for<M: Copy>(&self, metrics: &BTreeMap<i64, M>) -> CatalogResult<Vec<Enriched<M>>> {
        let ids: Vec<i64> = metrics.keys().copied().collect();
        let books = self
            .store
            .find(Collection::Books, &Filter::IdIn(ids), FindOptions::default())
            .await?;
        Ok(join_metric(books, metrics))
    }

    pub async fn list(&self, request: PageRequest) -> CatalogResult<Page> {
        BOOKS.page(self.store.as_ref(), request).await
    }

    /// Books with at least one five-star review, most five-star reviews first
    pub async fn five_star_ranking(&self) -> CatalogResult<Vec<Document>> {
        let counts = self.aggregation.five_star_by_book().await?;
        let mut books = self.books_for(&counts).await?;
        rank_by(&mut books, SortOrder::Desc, |b| b.metric);
        Ok(render(books, "fiveStarReviews"))
    }

    /// Books with at least one comment, most commented first
    pub async fn comment_ranking(&self) -> CatalogResult<Vec<Document>> {
        let counts = self.aggregation.comments_by_book().await?;
        let mut books = self.books_for(&counts).await?;
        rank_by(&mut books, SortOrder::Desc, |b| b.metric);
        Ok(render(books, "totalComments"))
    }

    /// Review totals per reviewer job, highest first
    pub async fn reviews_by_job(&self) -> CatalogResult<Vec<JobReviews>> {
        let counts = self.aggregation.reviews_by_job().await?;
        let mut jobs: Vec<JobReviews> = counts
            .into_iter()
            .map(|(job, total_reviews)| JobReviews { job, total_reviews })
            .collect();
        rank_by(&mut jobs, SortOrder::Desc, |j| j.total_reviews);
        Ok(jobs)
    }

    /// The `limit` books with the highest average score
    pub async fn top_by_score(&self, limit: TopLimit) -> CatalogResult<Vec<Document>> {
        let averages = self.aggregation.average_score_by_book(None).await?;
        let books = self.books_for(&averages).await?;
        let top = top_n(books, limit, |b| b.metric);
        Ok(render(top, "averageScore"))
    }

    /// Reviewed books ordered by how many reviews they have
    pub async fn ranking_by_reviews(&self, order: SortOrder) -> CatalogResult<Vec<Document>> {
        let counts = self.aggregation.reviews_by_book().await?;
        let mut books = self.books_for(&counts).await?;
        rank_by(&mut books, order, |b| b.metric);
        Ok(render(books, "totalReviews"))
    }

    /// One book with its average score and comments
    pub async fn detail(&self, id: i64) -> CatalogResult<BookDetail> {
        let book = BOOKS.get(self.store.as_ref(), id).await?;
        let comments = self
            .store
            .find(
                Collection::Comments,
                &Filter::eq("book_id", id),
                FindOptions::default(),
            )
            .await?;
        let average_score = self.aggregation.average_score_of(id).await?;

        Ok(BookDetail {
            book,
            average_score,
            comments,
        })
    }

    /// Books matching every given criterion
    pub async fn search(&self, criteria: &BookFilter) -> CatalogResult<Vec<Document>> {
        let books = self
            .store
            .find(Collection::Books, &criteria.to_filter(), FindOptions::default())
            .await?;
        if books.is_empty() {
            return Err(CatalogError::NotFound(
                "No books match the given criteria".to_string(),
            ));
        }
        Ok(books)
    }

    /// Books published during a calendar year (UTC)
    pub async fn published_in(&self, year: i32) -> CatalogResult<Vec<Document>> {
        let current = Utc::now().year();
        if !(1000..=current).contains(&year) {
            return Err(CatalogError::InvalidArgument(format!(
                "Invalid year, expected a number between 1000 and {}",
                current
            )));
        }

        let books: Vec<Document> = self
            .store
            .find(Collection::Books, &Filter::All, FindOptions::default())
            .await?
            .into_iter()
            .filter(|book| published_year(book) == Some(year))
            .collect();
        if books.is_empty() {
            return Err(CatalogError::NotFound(format!(
                "No books found for year {}",
                year
            )));
        }
        Ok(books)
    }

    /// Insert one or more books. Every book is validated before any is stored.
    pub async fn create(&self, books: Vec<Document>) -> CatalogResult<Vec<i64>> {
        if books.is_empty() {
            return Err(CatalogError::InvalidArgument("No books provided".to_string()));
        }
        for book in &books {
            validate_payload::<BookPayload>(book)?;
        }
        BOOKS.insert(self.store.as_ref(), books).await
    }

    pub async fn update(&self, id: i64, fields: Document) -> CatalogResult<()> {
        BOOKS.update(self.store.as_ref(), id, fields).await
    }

    /// Remove a book. Reviews and comments pointing at it are left in place.
    pub async fn delete(&self, id: i64) -> CatalogResult<()> {
        BOOKS.delete(self.store.as_ref(), id).await
    }
}
