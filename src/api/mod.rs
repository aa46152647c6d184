/// API routes and handlers
pub mod books;
pub mod comments;
pub mod health;
pub mod livrarias;
pub mod users;

use crate::{
    catalog::PageRequest,
    config::QueryConfig,
    context::AppContext,
    error::{CatalogError, CatalogResult},
    store::Document,
};
use axum::Router;
use serde::Deserialize;
use serde_json::Value;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(books::routes())
        .merge(users::routes())
        .merge(comments::routes())
        .merge(livrarias::routes())
}

/// Raw paging parameters, validated by `PageRequest`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl PageQuery {
    fn request(&self, config: &QueryConfig) -> CatalogResult<PageRequest> {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref(), config)
    }
}

/// Parse a record identity from a path segment
pub fn parse_id(raw: &str) -> CatalogResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| CatalogError::InvalidArgument(format!("Invalid id '{}': expected a number", raw)))
}

/// Accept a single JSON object or an array of objects
pub fn one_or_many(body: Value) -> CatalogResult<Vec<Document>> {
    match body {
        Value::Object(doc) => Ok(vec![doc]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(doc) => Ok(doc),
                _ => Err(CatalogError::InvalidArgument(
                    "Every entry must be a JSON object".to_string(),
                )),
            })
            .collect(),
        _ => Err(CatalogError::InvalidArgument(
            "Expected a JSON object or an array of objects".to_string(),
        )),
    }
}

/// A JSON object body
pub fn object(body: Value) -> CatalogResult<Document> {
    match body {
        Value::Object(doc) => Ok(doc),
        _ => Err(CatalogError::InvalidArgument(
            "Expected a JSON object".to_string(),
        )),
    }
}
