/// Typed views over catalog documents
///
/// Documents stay schemaless in the store and in responses; these structs
/// only decode the fields the aggregation and geospatial layers read.
use crate::{
    error::{CatalogError, CatalogResult},
    store::Document,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use validator::Validate;

/// One review embedded in a user record. Scores are any JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub book_id: i64,
    pub score: Number,
}

impl Review {
    pub fn new(book_id: i64, score: impl Into<Number>) -> Self {
        Self {
            book_id,
            score: score.into(),
        }
    }

    /// Score as a float for sums and ordering
    pub fn points(&self) -> f64 {
        self.score.as_f64().unwrap_or_default()
    }
}

/// The parts of a user record that reviews are aggregated from
#[derive(Debug, Clone, Deserialize)]
pub struct Reviewer {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "text_or_none")]
    pub job: Option<String>,
    #[serde(default, deserialize_with = "well_formed_reviews")]
    pub reviews: Vec<Review>,
}

impl Reviewer {
    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }
}

/// User records are replaced without shape checks, so a non-string job
/// groups with the users that have none.
fn text_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

/// Entries without an integer `book_id` and a numeric `score` are skipped
/// instead of failing every pipeline that reads the user.
fn well_formed_reviews<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Review>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// The parts of a comment record used for grouping
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CommentRef {
    #[serde(rename = "_id")]
    pub id: i64,
    pub book_id: i64,
}

/// Required fields of a new book
#[derive(Debug, Deserialize, Validate)]
pub struct BookPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "every book needs a 'title'"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "every book needs at least one entry in 'authors'"))]
    pub authors: Vec<String>,
}

/// Required fields of a new user
#[derive(Debug, Deserialize, Validate)]
pub struct UserPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "every user needs a 'first_name'"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "every user needs a 'last_name'"))]
    pub last_name: String,
    #[serde(default)]
    pub reviews: Option<Vec<Review>>,
}

/// A new comment on a book
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewComment {
    #[validate(range(min = 1, message = "'book_id' must be a positive id"))]
    pub book_id: i64,
    #[validate(range(min = 1, message = "'user_id' must be a positive id"))]
    pub user_id: i64,
    #[validate(length(min = 1, message = "'comment' cannot be empty"))]
    pub comment: String,
}

/// Decode a typed view of a stored document
pub fn decode<T: DeserializeOwned>(doc: &Document) -> CatalogResult<T> {
    serde_json::from_value(Value::Object(doc.clone()))
        .map_err(|e| CatalogError::DataAccess(format!("malformed stored document: {}", e)))
}

/// Decode and validate a client payload
pub fn validate_payload<T: DeserializeOwned + Validate>(doc: &Document) -> CatalogResult<T> {
    let payload: T = serde_json::from_value(Value::Object(doc.clone()))
        .map_err(|e| CatalogError::InvalidArgument(format!("malformed payload: {}", e)))?;
    payload
        .validate()
        .map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
    Ok(payload)
}
