/// Comments on books
///
/// The referenced book and user must exist when a comment is written.
/// Nothing is checked afterwards: deleting a book or a user leaves its
/// comments in place.
use super::{
    models::{validate_payload, NewComment},
    Records,
};
use crate::{
    error::{CatalogError, CatalogResult},
    store::{Collection, Document, Filter, FindOptions, RecordStore},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const COMMENTS: Records = Records::new(Collection::Comments, "Comment");

/// Comment manager
#[derive(Clone)]
pub struct CommentManager {
    store: Arc<dyn RecordStore>,
}

impl CommentManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> CatalogResult<Vec<Document>> {
        self.store
            .find(Collection::Comments, &Filter::All, FindOptions::default())
            .await
    }

    /// Store a comment stamped with the current time in epoch milliseconds
    pub async fn create(&self, payload: &Document) -> CatalogResult<i64> {
        let comment: NewComment = validate_payload(payload)?;

        if self
            .store
            .find_one(Collection::Books, &Filter::Id(comment.book_id))
            .await?
            .is_none()
        {
            return Err(CatalogError::NotFound(format!(
                "Book {} not found",
                comment.book_id
            )));
        }
        if self
            .store
            .find_one(Collection::Users, &Filter::Id(comment.user_id))
            .await?
            .is_none()
        {
            return Err(CatalogError::NotFound(format!(
                "User {} not found",
                comment.user_id
            )));
        }

        let mut document = Document::new();
        document.insert("book_id".to_string(), json!(comment.book_id));
        document.insert("user_id".to_string(), json!(comment.user_id));
        document.insert("comment".to_string(), json!(comment.comment));
        document.insert("date".to_string(), json!(Utc::now().timestamp_millis()));

        let ids = COMMENTS.insert(self.store.as_ref(), vec![document]).await?;
        let id = ids
            .first()
            .copied()
            .ok_or_else(|| CatalogError::Internal("store assigned no identity".to_string()))?;
        info!(comment_id = id, book_id = comment.book_id, "comment_created");
        Ok(id)
    }

    pub async fn delete(&self, id: i64) -> CatalogResult<()> {
        COMMENTS.delete(self.store.as_ref(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use serde_json::Value;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn manager() -> (Arc<MemoryRecordStore>, CommentManager) {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .seed(Collection::Books, vec![doc(json!({"_id": 1, "title": "Book"}))])
            .await;
        store
            .seed(Collection::Users, vec![doc(json!({"_id": 7, "first_name": "Ana"}))])
            .await;
        let manager = CommentManager::new(store.clone());
        (store, manager)
    }

    #[tokio::test]
    async fn test_create_stamps_date() {
        let (_store, manager) = manager().await;
        let before = Utc::now().timestamp_millis();

        let id = manager
            .create(&doc(json!({"book_id": 1, "user_id": 7, "comment": "Great read"})))
            .await
            .unwrap();
        assert_eq!(id, 1);

        let comments = manager.list().await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0]["comment"], json!("Great read"));
        assert!(comments[0]["date"].as_i64().unwrap() >= before);
    }

    #[tokio::test]
    async fn test_create_requires_existing_references() {
        let (_store, manager) = manager().await;

        let missing_book = manager
            .create(&doc(json!({"book_id": 2, "user_id": 7, "comment": "?"})))
            .await;
        assert!(matches!(missing_book, Err(CatalogError::NotFound(_))));

        let missing_user = manager
            .create(&doc(json!({"book_id": 1, "user_id": 8, "comment": "?"})))
            .await;
        assert!(matches!(missing_user, Err(CatalogError::NotFound(_))));

        let invalid = manager
            .create(&doc(json!({"book_id": 1, "comment": "?"})))
            .await;
        assert!(matches!(invalid, Err(CatalogError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_comments_survive_book_deletion() {
        let (store, manager) = manager().await;
        manager
            .create(&doc(json!({"book_id": 1, "user_id": 7, "comment": "Kept"})))
            .await
            .unwrap();

        assert!(store.delete_one(Collection::Books, 1).await.unwrap());
        assert_eq!(manager.list().await.unwrap().len(), 1);
    }
}
