use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::Database;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const BOOKS_COLLECTION: &str = "books";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub tags: Vec<String>,
    pub user_notes: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date_added: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCreateRequest {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdateRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub user_notes: Option<String>,
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Book>>;
    async fn find_by_id(&self, user_id: &str, book_id: &str) -> Result<Option<Book>>;
    /// イベントが参照する本をまとめて取得する
    async fn find_by_ids(&self, user_id: &str, book_ids: &[String]) -> Result<Vec<Book>>;
    async fn count_by_user(&self, user_id: &str) -> Result<u64>;
    async fn create(&self, book: Book) -> Result<Book>;
    async fn update(&self, book: Book) -> Result<Book>;
    async fn delete(&self, user_id: &str, book_id: &str) -> Result<()>;
}

// MongoDB Implementation
pub struct MongoBookRepository {
    db: Database,
}

impl MongoBookRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<Book> {
        self.db.collection(BOOKS_COLLECTION)
    }
}

#[async_trait]
impl BookRepository for MongoBookRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Book>> {
        let cursor = self
            .collection()
            .find(doc! { "userId": user_id })
            .sort(doc! { "dateAdded": -1 })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn find_by_id(&self, user_id: &str, book_id: &str) -> Result<Option<Book>> {
        self.collection()
            .find_one(doc! { "_id": book_id, "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn find_by_ids(&self, user_id: &str, book_ids: &[String]) -> Result<Vec<Book>> {
        let cursor = self
            .collection()
            .find(doc! { "userId": user_id, "_id": { "$in": book_ids.to_vec() } })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn count_by_user(&self, user_id: &str) -> Result<u64> {
        self.collection()
            .count_documents(doc! { "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn create(&self, book: Book) -> Result<Book> {
        self.collection()
            .insert_one(&book)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(book)
    }

    async fn update(&self, book: Book) -> Result<Book> {
        let result = self
            .collection()
            .replace_one(doc! { "_id": &book.id, "userId": &book.user_id }, &book)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", book.id)));
        }

        Ok(book)
    }

    async fn delete(&self, user_id: &str, book_id: &str) -> Result<()> {
        let result = self
            .collection()
            .delete_one(doc! { "_id": book_id, "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }

        Ok(())
    }
}
