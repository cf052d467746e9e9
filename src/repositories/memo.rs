use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::Database;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const MEMOS_COLLECTION: &str = "memos";

/// メモの出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoFormat {
    Bullet,
    Narrative,
    Framework,
}

impl MemoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoFormat::Bullet => "bullet",
            MemoFormat::Narrative => "narrative",
            MemoFormat::Framework => "framework",
        }
    }
}

/// 生成状態。pending→generated または pending→failed の一方向のみ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoStatus {
    Pending,
    Generated,
    Failed,
}

impl MemoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoStatus::Pending => "pending",
            MemoStatus::Generated => "generated",
            MemoStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub book_ids: Vec<String>,
    pub format: MemoFormat,
    pub status: MemoStatus,
    pub content: String,
    pub viewed: bool,
    pub shared: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub generated: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_updated: DateTime<Utc>,
}

#[async_trait]
pub trait MemoRepository: Send + Sync {
    async fn create(&self, memo: Memo) -> Result<Memo>;
    async fn find_by_id(&self, user_id: &str, memo_id: &str) -> Result<Option<Memo>>;
    /// イベントに紐づくメモを新しい順で返す
    async fn find_by_event(&self, user_id: &str, event_id: &str) -> Result<Vec<Memo>>;
    async fn find_latest_by_event(&self, user_id: &str, event_id: &str) -> Result<Option<Memo>>;
    /// 再生成回数の算出に使う
    async fn count_by_event(&self, user_id: &str, event_id: &str) -> Result<u64>;
    /// pending状態のメモにのみ生成結果を書き込む。
    /// 遷移済み（generated/failed）のメモは更新されずエラーになる
    async fn complete_generation(
        &self,
        memo_id: &str,
        status: MemoStatus,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;
    async fn mark_viewed(&self, user_id: &str, memo_id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn mark_shared(&self, user_id: &str, memo_id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn delete(&self, user_id: &str, memo_id: &str) -> Result<()>;
}

// MongoDB Implementation
pub struct MongoMemoRepository {
    db: Database,
}

impl MongoMemoRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<Memo> {
        self.db.collection(MEMOS_COLLECTION)
    }
}

#[async_trait]
impl MemoRepository for MongoMemoRepository {
    async fn create(&self, memo: Memo) -> Result<Memo> {
        self.collection()
            .insert_one(&memo)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(memo)
    }

    async fn find_by_id(&self, user_id: &str, memo_id: &str) -> Result<Option<Memo>> {
        self.collection()
            .find_one(doc! { "_id": memo_id, "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn find_by_event(&self, user_id: &str, event_id: &str) -> Result<Vec<Memo>> {
        let cursor = self
            .collection()
            .find(doc! { "userId": user_id, "eventId": event_id })
            .sort(doc! { "generated": -1 })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn find_latest_by_event(&self, user_id: &str, event_id: &str) -> Result<Option<Memo>> {
        let mut cursor = self
            .collection()
            .find(doc! { "userId": user_id, "eventId": event_id })
            .sort(doc! { "generated": -1 })
            .limit(1)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        cursor
            .try_next()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn count_by_event(&self, user_id: &str, event_id: &str) -> Result<u64> {
        self.collection()
            .count_documents(doc! { "userId": user_id, "eventId": event_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn complete_generation(
        &self,
        memo_id: &str,
        status: MemoStatus,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        // フィルタでpendingを要求することで、遷移の一方向性をDB側でも保証する
        let result = self
            .collection()
            .update_one(
                doc! { "_id": memo_id, "status": MemoStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": status.as_str(),
                    "content": content,
                    "lastUpdated": bson::DateTime::from_chrono(at),
                } },
            )
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::ValidationError(format!(
                "Memo {} is not pending",
                memo_id
            )));
        }

        Ok(())
    }

    async fn mark_viewed(&self, user_id: &str, memo_id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = self
            .collection()
            .update_one(
                doc! { "_id": memo_id, "userId": user_id },
                doc! { "$set": { "viewed": true, "lastUpdated": bson::DateTime::from_chrono(at) } },
            )
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Memo {} not found", memo_id)));
        }

        Ok(())
    }

    async fn mark_shared(&self, user_id: &str, memo_id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = self
            .collection()
            .update_one(
                doc! { "_id": memo_id, "userId": user_id },
                doc! { "$set": { "shared": true, "lastUpdated": bson::DateTime::from_chrono(at) } },
            )
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Memo {} not found", memo_id)));
        }

        Ok(())
    }

    async fn delete(&self, user_id: &str, memo_id: &str) -> Result<()> {
        let result = self
            .collection()
            .delete_one(doc! { "_id": memo_id, "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Memo {} not found", memo_id)));
        }

        Ok(())
    }
}
