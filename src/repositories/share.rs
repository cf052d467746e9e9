use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const SHARED_MEMOS_COLLECTION: &str = "sharedMemos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareMethod {
    Email,
    Twitter,
    Linkedin,
    Link,
}

impl ShareMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareMethod::Email => "email",
            ShareMethod::Twitter => "twitter",
            ShareMethod::Linkedin => "linkedin",
            ShareMethod::Link => "link",
        }
    }
}

/// メモへの読み取りアクセスを許可する共有レコード。
/// _idが共有リンクの不透明な短縮IDになる
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedMemo {
    #[serde(rename = "_id")]
    pub id: String,
    pub memo_id: String,
    pub user_id: String,
    pub share_method: ShareMethod,
    pub share_link: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub shared_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::repositories::optional_chrono_datetime_as_bson_datetime"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub is_public: bool,
    pub allow_comments: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::repositories::optional_chrono_datetime_as_bson_datetime"
    )]
    pub last_accessed: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ShareRepository: Send + Sync {
    async fn create(&self, share: SharedMemo) -> Result<SharedMemo>;
    /// 公開リンクの解決に使うためオーナーでは絞らない
    async fn find_by_id(&self, share_id: &str) -> Result<Option<SharedMemo>>;
    /// アクセスカウンタをインクリメントし最終アクセス日時を更新する
    async fn record_access(&self, share_id: &str, at: DateTime<Utc>) -> Result<()>;
    /// クライアント側でソーシャル共有が完了した後に共有方法を記録し直す
    async fn update_method(
        &self,
        user_id: &str,
        share_id: &str,
        method: ShareMethod,
    ) -> Result<()>;
}

// MongoDB Implementation
pub struct MongoShareRepository {
    db: Database,
}

impl MongoShareRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<SharedMemo> {
        self.db.collection(SHARED_MEMOS_COLLECTION)
    }
}

#[async_trait]
impl ShareRepository for MongoShareRepository {
    async fn create(&self, share: SharedMemo) -> Result<SharedMemo> {
        self.collection()
            .insert_one(&share)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(share)
    }

    async fn find_by_id(&self, share_id: &str) -> Result<Option<SharedMemo>> {
        self.collection()
            .find_one(doc! { "_id": share_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn record_access(&self, share_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.collection()
            .update_one(
                doc! { "_id": share_id },
                doc! {
                    "$inc": { "accessCount": 1 },
                    "$set": { "lastAccessed": bson::DateTime::from_chrono(at) },
                },
            )
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn update_method(
        &self,
        user_id: &str,
        share_id: &str,
        method: ShareMethod,
    ) -> Result<()> {
        let result = self
            .collection()
            .update_one(
                doc! { "_id": share_id, "userId": user_id },
                doc! { "$set": { "shareMethod": method.as_str() } },
            )
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Share {} not found", share_id)));
        }

        Ok(())
    }
}
