use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::Database;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::repositories::memo::MemoFormat;

const EVENTS_COLLECTION: &str = "events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Meeting,
    Presentation,
    Interview,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Meeting => "meeting",
            EventType::Presentation => "presentation",
            EventType::Interview => "interview",
            EventType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub goals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// メモ配信の設定。send_timeはイベント何時間前に送るか（1〜48）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoPreferences {
    pub format: MemoFormat,
    pub send_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    pub book_ids: Vec<String>,
    pub context: EventContext,
    pub memo_preferences: MemoPreferences,
    pub notification_sent: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::repositories::optional_chrono_datetime_as_bson_datetime"
    )]
    pub notification_sent_at: Option<DateTime<Utc>>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCreateRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date: DateTime<Utc>,
    pub book_ids: Vec<String>,
    pub context: EventContext,
    pub memo_preferences: MemoPreferences,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdateRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub date: Option<DateTime<Utc>>,
    pub book_ids: Option<Vec<String>>,
    pub context: Option<EventContext>,
    pub memo_preferences: Option<MemoPreferences>,
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// ユーザーの今後のイベントを開催日昇順で返す
    async fn find_upcoming_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>>;
    async fn find_by_id(&self, user_id: &str, event_id: &str) -> Result<Option<Event>>;
    /// リマインダー掃引用。全ユーザーの未来のイベントを返す
    async fn find_all_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>>;
    async fn create(&self, event: Event) -> Result<Event>;
    async fn update(&self, event: Event) -> Result<Event>;
    async fn delete(&self, user_id: &str, event_id: &str) -> Result<()>;
    /// 通知済みフラグを立てる
    async fn mark_notified(&self, event_id: &str, at: DateTime<Utc>) -> Result<()>;
}

// MongoDB Implementation
pub struct MongoEventRepository {
    db: Database,
}

impl MongoEventRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<Event> {
        self.db.collection(EVENTS_COLLECTION)
    }
}

#[async_trait]
impl EventRepository for MongoEventRepository {
    async fn find_upcoming_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let cursor = self
            .collection()
            .find(doc! {
                "userId": user_id,
                "date": { "$gte": bson::DateTime::from_chrono(now) },
            })
            .sort(doc! { "date": 1 })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn find_by_id(&self, user_id: &str, event_id: &str) -> Result<Option<Event>> {
        self.collection()
            .find_one(doc! { "_id": event_id, "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn find_all_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let cursor = self
            .collection()
            .find(doc! { "date": { "$gt": bson::DateTime::from_chrono(now) } })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn create(&self, event: Event) -> Result<Event> {
        self.collection()
            .insert_one(&event)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(event)
    }

    async fn update(&self, event: Event) -> Result<Event> {
        let result = self
            .collection()
            .replace_one(doc! { "_id": &event.id, "userId": &event.user_id }, &event)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", event.id)));
        }

        Ok(event)
    }

    async fn delete(&self, user_id: &str, event_id: &str) -> Result<()> {
        let result = self
            .collection()
            .delete_one(doc! { "_id": event_id, "userId": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", event_id)));
        }

        Ok(())
    }

    async fn mark_notified(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = self
            .collection()
            .update_one(
                doc! { "_id": event_id },
                doc! { "$set": {
                    "notificationSent": true,
                    "notificationSentAt": bson::DateTime::from_chrono(at),
                } },
            )
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", event_id)));
        }

        Ok(())
    }
}
