//! APIレスポンス用のシリアライズ形。
//! ストレージ側のモデルは日時をBSON datetimeとして読み書きするため、
//! JSONにはここでRFC 3339の日時へ変換して返す

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::repositories::{
    Book, Event, EventContext, EventType, Memo, MemoFormat, MemoPreferences, MemoStatus,
    ReminderTypes, UserPreferences,
};
use crate::services::MemoWithStatus;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub tags: Vec<String>,
    pub user_notes: String,
    pub date_added: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            user_id: book.user_id,
            title: book.title,
            author: book.author,
            tags: book.tags,
            user_notes: book.user_notes,
            date_added: book.date_added,
            last_updated: book.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date: DateTime<Utc>,
    pub book_ids: Vec<String>,
    pub context: EventContext,
    pub memo_preferences: MemoPreferences,
    pub notification_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            user_id: event.user_id,
            title: event.title,
            event_type: event.event_type,
            date: event.date,
            book_ids: event.book_ids,
            context: event.context,
            memo_preferences: event.memo_preferences,
            notification_sent: event.notification_sent,
            notification_sent_at: event.notification_sent_at,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoResponse {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub book_ids: Vec<String>,
    pub format: MemoFormat,
    pub status: MemoStatus,
    pub content: String,
    pub viewed: bool,
    pub shared: bool,
    pub generated: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<Memo> for MemoResponse {
    fn from(memo: Memo) -> Self {
        Self {
            id: memo.id,
            event_id: memo.event_id,
            user_id: memo.user_id,
            book_ids: memo.book_ids,
            format: memo.format,
            status: memo.status,
            content: memo.content,
            viewed: memo.viewed,
            shared: memo.shared,
            generated: memo.generated,
            last_updated: memo.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoWithStatusResponse {
    #[serde(flatten)]
    pub memo: MemoResponse,
    pub is_latest: bool,
    pub regenerate_count: u64,
}

impl From<MemoWithStatus> for MemoWithStatusResponse {
    fn from(value: MemoWithStatus) -> Self {
        Self {
            memo: value.memo.into(),
            is_latest: value.is_latest,
            regenerate_count: value.regenerate_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesResponse {
    pub user_id: String,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub default_reminder_time: i64,
    pub reminder_types: ReminderTypes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl From<UserPreferences> for PreferencesResponse {
    fn from(prefs: UserPreferences) -> Self {
        Self {
            user_id: prefs.user_id,
            email_enabled: prefs.email_enabled,
            push_enabled: prefs.push_enabled,
            default_reminder_time: prefs.default_reminder_time,
            reminder_types: prefs.reminder_types,
            push_token: prefs.push_token,
            last_updated: prefs.last_updated,
        }
    }
}
