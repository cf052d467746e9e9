use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const PREFERENCES_COLLECTION: &str = "userPreferences";

/// 通知種別ごとのON/OFF
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTypes {
    pub event_upcoming: bool,
    pub memo_generated: bool,
    pub memo_failed: bool,
}

impl Default for ReminderTypes {
    fn default() -> Self {
        Self {
            event_upcoming: true,
            memo_generated: true,
            memo_failed: true,
        }
    }
}

/// ユーザーごとに1件。_idはユーザーID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub email_enabled: bool,
    pub push_enabled: bool,
    /// イベント何時間前に通知するかのデフォルト値
    pub default_reminder_time: i64,
    #[serde(default)]
    pub reminder_types: ReminderTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_updated: DateTime<Utc>,
}

impl UserPreferences {
    /// 未設定ユーザーに適用するデフォルト（メールON・プッシュOFF・24時間前）
    pub fn default_for(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_enabled: true,
            push_enabled: false,
            default_reminder_time: 24,
            reminder_types: ReminderTypes::default(),
            push_token: None,
            last_updated: now,
        }
    }
}

#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserPreferences>>;
    async fn upsert(&self, prefs: UserPreferences) -> Result<UserPreferences>;
    async fn set_push_token(
        &self,
        user_id: &str,
        token: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

// MongoDB Implementation
pub struct MongoPreferencesRepository {
    db: Database,
}

impl MongoPreferencesRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<UserPreferences> {
        self.db.collection(PREFERENCES_COLLECTION)
    }
}

#[async_trait]
impl PreferencesRepository for MongoPreferencesRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        self.collection()
            .find_one(doc! { "_id": user_id })
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn upsert(&self, prefs: UserPreferences) -> Result<UserPreferences> {
        self.collection()
            .replace_one(doc! { "_id": &prefs.user_id }, &prefs)
            .upsert(true)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(prefs)
    }

    async fn set_push_token(
        &self,
        user_id: &str,
        token: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let update = match token {
            Some(token) => doc! { "$set": {
                "pushToken": token,
                "lastUpdated": bson::DateTime::from_chrono(at),
            } },
            None => doc! {
                "$unset": { "pushToken": "" },
                "$set": { "lastUpdated": bson::DateTime::from_chrono(at) },
            },
        };

        let result = self
            .collection()
            .update_one(doc! { "_id": user_id }, update)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Preferences for user {} not found",
                user_id
            )));
        }

        Ok(())
    }
}
