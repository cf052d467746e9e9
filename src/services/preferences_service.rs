use std::sync::Arc;

use serde::Deserialize;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::repositories::{PreferencesRepository, ReminderTypes, UserPreferences};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdateRequest {
    pub email_enabled: Option<bool>,
    pub push_enabled: Option<bool>,
    pub default_reminder_time: Option<i64>,
    pub reminder_types: Option<ReminderTypes>,
}

pub struct PreferencesService {
    prefs_repo: Arc<dyn PreferencesRepository>,
    clock: Arc<dyn Clock>,
}

impl PreferencesService {
    pub fn new(prefs_repo: Arc<dyn PreferencesRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { prefs_repo, clock }
    }

    /// 通知設定を返す。未設定ならデフォルト値
    pub async fn get(&self, user_id: &str) -> Result<UserPreferences> {
        Ok(self
            .prefs_repo
            .find_by_user_id(user_id)
            .await?
            .unwrap_or_else(|| UserPreferences::default_for(user_id, self.clock.now())))
    }

    /// 部分更新。指定されなかった項目は現在値（または初期値）を維持する
    pub async fn update(
        &self,
        user_id: &str,
        req: PreferencesUpdateRequest,
    ) -> Result<UserPreferences> {
        if let Some(hours) = req.default_reminder_time {
            if !(1..=48).contains(&hours) {
                return Err(AppError::ValidationError(
                    "Default reminder time must be between 1 and 48 hours".to_string(),
                ));
            }
        }

        let mut prefs = self.get(user_id).await?;

        if let Some(email_enabled) = req.email_enabled {
            prefs.email_enabled = email_enabled;
        }
        if let Some(push_enabled) = req.push_enabled {
            prefs.push_enabled = push_enabled;
        }
        if let Some(hours) = req.default_reminder_time {
            prefs.default_reminder_time = hours;
        }
        if let Some(reminder_types) = req.reminder_types {
            prefs.reminder_types = reminder_types;
        }
        prefs.last_updated = self.clock.now();

        self.prefs_repo.upsert(prefs).await
    }

    /// プッシュ通知のデバイストークンを保存・削除する
    pub async fn set_push_token(&self, user_id: &str, token: Option<String>) -> Result<()> {
        // 設定が未作成ならデフォルトを先に永続化する
        if self.prefs_repo.find_by_user_id(user_id).await?.is_none() {
            self.prefs_repo
                .upsert(UserPreferences::default_for(user_id, self.clock.now()))
                .await?;
        }

        self.prefs_repo
            .set_push_token(user_id, token, self.clock.now())
            .await
    }
}
