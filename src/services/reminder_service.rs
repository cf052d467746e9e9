use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::Result;
use crate::repositories::{
    Event, EventRepository, PreferencesRepository, UserHandler, UserPreferences,
};
use crate::services::email_service::EmailSender;
use crate::services::push_service::PushSender;

/// 掃引間隔（1時間）
pub const SWEEP_INTERVAL_SECS: u64 = 3600;

pub struct ReminderService {
    event_repo: Arc<dyn EventRepository>,
    prefs_repo: Arc<dyn PreferencesRepository>,
    users: Arc<dyn UserHandler>,
    email: Arc<dyn EmailSender>,
    push: Arc<dyn PushSender>,
    clock: Arc<dyn Clock>,
    // 掃引の多重起動を防ぐ。try_lockに失敗したtickはスキップされる
    sweep_lock: Mutex<()>,
}

impl ReminderService {
    pub fn new(
        event_repo: Arc<dyn EventRepository>,
        prefs_repo: Arc<dyn PreferencesRepository>,
        users: Arc<dyn UserHandler>,
        email: Arc<dyn EmailSender>,
        push: Arc<dyn PushSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            event_repo,
            prefs_repo,
            users,
            email,
            push,
            clock,
            sweep_lock: Mutex::new(()),
        }
    }

    /// リマインダー掃引を1回実行し、通知したイベント数を返す。
    ///
    /// 各イベントについて、設定された送信時刻（イベントのsend_time時間前）を
    /// 含む直近1時間のウィンドウに入っていれば通知を送り、通知済みフラグを立てる。
    /// 送信失敗はログに残して次のイベントへ進む（リトライなし）
    pub async fn run_sweep(&self) -> Result<usize> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            tracing::warn!("reminder sweep already in progress, skipping this tick");
            return Ok(0);
        };

        let now = self.clock.now();
        let events = self.event_repo.find_all_upcoming(now).await?;
        tracing::info!("reminder sweep: {} upcoming events", events.len());

        let mut notified = 0;
        for event in events {
            if event.notification_sent {
                continue;
            }

            let time_until_event = event.date - now;
            let window = Duration::hours(event.memo_preferences.send_time);

            // window - 1h < time_until_event <= window
            if !(time_until_event <= window && time_until_event > window - Duration::hours(1)) {
                continue;
            }

            self.dispatch(&event, now).await;

            if let Err(e) = self.event_repo.mark_notified(&event.id, now).await {
                tracing::error!("failed to mark event {} as notified: {}", event.id, e);
                continue;
            }
            notified += 1;
        }

        tracing::info!("reminder sweep: notified {} events", notified);
        Ok(notified)
    }

    /// ユーザー設定に従ってメール・プッシュを送る。失敗はログのみ
    async fn dispatch(&self, event: &Event, now: chrono::DateTime<chrono::Utc>) {
        let prefs = match self.prefs_repo.find_by_user_id(&event.user_id).await {
            Ok(Some(prefs)) => prefs,
            Ok(None) => UserPreferences::default_for(&event.user_id, now),
            Err(e) => {
                tracing::error!("could not load preferences for {}: {}", event.user_id, e);
                return;
            }
        };

        if !prefs.reminder_types.event_upcoming {
            return;
        }

        if prefs.email_enabled {
            match self.users.find_by_id(&event.user_id).await {
                Ok(Some(user)) => {
                    if let Err(e) = self.email.send_event_reminder(&user.email, event).await {
                        tracing::error!("reminder email for event {} failed: {}", event.id, e);
                    }
                }
                Ok(None) => {
                    tracing::warn!("event {} has no owner, skipping email", event.id);
                }
                Err(e) => {
                    tracing::error!("could not load user {}: {}", event.user_id, e);
                }
            }
        }

        if prefs.push_enabled {
            if let Some(token) = &prefs.push_token {
                if let Err(e) = self.push.send_event_reminder(token, event).await {
                    tracing::error!("reminder push for event {} failed: {}", event.id, e);
                }
            }
        }
    }
}

/// 1時間ごとの掃引タスクを起動する
pub fn spawn_sweep_task(service: Arc<ReminderService>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            if let Err(e) = service.run_sweep().await {
                tracing::error!("reminder sweep failed: {}", e);
            }
        }
    });
}
