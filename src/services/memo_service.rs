use std::sync::Arc;

use crate::clock::{Clock, IdGenerator};
use crate::error::{AppError, Result};
use crate::repositories::{
    BookRepository, EventRepository, Memo, MemoFormat, MemoRepository, MemoStatus,
    PreferencesRepository, UserHandler, UserPreferences,
};
use crate::services::GenerationRateLimiter;
use crate::services::ai_service::{AiClient, build_memo_prompt};
use crate::services::email_service::EmailSender;

/// 一覧表示用。最新フラグと再生成回数を併せて返す
pub struct MemoWithStatus {
    pub memo: Memo,
    pub is_latest: bool,
    pub regenerate_count: u64,
}

pub struct MemoService {
    memo_repo: Arc<dyn MemoRepository>,
    event_repo: Arc<dyn EventRepository>,
    book_repo: Arc<dyn BookRepository>,
    prefs_repo: Arc<dyn PreferencesRepository>,
    users: Arc<dyn UserHandler>,
    ai: Arc<dyn AiClient>,
    email: Arc<dyn EmailSender>,
    rate_limiter: Arc<GenerationRateLimiter>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl MemoService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        memo_repo: Arc<dyn MemoRepository>,
        event_repo: Arc<dyn EventRepository>,
        book_repo: Arc<dyn BookRepository>,
        prefs_repo: Arc<dyn PreferencesRepository>,
        users: Arc<dyn UserHandler>,
        ai: Arc<dyn AiClient>,
        email: Arc<dyn EmailSender>,
        rate_limiter: Arc<GenerationRateLimiter>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            memo_repo,
            event_repo,
            book_repo,
            prefs_repo,
            users,
            ai,
            email,
            rate_limiter,
            clock,
            ids,
        }
    }

    /// イベントに対するメモを生成する。
    ///
    /// pending状態のレコードを先に作成し、LLMの結果に応じて
    /// generated / failed へ遷移させる。失敗時はエラーを呼び出し元へ返す。
    /// 途中でプロセスが落ちた場合、レコードはpendingのまま残る
    pub async fn generate_for_event(
        &self,
        user_id: &str,
        event_id: &str,
        format: Option<MemoFormat>,
    ) -> Result<Memo> {
        self.rate_limiter
            .check_user_limit(user_id)
            .map_err(AppError::ValidationError)?;

        let event = self
            .event_repo
            .find_by_id(user_id, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;

        // イベントが参照する本（弱参照なので消えた本は黙って落ちる）
        let books = self.book_repo.find_by_ids(user_id, &event.book_ids).await?;

        let format = format.unwrap_or(event.memo_preferences.format);
        let now = self.clock.now();

        let mut memo = Memo {
            id: self.ids.document_id(),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            book_ids: event.book_ids.clone(),
            format,
            status: MemoStatus::Pending,
            content: String::new(),
            viewed: false,
            shared: false,
            generated: now,
            last_updated: now,
        };
        self.memo_repo.create(memo.clone()).await?;

        let prompt = build_memo_prompt(&event, &books, format);

        match self.ai.generate(&prompt).await {
            Ok(content) => {
                let at = self.clock.now();
                self.memo_repo
                    .complete_generation(&memo.id, MemoStatus::Generated, &content, at)
                    .await?;
                memo.status = MemoStatus::Generated;
                memo.content = content;
                memo.last_updated = at;

                self.notify_memo_ready(&event, &memo).await;

                Ok(memo)
            }
            Err(e) => {
                let message = format!("Failed to generate memo: {}", e);
                let at = self.clock.now();
                if let Err(update_err) = self
                    .memo_repo
                    .complete_generation(&memo.id, MemoStatus::Failed, &message, at)
                    .await
                {
                    tracing::error!(
                        "failed to record memo failure for {}: {}",
                        memo.id,
                        update_err
                    );
                }
                Err(e)
            }
        }
    }

    /// 生成完了メールを設定に従って送る。失敗してもパイプラインは失敗させない
    async fn notify_memo_ready(&self, event: &crate::repositories::Event, memo: &Memo) {
        let prefs = match self.prefs_repo.find_by_user_id(&memo.user_id).await {
            Ok(Some(prefs)) => prefs,
            Ok(None) => UserPreferences::default_for(&memo.user_id, self.clock.now()),
            Err(e) => {
                tracing::warn!("could not load preferences for {}: {}", memo.user_id, e);
                return;
            }
        };

        if !(prefs.email_enabled && prefs.reminder_types.memo_generated) {
            return;
        }

        let user = match self.users.find_by_id(&memo.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("could not load user {}: {}", memo.user_id, e);
                return;
            }
        };

        if let Err(e) = self
            .email
            .send_memo_ready(&user.email, event, &memo.content)
            .await
        {
            tracing::warn!("memo-ready email for {} failed: {}", memo.id, e);
        }
    }

    pub async fn find_by_id(&self, user_id: &str, memo_id: &str) -> Result<Memo> {
        self.memo_repo
            .find_by_id(user_id, memo_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Memo {} not found", memo_id)))
    }

    pub async fn find_by_event(&self, user_id: &str, event_id: &str) -> Result<Vec<Memo>> {
        self.memo_repo.find_by_event(user_id, event_id).await
    }

    /// イベントの最新メモ。再生成回数付き
    pub async fn find_latest_by_event(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Option<MemoWithStatus>> {
        let memo = self.memo_repo.find_latest_by_event(user_id, event_id).await?;
        match memo {
            Some(memo) => {
                let regenerate_count = self.memo_repo.count_by_event(user_id, event_id).await?;
                Ok(Some(MemoWithStatus {
                    memo,
                    is_latest: true,
                    regenerate_count,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn mark_viewed(&self, user_id: &str, memo_id: &str) -> Result<()> {
        self.memo_repo
            .mark_viewed(user_id, memo_id, self.clock.now())
            .await
    }

    pub async fn delete(&self, user_id: &str, memo_id: &str) -> Result<()> {
        self.memo_repo.delete(user_id, memo_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RandomIdGenerator;
    use crate::clock::test_support::FixedClock;
    use crate::repositories::{Book, Event, EventContext, EventType, MemoPreferences};
    use crate::services::test_support::{
        FakeAiClient, InMemoryBookRepository, InMemoryEventRepository, InMemoryMemoRepository,
        InMemoryPreferencesRepository, InMemoryUserHandler, RecordingEmailSender, sample_user,
    };
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        service: MemoService,
        memo_repo: Arc<InMemoryMemoRepository>,
        email: Arc<RecordingEmailSender>,
        clock: Arc<FixedClock>,
    }

    fn fixture(ai: FakeAiClient) -> Fixture {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));

        let memo_repo = Arc::new(InMemoryMemoRepository::default());
        let event_repo = Arc::new(InMemoryEventRepository::default());
        let book_repo = Arc::new(InMemoryBookRepository::default());
        let prefs_repo = Arc::new(InMemoryPreferencesRepository::default());
        let users = Arc::new(InMemoryUserHandler::with_user(sample_user("user-1", "free")));
        let email = Arc::new(RecordingEmailSender::default());

        event_repo.events.lock().unwrap().push(Event {
            id: "event-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Sales pitch".to_string(),
            event_type: EventType::Meeting,
            date: now + Duration::days(2),
            book_ids: vec!["book-1".to_string()],
            context: EventContext {
                goals: "Close the deal".to_string(),
                attendees: None,
                location: None,
            },
            memo_preferences: MemoPreferences {
                format: MemoFormat::Bullet,
                send_time: 24,
            },
            notification_sent: false,
            notification_sent_at: None,
            created_at: now,
            updated_at: now,
        });
        book_repo.books.lock().unwrap().push(Book {
            id: "book-1".to_string(),
            user_id: "user-1".to_string(),
            title: "SPIN Selling".to_string(),
            author: "Neil Rackham".to_string(),
            tags: vec![],
            user_notes: "Ask situation questions first".to_string(),
            date_added: now,
            last_updated: now,
        });

        let service = MemoService::new(
            memo_repo.clone(),
            event_repo,
            book_repo,
            prefs_repo,
            users,
            Arc::new(ai),
            email.clone(),
            Arc::new(GenerationRateLimiter::new()),
            clock.clone(),
            Arc::new(RandomIdGenerator),
        );

        Fixture {
            service,
            memo_repo,
            email,
            clock,
        }
    }

    #[tokio::test]
    async fn successful_generation_moves_pending_to_generated() {
        let f = fixture(FakeAiClient::ok("- Ask situation questions"));

        let memo = f
            .service
            .generate_for_event("user-1", "event-1", None)
            .await
            .unwrap();

        assert_eq!(memo.status, MemoStatus::Generated);
        assert_eq!(memo.content, "- Ask situation questions");

        let stored = &f.memo_repo.memos.lock().unwrap()[0];
        assert_eq!(stored.status, MemoStatus::Generated);
    }

    #[tokio::test]
    async fn failed_generation_moves_pending_to_failed_and_reraises() {
        let f = fixture(FakeAiClient::failing());

        let err = f
            .service
            .generate_for_event("user-1", "event-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));

        let stored = &f.memo_repo.memos.lock().unwrap()[0];
        assert_eq!(stored.status, MemoStatus::Failed);
        assert!(stored.content.starts_with("Failed to generate memo"));
    }

    #[tokio::test]
    async fn failed_memo_cannot_become_generated() {
        let f = fixture(FakeAiClient::failing());

        let _ = f.service.generate_for_event("user-1", "event-1", None).await;
        let memo_id = f.memo_repo.memos.lock().unwrap()[0].id.clone();

        // failedからgeneratedへの遷移は拒否される
        let err = f
            .memo_repo
            .complete_generation(&memo_id, MemoStatus::Generated, "late result", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn memo_ready_email_is_sent_with_default_preferences() {
        let f = fixture(FakeAiClient::ok("content"));

        f.service
            .generate_for_event("user-1", "event-1", None)
            .await
            .unwrap();

        let sent = f.email.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "user-1@example.com");
        assert_eq!(sent[0].1, "memo");
    }

    #[tokio::test]
    async fn email_failure_does_not_fail_the_pipeline() {
        let mut f = fixture(FakeAiClient::ok("content"));
        // 送信失敗するメール送信口に差し替える
        let failing = Arc::new(RecordingEmailSender {
            fail: true,
            ..Default::default()
        });
        f.service.email = failing;

        let memo = f
            .service
            .generate_for_event("user-1", "event-1", None)
            .await
            .unwrap();
        assert_eq!(memo.status, MemoStatus::Generated);
    }

    #[tokio::test]
    async fn regeneration_creates_a_new_record_and_latest_wins() {
        let f = fixture(FakeAiClient::ok("v1"));

        f.service
            .generate_for_event("user-1", "event-1", None)
            .await
            .unwrap();

        // 2本目の方が新しいことを時刻で保証する
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        f.service
            .generate_for_event("user-1", "event-1", Some(MemoFormat::Narrative))
            .await
            .unwrap();

        assert_eq!(f.memo_repo.memos.lock().unwrap().len(), 2);

        let latest = f
            .service
            .find_latest_by_event("user-1", "event-1")
            .await
            .unwrap()
            .unwrap();
        assert!(latest.is_latest);
        assert_eq!(latest.regenerate_count, 2);
        assert_eq!(latest.memo.format, MemoFormat::Narrative);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let f = fixture(FakeAiClient::ok("content"));

        let err = f
            .service
            .generate_for_event("user-1", "missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(f.memo_repo.memos.lock().unwrap().is_empty());
    }
}
