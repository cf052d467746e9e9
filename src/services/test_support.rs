//! サービス層テスト用のインメモリ実装群

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::error::{AppError, Result};
use crate::repositories::{
    Book, BookRepository, Event, EventRepository, Memo, MemoRepository, MemoStatus,
    PreferencesRepository, RevocationHandler, ShareMethod, ShareRepository, SharedMemo,
    UserCreateRequest, UserHandler, UserLoginRequest, UserPreferences, UserResponse,
    UserUpdateRequest,
};
use crate::services::ai_service::AiClient;
use crate::services::email_service::EmailSender;
use crate::services::push_service::PushSender;

#[derive(Default)]
pub struct InMemoryBookRepository {
    pub books: Mutex<Vec<Book>>,
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Book>> {
        let mut books: Vec<Book> = self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        books.sort_by(|a, b| b.date_added.cmp(&a.date_added));
        Ok(books)
    }

    async fn find_by_id(&self, user_id: &str, book_id: &str) -> Result<Option<Book>> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.user_id == user_id && b.id == book_id)
            .cloned())
    }

    async fn find_by_ids(&self, user_id: &str, book_ids: &[String]) -> Result<Vec<Book>> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == user_id && book_ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<u64> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == user_id)
            .count() as u64)
    }

    async fn create(&self, book: Book) -> Result<Book> {
        self.books.lock().unwrap().push(book.clone());
        Ok(book)
    }

    async fn update(&self, book: Book) -> Result<Book> {
        let mut books = self.books.lock().unwrap();
        let existing = books
            .iter_mut()
            .find(|b| b.id == book.id && b.user_id == book.user_id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book.id)))?;
        *existing = book.clone();
        Ok(book)
    }

    async fn delete(&self, user_id: &str, book_id: &str) -> Result<()> {
        let mut books = self.books.lock().unwrap();
        let before = books.len();
        books.retain(|b| !(b.user_id == user_id && b.id == book_id));
        if books.len() == before {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    pub events: Mutex<Vec<Event>>,
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn find_upcoming_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.date >= now)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(events)
    }

    async fn find_by_id(&self, user_id: &str, event_id: &str) -> Result<Option<Event>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.user_id == user_id && e.id == event_id)
            .cloned())
    }

    async fn find_all_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.date > now)
            .cloned()
            .collect())
    }

    async fn create(&self, event: Event) -> Result<Event> {
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update(&self, event: Event) -> Result<Event> {
        let mut events = self.events.lock().unwrap();
        let existing = events
            .iter_mut()
            .find(|e| e.id == event.id && e.user_id == event.user_id)
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event.id)))?;
        *existing = event.clone();
        Ok(event)
    }

    async fn delete(&self, user_id: &str, event_id: &str) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| !(e.user_id == user_id && e.id == event_id));
        if events.len() == before {
            return Err(AppError::NotFound(format!("Event {} not found", event_id)));
        }
        Ok(())
    }

    async fn mark_notified(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;
        event.notification_sent = true;
        event.notification_sent_at = Some(at);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMemoRepository {
    pub memos: Mutex<Vec<Memo>>,
}

#[async_trait]
impl MemoRepository for InMemoryMemoRepository {
    async fn create(&self, memo: Memo) -> Result<Memo> {
        self.memos.lock().unwrap().push(memo.clone());
        Ok(memo)
    }

    async fn find_by_id(&self, user_id: &str, memo_id: &str) -> Result<Option<Memo>> {
        Ok(self
            .memos
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.id == memo_id)
            .cloned())
    }

    async fn find_by_event(&self, user_id: &str, event_id: &str) -> Result<Vec<Memo>> {
        let mut memos: Vec<Memo> = self
            .memos
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.event_id == event_id)
            .cloned()
            .collect();
        memos.sort_by(|a, b| b.generated.cmp(&a.generated));
        Ok(memos)
    }

    async fn find_latest_by_event(&self, user_id: &str, event_id: &str) -> Result<Option<Memo>> {
        Ok(self.find_by_event(user_id, event_id).await?.into_iter().next())
    }

    async fn count_by_event(&self, user_id: &str, event_id: &str) -> Result<u64> {
        Ok(self
            .memos
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.event_id == event_id)
            .count() as u64)
    }

    async fn complete_generation(
        &self,
        memo_id: &str,
        status: MemoStatus,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut memos = self.memos.lock().unwrap();
        // 本実装と同じく、pendingのメモだけが更新対象
        let memo = memos
            .iter_mut()
            .find(|m| m.id == memo_id && m.status == MemoStatus::Pending);
        match memo {
            Some(memo) => {
                memo.status = status;
                memo.content = content.to_string();
                memo.last_updated = at;
                Ok(())
            }
            None => Err(AppError::ValidationError(format!(
                "Memo {} is not pending",
                memo_id
            ))),
        }
    }

    async fn mark_viewed(&self, user_id: &str, memo_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut memos = self.memos.lock().unwrap();
        let memo = memos
            .iter_mut()
            .find(|m| m.user_id == user_id && m.id == memo_id)
            .ok_or_else(|| AppError::NotFound(format!("Memo {} not found", memo_id)))?;
        memo.viewed = true;
        memo.last_updated = at;
        Ok(())
    }

    async fn mark_shared(&self, user_id: &str, memo_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut memos = self.memos.lock().unwrap();
        let memo = memos
            .iter_mut()
            .find(|m| m.user_id == user_id && m.id == memo_id)
            .ok_or_else(|| AppError::NotFound(format!("Memo {} not found", memo_id)))?;
        memo.shared = true;
        memo.last_updated = at;
        Ok(())
    }

    async fn delete(&self, user_id: &str, memo_id: &str) -> Result<()> {
        let mut memos = self.memos.lock().unwrap();
        let before = memos.len();
        memos.retain(|m| !(m.user_id == user_id && m.id == memo_id));
        if memos.len() == before {
            return Err(AppError::NotFound(format!("Memo {} not found", memo_id)));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryShareRepository {
    pub shares: Mutex<Vec<SharedMemo>>,
}

#[async_trait]
impl ShareRepository for InMemoryShareRepository {
    async fn create(&self, share: SharedMemo) -> Result<SharedMemo> {
        self.shares.lock().unwrap().push(share.clone());
        Ok(share)
    }

    async fn find_by_id(&self, share_id: &str) -> Result<Option<SharedMemo>> {
        Ok(self
            .shares
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == share_id)
            .cloned())
    }

    async fn record_access(&self, share_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut shares = self.shares.lock().unwrap();
        if let Some(share) = shares.iter_mut().find(|s| s.id == share_id) {
            share.access_count += 1;
            share.last_accessed = Some(at);
        }
        Ok(())
    }

    async fn update_method(
        &self,
        user_id: &str,
        share_id: &str,
        method: ShareMethod,
    ) -> Result<()> {
        let mut shares = self.shares.lock().unwrap();
        let share = shares
            .iter_mut()
            .find(|s| s.user_id == user_id && s.id == share_id)
            .ok_or_else(|| AppError::NotFound(format!("Share {} not found", share_id)))?;
        share.share_method = method;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPreferencesRepository {
    pub prefs: Mutex<Vec<UserPreferences>>,
}

#[async_trait]
impl PreferencesRepository for InMemoryPreferencesRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self
            .prefs
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn upsert(&self, prefs: UserPreferences) -> Result<UserPreferences> {
        let mut stored = self.prefs.lock().unwrap();
        stored.retain(|p| p.user_id != prefs.user_id);
        stored.push(prefs.clone());
        Ok(prefs)
    }

    async fn set_push_token(
        &self,
        user_id: &str,
        token: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut stored = self.prefs.lock().unwrap();
        let prefs = stored
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Preferences for user {} not found", user_id))
            })?;
        prefs.push_token = token;
        prefs.last_updated = at;
        Ok(())
    }
}

/// (ユーザー, 平文パスワード) を保持する簡易アカウントストア
#[derive(Default)]
pub struct InMemoryUserHandler {
    pub users: Mutex<Vec<(UserResponse, String)>>,
}

impl InMemoryUserHandler {
    pub fn with_user(user: UserResponse) -> Self {
        let handler = Self::default();
        handler
            .users
            .lock()
            .unwrap()
            .push((user, "password123".to_string()));
        handler
    }
}

pub fn sample_user(user_id: &str, tier: &str) -> UserResponse {
    UserResponse {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        display_name: user_id.to_string(),
        subscription_tier: tier.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
    }
}

#[async_trait]
impl UserHandler for InMemoryUserHandler {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserResponse>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.user_id == user_id && !u.is_deleted)
            .map(|(u, _)| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserResponse>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.email == email && !u.is_deleted)
            .map(|(u, _)| u.clone()))
    }

    async fn register(&self, user: UserCreateRequest) -> Result<UserResponse> {
        let created = UserResponse {
            user_id: format!("user-{}", self.users.lock().unwrap().len() + 1),
            email: user.email,
            display_name: user.display_name,
            subscription_tier: "free".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_deleted: false,
        };
        self.users
            .lock()
            .unwrap()
            .push((created.clone(), user.password));
        Ok(created)
    }

    async fn validate_password(&self, req: UserLoginRequest) -> Result<()> {
        let users = self.users.lock().unwrap();
        let matched = users
            .iter()
            .any(|(u, password)| u.email == req.email && *password == req.password);
        if matched {
            Ok(())
        } else {
            Err(AppError::AuthenticationError(
                "Invalid email or password".to_string(),
            ))
        }
    }

    async fn update_user(&self, user_id: &str, req: UserUpdateRequest) -> Result<UserResponse> {
        let mut users = self.users.lock().unwrap();
        let (user, password) = users
            .iter_mut()
            .find(|(u, _)| u.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        if let Some(email) = req.email {
            user.email = email;
        }
        if let Some(name) = req.display_name {
            user.display_name = name;
        }
        if let Some(new_password) = req.password {
            *password = new_password;
        }
        Ok(user.clone())
    }

    async fn set_subscription_tier(&self, user_id: &str, tier: &str) -> Result<UserResponse> {
        let mut users = self.users.lock().unwrap();
        let (user, _) = users
            .iter_mut()
            .find(|(u, _)| u.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        user.subscription_tier = tier.to_string();
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if let Some((user, _)) = users.iter_mut().find(|(u, _)| u.user_id == user_id) {
            user.is_deleted = true;
        }
        Ok(())
    }
}

/// 失効済みJTIを保持するだけの簡易ストア
#[derive(Default)]
pub struct InMemoryRevocationHandler {
    pub revoked: Mutex<Vec<(String, DateTime<Utc>)>>,
}

#[async_trait]
impl RevocationHandler for InMemoryRevocationHandler {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.revoked
            .lock()
            .unwrap()
            .push((jti.to_string(), expires_at));
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self
            .revoked
            .lock()
            .unwrap()
            .iter()
            .any(|(stored, _)| stored == jti))
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

/// 送信内容を記録するだけのメール送信フェイク
#[derive(Default)]
pub struct RecordingEmailSender {
    /// (宛先, 種別, イベントID)
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_event_reminder(&self, to_email: &str, event: &Event) -> Result<()> {
        if self.fail {
            return Err(AppError::ExternalServiceError("smtp down".to_string()));
        }
        self.sent.lock().unwrap().push((
            to_email.to_string(),
            "reminder".to_string(),
            event.id.clone(),
        ));
        Ok(())
    }

    async fn send_memo_ready(
        &self,
        to_email: &str,
        event: &Event,
        _memo_content: &str,
    ) -> Result<()> {
        if self.fail {
            return Err(AppError::ExternalServiceError("smtp down".to_string()));
        }
        self.sent.lock().unwrap().push((
            to_email.to_string(),
            "memo".to_string(),
            event.id.clone(),
        ));
        Ok(())
    }
}

/// 送信内容を記録するだけのプッシュ送信フェイク
#[derive(Default)]
pub struct RecordingPushSender {
    /// (デバイストークン, イベントID)
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send_event_reminder(&self, device_token: &str, event: &Event) -> Result<()> {
        if self.fail {
            return Err(AppError::ExternalServiceError("fcm down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), event.id.clone()));
        Ok(())
    }
}

/// 固定応答を返すLLMフェイク
pub struct FakeAiClient {
    pub response: String,
    pub fail: bool,
}

impl FakeAiClient {
    pub fn ok(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            response: String::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl AiClient for FakeAiClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        if self.fail {
            Err(AppError::ExternalServiceError("model unavailable".to_string()))
        } else {
            Ok(self.response.clone())
        }
    }
}
