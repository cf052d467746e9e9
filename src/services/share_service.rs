use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, IdGenerator};
use crate::error::{AppError, Result};
use crate::repositories::{
    MemoFormat, MemoRepository, ShareMethod, ShareRepository, SharedMemo,
};

/// 共有リンクの短縮ID長
const SHARE_ID_LENGTH: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOptions {
    pub is_public: bool,
    pub allow_comments: bool,
    /// 有効期限（時間）。省略時は無期限
    pub expires_in: Option<i64>,
    pub recipient_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub share_id: String,
    pub share_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// 共有リンク経由で公開するメモの内容。
/// 所有者情報や参照書籍IDは含めない
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSharedMemo {
    pub content: String,
    pub format: MemoFormat,
    pub shared_at: DateTime<Utc>,
    pub allow_comments: bool,
    pub access_count: i64,
}

pub struct ShareService {
    share_repo: Arc<dyn ShareRepository>,
    memo_repo: Arc<dyn MemoRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    base_url: String,
}

impl ShareService {
    pub fn new(
        share_repo: Arc<dyn ShareRepository>,
        memo_repo: Arc<dyn MemoRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        base_url: String,
    ) -> Self {
        Self {
            share_repo,
            memo_repo,
            clock,
            ids,
            base_url,
        }
    }

    /// メモの共有レコードを発行して共有リンクを返す
    pub async fn create_share(
        &self,
        user_id: &str,
        memo_id: &str,
        options: ShareOptions,
    ) -> Result<ShareResponse> {
        let memo = self
            .memo_repo
            .find_by_id(user_id, memo_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Memo {} not found", memo_id)))?;

        if let Some(expires_in) = options.expires_in {
            if expires_in <= 0 {
                return Err(AppError::ValidationError(
                    "expiresIn must be a positive number of hours".to_string(),
                ));
            }
        }

        let now = self.clock.now();
        let share_id = self.ids.short_id(SHARE_ID_LENGTH);
        let share_link = format!("{}/shared/{}", self.base_url, share_id);

        let share = SharedMemo {
            id: share_id.clone(),
            memo_id: memo.id.clone(),
            user_id: user_id.to_string(),
            share_method: if options.recipient_email.is_some() {
                ShareMethod::Email
            } else {
                ShareMethod::Link
            },
            share_link: share_link.clone(),
            shared_at: now,
            expires_at: options.expires_in.map(|hours| now + Duration::hours(hours)),
            access_count: 0,
            is_public: options.is_public,
            allow_comments: options.allow_comments,
            recipient_email: options.recipient_email,
            last_accessed: None,
        };

        let share = self.share_repo.create(share).await?;
        self.memo_repo.mark_shared(user_id, memo_id, now).await?;

        Ok(ShareResponse {
            share_id: share.id,
            share_link,
            expires_at: share.expires_at,
        })
    }

    /// 短縮IDから共有メモを解決する。
    /// 期限切れは存在しない場合と区別せずnot-foundとして扱う。
    /// 成功時の副作用としてアクセスカウンタを進める（トランザクションは張らない）
    pub async fn resolve(&self, share_id: &str) -> Result<PublicSharedMemo> {
        let share = self
            .share_repo
            .find_by_id(share_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Share not found".to_string()))?;

        let now = self.clock.now();
        if let Some(expires_at) = share.expires_at {
            if expires_at < now {
                return Err(AppError::NotFound("Share not found".to_string()));
            }
        }

        self.share_repo.record_access(share_id, now).await?;

        let memo = self
            .memo_repo
            .find_by_id(&share.user_id, &share.memo_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Share not found".to_string()))?;

        Ok(PublicSharedMemo {
            content: memo.content,
            format: memo.format,
            shared_at: share.shared_at,
            allow_comments: share.allow_comments,
            access_count: share.access_count + 1,
        })
    }

    /// ソーシャル共有完了後に共有方法を記録し直す
    pub async fn track_share_method(
        &self,
        user_id: &str,
        share_id: &str,
        method: ShareMethod,
    ) -> Result<()> {
        self.share_repo.update_method(user_id, share_id, method).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RandomIdGenerator;
    use crate::clock::test_support::FixedClock;
    use crate::repositories::{Memo, MemoStatus};
    use crate::services::test_support::{InMemoryMemoRepository, InMemoryShareRepository};
    use chrono::TimeZone;

    struct Fixture {
        service: ShareService,
        share_repo: Arc<InMemoryShareRepository>,
        memo_repo: Arc<InMemoryMemoRepository>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let share_repo = Arc::new(InMemoryShareRepository::default());
        let memo_repo = Arc::new(InMemoryMemoRepository::default());

        memo_repo.memos.lock().unwrap().push(Memo {
            id: "memo-1".to_string(),
            event_id: "event-1".to_string(),
            user_id: "user-1".to_string(),
            book_ids: vec!["book-1".to_string()],
            format: MemoFormat::Bullet,
            status: MemoStatus::Generated,
            content: "- Key insight".to_string(),
            viewed: false,
            shared: false,
            generated: now,
            last_updated: now,
        });

        let service = ShareService::new(
            share_repo.clone(),
            memo_repo.clone(),
            clock.clone(),
            Arc::new(RandomIdGenerator),
            "https://learnlock.app".to_string(),
        );

        Fixture {
            service,
            share_repo,
            memo_repo,
            clock,
        }
    }

    fn options(expires_in: Option<i64>) -> ShareOptions {
        ShareOptions {
            is_public: true,
            allow_comments: false,
            expires_in,
            recipient_email: None,
        }
    }

    #[tokio::test]
    async fn share_link_uses_short_id() {
        let f = fixture();

        let response = f
            .service
            .create_share("user-1", "memo-1", options(None))
            .await
            .unwrap();

        assert_eq!(response.share_id.len(), 10);
        assert_eq!(
            response.share_link,
            format!("https://learnlock.app/shared/{}", response.share_id)
        );
        assert!(response.expires_at.is_none());

        // 共有フラグがメモ側にも立つ
        assert!(f.memo_repo.memos.lock().unwrap()[0].shared);
    }

    #[tokio::test]
    async fn recipient_email_switches_method_to_email() {
        let f = fixture();

        let mut opts = options(None);
        opts.recipient_email = Some("friend@example.com".to_string());
        f.service
            .create_share("user-1", "memo-1", opts)
            .await
            .unwrap();

        let shares = f.share_repo.shares.lock().unwrap();
        assert_eq!(shares[0].share_method, ShareMethod::Email);
    }

    #[tokio::test]
    async fn resolving_increments_access_count() {
        let f = fixture();

        let response = f
            .service
            .create_share("user-1", "memo-1", options(None))
            .await
            .unwrap();

        let first = f.service.resolve(&response.share_id).await.unwrap();
        assert_eq!(first.access_count, 1);
        assert_eq!(first.content, "- Key insight");

        let second = f.service.resolve(&response.share_id).await.unwrap();
        assert_eq!(second.access_count, 2);
    }

    #[tokio::test]
    async fn expired_share_is_not_found_even_though_record_exists() {
        let f = fixture();

        let response = f
            .service
            .create_share("user-1", "memo-1", options(Some(24)))
            .await
            .unwrap();

        // 有効期限内は取得できる
        assert!(f.service.resolve(&response.share_id).await.is_ok());

        // 25時間後には期限切れでnot-found
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap());
        let err = f.service.resolve(&response.share_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // レコード自体は残っている
        assert_eq!(f.share_repo.shares.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_and_expired_shares_are_indistinguishable() {
        let f = fixture();

        let response = f
            .service
            .create_share("user-1", "memo-1", options(Some(1)))
            .await
            .unwrap();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap());

        let expired = f.service.resolve(&response.share_id).await.unwrap_err();
        let missing = f.service.resolve("does-not-exist").await.unwrap_err();

        assert_eq!(expired.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn rejects_non_positive_expiry() {
        let f = fixture();

        let err = f
            .service
            .create_share("user-1", "memo-1", options(Some(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn track_share_method_restamps_record() {
        let f = fixture();

        let response = f
            .service
            .create_share("user-1", "memo-1", options(None))
            .await
            .unwrap();
        f.service
            .track_share_method("user-1", &response.share_id, ShareMethod::Twitter)
            .await
            .unwrap();

        assert_eq!(
            f.share_repo.shares.lock().unwrap()[0].share_method,
            ShareMethod::Twitter
        );
    }
}
