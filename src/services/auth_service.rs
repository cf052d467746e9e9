use std::sync::Arc;

use crate::auth::{
    default_roles, issue_access_token, issue_refresh_token, validate_display_name_format,
    validate_email_format, validate_password_format, validate_refresh_token,
};
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::repositories::{
    PreferencesRepository, RevocationHandler, UserCreateRequest, UserHandler, UserLoginRequest,
    UserPreferences, UserResponse, UserUpdateRequest,
};

const SUBSCRIPTION_TIERS: [&str; 2] = ["free", "premium"];

pub struct AuthService {
    users: Arc<dyn UserHandler>,
    revocations: Arc<dyn RevocationHandler>,
    prefs_repo: Arc<dyn PreferencesRepository>,
    jwt_secret: String,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserHandler>,
        revocations: Arc<dyn RevocationHandler>,
        prefs_repo: Arc<dyn PreferencesRepository>,
        jwt_secret: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            revocations,
            prefs_repo,
            jwt_secret,
            clock,
        }
    }

    /// ユーザー登録。成功時に認証トークンも発行する
    pub async fn register(
        &self,
        user: UserCreateRequest,
    ) -> Result<(String, String, UserResponse)> {
        // 入力バリデーション
        validate_email_format(&user.email)?;
        validate_display_name_format(&user.display_name)?;
        validate_password_format(&user.password)?;

        // メールアドレスの重複チェック
        if self.users.find_by_email(&user.email).await?.is_some() {
            return Err(AppError::ValidationError(
                "Email address is already in use".to_string(),
            ));
        }

        let user_response = self.users.register(user).await?;

        // デフォルトの通知設定を作成（失敗しても登録は成功させる）
        let prefs = UserPreferences::default_for(&user_response.user_id, self.clock.now());
        if let Err(e) = self.prefs_repo.upsert(prefs).await {
            tracing::warn!(
                "failed to create default preferences for {}: {}",
                user_response.user_id,
                e
            );
        }

        let access_token =
            issue_access_token(&user_response.user_id, default_roles(), &self.jwt_secret)?;
        let refresh_token = issue_refresh_token(&user_response.user_id, &self.jwt_secret)?;

        Ok((access_token, refresh_token, user_response))
    }

    /// ログイン処理
    pub async fn login(&self, req: UserLoginRequest) -> Result<(String, String, UserResponse)> {
        let email = req.email.clone();

        // パスワード検証
        self.users.validate_password(req).await?;

        // ユーザー情報取得
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("User not found".to_string()))?;

        // トークン発行
        let access_token = issue_access_token(&user.user_id, default_roles(), &self.jwt_secret)?;
        let refresh_token = issue_refresh_token(&user.user_id, &self.jwt_secret)?;

        Ok((access_token, refresh_token, user))
    }

    /// ログアウト処理。リフレッシュトークンのJTIを失効させる。
    /// 壊れた・期限切れのトークンは黙って無視する
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let key = crate::auth::create_decoding_key(&self.jwt_secret);
        if let Ok((_, jti, expires_at)) = validate_refresh_token(refresh_token, &key) {
            self.revocations.revoke(&jti, expires_at).await?;
        }

        Ok(())
    }

    /// リフレッシュトークンから新しいアクセストークンを発行する
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let key = crate::auth::create_decoding_key(&self.jwt_secret);
        let (user_id, jti, _) = validate_refresh_token(refresh_token, &key)?;

        // 失効チェック
        if self.revocations.is_revoked(&jti).await? {
            return Err(AppError::Unauthorized(
                "Refresh token has been revoked".to_string(),
            ));
        }

        // ユーザーの存在チェック（削除済みユーザーは拒否）
        self.users
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("User not found".to_string()))?;

        issue_access_token(&user_id, default_roles(), &self.jwt_secret)
    }

    /// 現在のユーザー情報取得
    pub async fn get_current_user(&self, user_id: &str) -> Result<UserResponse> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// ユーザー情報更新
    pub async fn update_user(&self, user_id: &str, req: UserUpdateRequest) -> Result<UserResponse> {
        // 入力バリデーション
        if let Some(ref email) = req.email {
            validate_email_format(email)?;
            // メールアドレスの重複チェック
            if let Some(existing_user) = self.users.find_by_email(email).await? {
                if existing_user.user_id != user_id {
                    return Err(AppError::ValidationError(
                        "Email address is already in use".to_string(),
                    ));
                }
            }
        }
        if let Some(ref name) = req.display_name {
            validate_display_name_format(name)?;
        }
        if let Some(ref password) = req.password {
            validate_password_format(password)?;
        }

        self.users.update_user(user_id, req).await
    }

    /// 契約プラン変更
    pub async fn set_subscription_tier(&self, user_id: &str, tier: &str) -> Result<UserResponse> {
        if !SUBSCRIPTION_TIERS.contains(&tier) {
            return Err(AppError::ValidationError(format!(
                "Unknown subscription tier '{}'",
                tier
            )));
        }

        self.users.set_subscription_tier(user_id, tier).await
    }

    /// ユーザー削除（論理削除）
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.users.delete_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_secret_key;
    use crate::clock::SystemClock;
    use crate::services::test_support::{
        InMemoryPreferencesRepository, InMemoryRevocationHandler, InMemoryUserHandler,
    };

    fn service() -> (AuthService, Arc<InMemoryPreferencesRepository>) {
        let prefs_repo = Arc::new(InMemoryPreferencesRepository::default());
        let service = AuthService::new(
            Arc::new(InMemoryUserHandler::default()),
            Arc::new(InMemoryRevocationHandler::default()),
            prefs_repo.clone(),
            generate_secret_key(),
            Arc::new(SystemClock),
        );
        (service, prefs_repo)
    }

    fn create_request(email: &str) -> UserCreateRequest {
        UserCreateRequest {
            email: email.to_string(),
            display_name: "Reader".to_string(),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn register_creates_default_preferences() {
        let (service, prefs_repo) = service();

        let (_, _, user) = service
            .register(create_request("reader@example.com"))
            .await
            .unwrap();

        let prefs = prefs_repo.prefs.lock().unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].user_id, user.user_id);
        assert!(prefs[0].email_enabled);
        assert!(!prefs[0].push_enabled);
        assert_eq!(prefs[0].default_reminder_time, 24);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (service, _) = service();

        service
            .register(create_request("reader@example.com"))
            .await
            .unwrap();
        let err = service
            .register(create_request("reader@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let (service, _) = service();
        service
            .register(create_request("reader@example.com"))
            .await
            .unwrap();

        let err = service
            .login(UserLoginRequest {
                email: "reader@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AuthenticationError(_)));
    }

    #[tokio::test]
    async fn logout_revokes_the_refresh_token() {
        let (service, _) = service();
        let (_, refresh_token, _) = service
            .register(create_request("reader@example.com"))
            .await
            .unwrap();

        // ログアウト前はリフレッシュできる
        assert!(service.refresh_access_token(&refresh_token).await.is_ok());

        service.logout(&refresh_token).await.unwrap();

        let err = service
            .refresh_access_token(&refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unknown_tier_is_rejected() {
        let (service, _) = service();
        let (_, _, user) = service
            .register(create_request("reader@example.com"))
            .await
            .unwrap();

        assert!(service.set_subscription_tier(&user.user_id, "gold").await.is_err());
        let updated = service
            .set_subscription_tier(&user.user_id, "premium")
            .await
            .unwrap();
        assert_eq!(updated.subscription_tier, "premium");
    }
}
