use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::{AppError, Result};

pub struct AuthRepository {
    pub pool: sqlx::PgPool,
}

impl AuthRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

/////////
/// User
/////////

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    /// "free" または "premium"
    pub subscription_tier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub is_deleted: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UserLoginRequest {
    pub email: String,
    pub password: String,
}

const USER_COLUMNS: &str =
    "user_id, email, display_name, subscription_tier, created_at, updated_at, is_deleted";

#[async_trait::async_trait]
pub trait UserHandler: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserResponse>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserResponse>>;
    async fn register(&self, user: UserCreateRequest) -> Result<UserResponse>;
    async fn validate_password(&self, req: UserLoginRequest) -> Result<()>;
    async fn update_user(&self, user_id: &str, user: UserUpdateRequest) -> Result<UserResponse>;
    async fn set_subscription_tier(&self, user_id: &str, tier: &str) -> Result<UserResponse>;
    async fn delete_user(&self, user_id: &str) -> Result<()>;
}

fn hash_password(password: &str) -> Result<String> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut rand_core::OsRng);
    let hash = PasswordHasher::hash_password(&argon2, password.as_bytes(), &salt)
        .map_err(|e| AppError::HashingError(e.to_string()))?
        .to_string();
    Ok(hash)
}

#[async_trait::async_trait]
impl UserHandler for AuthRepository {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserResponse>> {
        let user = sqlx::query_as::<_, UserResponse>(&format!(
            "SELECT {} FROM users WHERE user_id = $1 AND is_deleted = FALSE",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserResponse>> {
        let user = sqlx::query_as::<_, UserResponse>(&format!(
            "SELECT {} FROM users WHERE email = $1 AND is_deleted = FALSE",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(user)
    }

    async fn register(&self, user: UserCreateRequest) -> Result<UserResponse> {
        let user_id = uuid::Uuid::new_v4().to_string();
        let password_hash = hash_password(&user.password)?;
        let now = Utc::now();

        let created = sqlx::query_as::<_, UserResponse>(&format!(
            "INSERT INTO users (user_id, email, display_name, password_hash, subscription_tier, created_at, updated_at, is_deleted) \
             VALUES ($1, $2, $3, $4, 'free', $5, $5, FALSE) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(created)
    }

    async fn validate_password(&self, req: UserLoginRequest) -> Result<()> {
        let row = sqlx::query("SELECT password_hash FROM users WHERE email = $1 AND is_deleted = FALSE")
            .bind(&req.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        // ユーザー不在とパスワード不一致は同じエラーにする
        let row = row.ok_or_else(|| {
            AppError::AuthenticationError("Invalid email or password".to_string())
        })?;
        let stored_hash: String = row.get("password_hash");

        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| AppError::HashingError(e.to_string()))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed)
            .map_err(|_| AppError::AuthenticationError("Invalid email or password".to_string()))?;

        Ok(())
    }

    async fn update_user(&self, user_id: &str, user: UserUpdateRequest) -> Result<UserResponse> {
        let password_hash = match &user.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let updated = sqlx::query_as::<_, UserResponse>(&format!(
            "UPDATE users SET \
                email = COALESCE($1, email), \
                display_name = COALESCE($2, display_name), \
                password_hash = COALESCE($3, password_hash), \
                updated_at = $4 \
             WHERE user_id = $5 AND is_deleted = FALSE RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        updated.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn set_subscription_tier(&self, user_id: &str, tier: &str) -> Result<UserResponse> {
        let updated = sqlx::query_as::<_, UserResponse>(&format!(
            "UPDATE users SET subscription_tier = $1, updated_at = $2 \
             WHERE user_id = $3 AND is_deleted = FALSE RETURNING {}",
            USER_COLUMNS
        ))
        .bind(tier)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        updated.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET is_deleted = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

/////////
/// JWT Revocation
/////////

#[async_trait::async_trait]
pub trait RevocationHandler: Send + Sync {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()>;
    async fn is_revoked(&self, jti: &str) -> Result<bool>;
    async fn cleanup(&self) -> Result<()>;
}

#[async_trait::async_trait]
impl RevocationHandler for AuthRepository {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO jwt_revocations (jti, expires_at, revoked_at) VALUES ($1, $2, now()) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let row =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM jwt_revocations WHERE jti = $1")
                .bind(jti)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0 > 0)
    }

    async fn cleanup(&self) -> Result<()> {
        sqlx::query("DELETE FROM jwt_revocations WHERE expires_at < now()")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
