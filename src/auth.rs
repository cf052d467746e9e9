use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//////
// 入力フォーマット検証

pub fn validate_password_format(password: &str) -> Result<()> {
    let length_min = 8;
    let length_max = 256;
    if password.len() < length_min || password.len() > length_max {
        return Err(AppError::ValidationError(format!(
            "パスワードは{}文字以上{}文字以下である必要があります",
            length_min, length_max
        )));
    }

    Ok(())
}

pub fn validate_email_format(email: &str) -> Result<()> {
    // 厳密なRFC検証はしない。@と.の存在と長さのみ確認する
    let valid = email.len() <= 254
        && email.split('@').count() == 2
        && email.split('@').all(|part| !part.is_empty())
        && email.rsplit('@').next().is_some_and(|domain| domain.contains('.'));
    if !valid {
        return Err(AppError::ValidationError(
            "メールアドレスの形式が不正です".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_display_name_format(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.chars().count() > 50 {
        return Err(AppError::ValidationError(
            "表示名は1文字以上50文字以下である必要があります".to_string(),
        ));
    }

    Ok(())
}

//////
// 共通鍵（HMAC）認証関係の実装

/// ランダムな共通鍵を生成（32バイト = 256ビット）
/// Base64エンコードされた文字列を返す
pub fn generate_secret_key() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut rng = rand::rng();
    let mut key = vec![0u8; 32]; // 256ビット
    rng.fill_bytes(&mut key);
    general_purpose::STANDARD.encode(&key)
}

/// EncodingKey を作成（署名用）
pub fn create_encoding_key(secret: &str) -> EncodingKey {
    EncodingKey::from_secret(secret.as_bytes())
}

/// DecodingKey を作成（検証用）
pub fn create_decoding_key(secret: &str) -> DecodingKey {
    DecodingKey::from_secret(secret.as_bytes())
}

//////
// JWTの実装

// トークン種別
#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum TokenType {
    Refresh,
    Access,
}

// アクセストークンで認可する操作
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum Role {
    EditBook,
    EditEvent,
    GenerateMemo,
    ViewMemo,
    ShareMemo,
    EditPreferences,
    EditAccount,
}

/// ログイン済みユーザーに与える標準権限セット
pub fn default_roles() -> Vec<Role> {
    vec![
        Role::EditBook,
        Role::EditEvent,
        Role::GenerateMemo,
        Role::ViewMemo,
        Role::ShareMemo,
        Role::EditPreferences,
        Role::EditAccount,
    ]
}

// JWTヘッダー
static JWT_ALGORITHM: Algorithm = Algorithm::HS256;

const JWT_ISSUER: &str = "learnlock-server";
const JWT_AUDIENCE: &str = "learnlock-client";

// JWTペイロード(クレーム)
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaim {
    iss: String, // JWT issuer
    aud: String, // JWTを行使する対象(APIサーバのURL)
    sub: String, // User ID
    iat: usize,  // issued at 発行日時
    jti: String, // JWT ID
    nbf: usize,  // not before ここで指定した日時以前のリクエストは拒否
    exp: usize,  // 有効期限

    typ: TokenType,          // トークンの種別
    role: Option<Vec<Role>>, // アクセストークンで認可する操作
}

// ------------------------------------------------------------------
// JWTの発行関数群
// ------------------------------------------------------------------

/// リフレッシュトークンの発行（7日間有効）
pub fn issue_refresh_token(user_id: &str, secret: &str) -> Result<String> {
    let now = Utc::now();
    let expiration = now + Duration::days(7);

    let claims = JwtClaim {
        jti: Uuid::new_v4().to_string(),
        iss: JWT_ISSUER.to_string(),
        aud: JWT_AUDIENCE.to_string(),
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        nbf: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
        typ: TokenType::Refresh,
        role: None, // リフレッシュトークンには権限を付与しない
    };

    let header = Header::new(JWT_ALGORITHM);
    let key = create_encoding_key(secret);
    let token =
        encode(&header, &claims, &key).map_err(|e| AppError::ConfigError(e.to_string()))?;
    Ok(token)
}

/// アクセストークンの発行（1時間有効）
pub fn issue_access_token(user_id: &str, roles: Vec<Role>, secret: &str) -> Result<String> {
    let now = Utc::now();
    let expiration = now + Duration::hours(1);

    let claims = JwtClaim {
        jti: Uuid::new_v4().to_string(),
        iss: JWT_ISSUER.to_string(),
        aud: JWT_AUDIENCE.to_string(),
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
        nbf: now.timestamp() as usize,
        typ: TokenType::Access,
        role: Some(roles),
    };

    let header = Header::new(JWT_ALGORITHM);
    let enc_key = create_encoding_key(secret);
    let token =
        encode(&header, &claims, &enc_key).map_err(|e| AppError::ConfigError(e.to_string()))?;
    Ok(token)
}

// ------------------------------------------------------------------
// JWTの検証関数群
// ------------------------------------------------------------------

fn decode_claims(token: &str, key: &DecodingKey) -> Result<JwtClaim> {
    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.set_audience(&[JWT_AUDIENCE]);
    let token_data = decode::<JwtClaim>(token, key, &validation)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    Ok(token_data.claims)
}

/// アクセストークンを検証し、要求権限を持つ場合にユーザーIDを返す
pub fn validate_access_token(
    token: &str,
    required_role: Role,
    key: &DecodingKey,
) -> Result<String> {
    let claims = decode_claims(token, key)?;

    if claims.typ != TokenType::Access {
        return Err(AppError::Unauthorized(
            "Token type is not Access".to_string(),
        ));
    }

    // 権限のチェック
    match &claims.role {
        Some(r) if r.contains(&required_role) => Ok(claims.sub),
        _ => Err(AppError::Forbidden("Insufficient permissions".to_string())),
    }
}

/// リフレッシュトークンを検証し、(ユーザーID, JTI, 有効期限)を返す
pub fn validate_refresh_token(
    token: &str,
    key: &DecodingKey,
) -> Result<(String, String, DateTime<Utc>)> {
    let claims = decode_claims(token, key)?;

    if claims.typ != TokenType::Refresh {
        return Err(AppError::Unauthorized(
            "Token type is not Refresh".to_string(),
        ));
    }

    let expires_at = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .ok_or_else(|| AppError::Unauthorized("Invalid expiry".to_string()))?;

    Ok((claims.sub, claims.jti, expires_at))
}
