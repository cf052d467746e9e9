use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;

use crate::auth::Role;
use crate::config::CookieConfig;
use crate::error::Result;
use crate::repositories::{UserCreateRequest, UserLoginRequest, UserUpdateRequest};
use crate::routes::api::authenticate;
use crate::server::AppState;

pub fn create_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/auth/logout", post(handle_logout))
        .route("/auth/refresh", post(handle_refresh))
        .route("/auth/me", get(handle_get_current_user))
        .route("/auth/me", patch(handle_update_user))
        .route("/auth/me", delete(handle_delete_user))
        .route("/auth/subscription", patch(handle_update_subscription))
}

/// 認証Cookieを構築する。リフレッシュトークンはrefresh専用パスに限定
fn auth_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    config: &CookieConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .http_only(config.http_only)
        .secure(config.secure)
        .same_site(config.same_site)
        .build()
}

fn session_cookies(
    jar: CookieJar,
    access_token: String,
    refresh_token: String,
    config: &CookieConfig,
) -> CookieJar {
    jar.add(auth_cookie("access_token", access_token, "/", config))
        .add(auth_cookie("refresh_token", refresh_token, "/api/auth", config))
}

//// ユーザー登録ハンドラ
async fn handle_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<UserCreateRequest>,
) -> Result<impl IntoResponse> {
    let (access_token, refresh_token, user) = state.auth_service.register(req).await?;

    let cookie_config = state.config.server.get_cookie_config();
    let jar = session_cookies(jar, access_token, refresh_token, &cookie_config);

    Ok((
        jar,
        Json(json!({ "message": "Registration successful", "user": user })),
    ))
}

//// ログインハンドラ
// ログイン要求を検証し、問題無い場合にトークンをCookieで返却する
async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<UserLoginRequest>,
) -> Result<impl IntoResponse> {
    let (access_token, refresh_token, user) = state.auth_service.login(req).await?;

    let cookie_config = state.config.server.get_cookie_config();
    let jar = session_cookies(jar, access_token, refresh_token, &cookie_config);

    Ok((
        jar,
        Json(json!({ "message": "Login successful", "user": user })),
    ))
}

// Cookieからトークンを回収してリフレッシュトークンを失効させ、Cookieを削除する
async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    if let Some(cookie) = jar.get("refresh_token") {
        state.auth_service.logout(cookie.value()).await?;
    }

    let jar = jar
        .remove(Cookie::from("access_token"))
        .remove(Cookie::from("refresh_token"));

    Ok((jar, Json(json!({ "message": "Logout successful" }))))
}

// リフレッシュトークンから新しいアクセストークンを発行する
async fn handle_refresh(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let refresh_token = jar
        .get("refresh_token")
        .ok_or_else(|| {
            crate::error::AppError::Unauthorized("Please login again".to_string())
        })?
        .value()
        .to_string();

    let access_token = state.auth_service.refresh_access_token(&refresh_token).await?;

    let cookie_config = state.config.server.get_cookie_config();
    let jar = jar.add(auth_cookie("access_token", access_token, "/", &cookie_config));

    Ok((jar, Json(json!({ "message": "Access token issued" }))))
}

async fn handle_get_current_user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditAccount)?;
    let user = state.auth_service.get_current_user(&user_id).await?;

    Ok(Json(user))
}

async fn handle_update_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<UserUpdateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditAccount)?;
    let user = state.auth_service.update_user(&user_id, req).await?;

    Ok(Json(user))
}

async fn handle_delete_user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditAccount)?;
    state.auth_service.delete_user(&user_id).await?;

    let jar = jar
        .remove(Cookie::from("access_token"))
        .remove(Cookie::from("refresh_token"));

    Ok((jar, Json(json!({ "message": "Account deleted" }))))
}

#[derive(Deserialize)]
struct SubscriptionRequest {
    tier: String,
}

async fn handle_update_subscription(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SubscriptionRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditAccount)?;
    let user = state
        .auth_service
        .set_subscription_tier(&user_id, &req.tier)
        .await?;

    Ok(Json(user))
}
