use axum::Router;
use axum_extra::extract::CookieJar;

use crate::auth::{Role, validate_access_token};
use crate::error::{AppError, Result};
use crate::server::AppState;

mod auth;
mod books;
mod calendar;
mod events;
mod memos;
mod responses;
mod settings;

pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::create_auth_routes())
        .merge(books::create_book_routes())
        .merge(events::create_event_routes())
        .merge(memos::create_memo_routes())
        .merge(settings::create_settings_routes())
        .merge(calendar::create_calendar_routes())
}

/// Cookieのアクセストークンを検証し、認証済みユーザーIDを返す
pub(crate) fn authenticate(
    jar: &CookieJar,
    state: &AppState,
    required_role: Role,
) -> Result<String> {
    let access_token = jar
        .get("access_token")
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    validate_access_token(access_token.value(), required_role, &state.jwt_decoding_key)
}
