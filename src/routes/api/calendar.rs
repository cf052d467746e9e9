use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::server::AppState;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

pub fn create_calendar_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google/url", get(handle_get_auth_url))
        .route("/auth/google/callback", get(handle_google_callback))
}

fn redirect_uri(state: &AppState) -> String {
    format!("{}/api/auth/google/callback", state.config.app.base_url)
}

/// Googleカレンダー連携の同意画面URLを返す
async fn handle_get_auth_url(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let google = &state.config.google;
    if google.client_id.is_empty() {
        return Err(AppError::ConfigError(
            "GOOGLE_CLIENT_ID is not set".to_string(),
        ));
    }

    let url = reqwest::Url::parse_with_params(
        GOOGLE_AUTH_URL,
        &[
            ("client_id", google.client_id.as_str()),
            ("redirect_uri", redirect_uri(&state).as_str()),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
        ],
    )
    .map_err(|e| AppError::ConfigError(format!("Failed to build auth URL: {}", e)))?;

    Ok(Json(json!({ "url": url.to_string() })))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// OAuthコールバック。認可コードをトークンに交換してアプリへ戻す。
/// トークンの永続化・ユーザーへの紐付けはしない
async fn handle_google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse> {
    let code = query
        .code
        .ok_or_else(|| AppError::ValidationError("No code provided".to_string()))?;

    let google = &state.config.google;
    let response = reqwest::Client::new()
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("code", code.as_str()),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("redirect_uri", redirect_uri(&state).as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| AppError::ExternalServiceError(format!("Failed to get tokens: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(AppError::ExternalServiceError(format!(
            "Google token exchange failed: status={}, body={}",
            status, error_text
        )));
    }

    // アプリへリダイレクトして戻す
    Ok(Redirect::to(&state.config.app.base_url))
}
