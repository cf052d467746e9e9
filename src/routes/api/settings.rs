use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, put},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Role;
use crate::error::Result;
use crate::routes::api::authenticate;
use crate::routes::api::responses::PreferencesResponse;
use crate::server::AppState;
use crate::services::PreferencesUpdateRequest;

pub fn create_settings_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settings/preferences",
            get(handle_get_preferences).patch(handle_update_preferences),
        )
        .route("/settings/push-token", put(handle_set_push_token))
}

async fn handle_get_preferences(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditPreferences)?;
    let prefs = state.preferences_service.get(&user_id).await?;

    Ok(Json(PreferencesResponse::from(prefs)))
}

async fn handle_update_preferences(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<PreferencesUpdateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditPreferences)?;
    let prefs = state.preferences_service.update(&user_id, req).await?;

    Ok(Json(PreferencesResponse::from(prefs)))
}

#[derive(Deserialize)]
struct PushTokenRequest {
    /// nullでトークンを解除する
    token: Option<String>,
}

async fn handle_set_push_token(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<PushTokenRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::EditPreferences)?;
    state
        .preferences_service
        .set_push_token(&user_id, req.token)
        .await?;

    Ok(Json(json!({ "message": "Push token updated" })))
}
