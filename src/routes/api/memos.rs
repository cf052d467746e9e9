use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Json},
    routing::{get, patch, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Role;
use crate::error::{AppError, Result};
use crate::repositories::{MemoFormat, ShareMethod};
use crate::routes::api::authenticate;
use crate::routes::api::responses::{MemoResponse, MemoWithStatusResponse};
use crate::server::AppState;
use crate::services::ShareOptions;

pub fn create_memo_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events/{event_id}/memos",
            post(handle_generate_memo).get(handle_get_memos),
        )
        .route("/events/{event_id}/memos/latest", get(handle_get_latest_memo))
        .route(
            "/memos/{memo_id}",
            get(handle_get_memo).delete(handle_delete_memo),
        )
        .route("/memos/{memo_id}/viewed", post(handle_mark_viewed))
        .route("/memos/{memo_id}/share", post(handle_share_memo))
        .route("/shares/{share_id}/method", patch(handle_track_share_method))
}

#[derive(Deserialize)]
struct MemoGenerateRequest {
    format: Option<MemoFormat>,
}

// メモ生成はLLM呼び出しを伴うため、イベント所有者の明示的なリクエストでのみ実行される
async fn handle_generate_memo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
    Json(req): Json<MemoGenerateRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::GenerateMemo)?;
    let memo = state
        .memo_service
        .generate_for_event(&user_id, &event_id, req.format)
        .await?;

    Ok(Json(MemoResponse::from(memo)))
}

async fn handle_get_memos(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ViewMemo)?;
    let memos = state.memo_service.find_by_event(&user_id, &event_id).await?;

    let memos: Vec<MemoResponse> = memos.into_iter().map(MemoResponse::from).collect();
    Ok(Json(json!({ "memos": memos })))
}

async fn handle_get_latest_memo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ViewMemo)?;
    let latest = state
        .memo_service
        .find_latest_by_event(&user_id, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No memos for event {}", event_id)))?;

    Ok(Json(MemoWithStatusResponse::from(latest)))
}

async fn handle_get_memo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(memo_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ViewMemo)?;
    let memo = state.memo_service.find_by_id(&user_id, &memo_id).await?;

    Ok(Json(MemoResponse::from(memo)))
}

async fn handle_mark_viewed(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(memo_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ViewMemo)?;
    state.memo_service.mark_viewed(&user_id, &memo_id).await?;

    Ok(Json(json!({ "message": "Memo marked as viewed" })))
}

async fn handle_delete_memo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(memo_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ViewMemo)?;
    state.memo_service.delete(&user_id, &memo_id).await?;

    Ok(Json(json!({ "message": "Memo deleted successfully" })))
}

async fn handle_share_memo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(memo_id): Path<String>,
    Json(options): Json<ShareOptions>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ShareMemo)?;
    let response = state
        .share_service
        .create_share(&user_id, &memo_id, options)
        .await?;

    Ok(Json(response))
}

#[derive(Deserialize)]
struct ShareMethodRequest {
    method: ShareMethod,
}

async fn handle_track_share_method(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(share_id): Path<String>,
    Json(req): Json<ShareMethodRequest>,
) -> Result<impl IntoResponse> {
    let user_id = authenticate(&jar, &state, Role::ShareMemo)?;
    state
        .share_service
        .track_share_method(&user_id, &share_id, req.method)
        .await?;

    Ok(Json(json!({ "message": "Share method recorded" })))
}
