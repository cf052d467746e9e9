use axum::{
    Json,
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use crate::error::Result;
use crate::server::AppState;

/// 認証不要の公開共有ルート。`/shared/{shareId}` で解決する
pub fn create_share_routes() -> Router<AppState> {
    Router::new().route("/{share_id}", get(handle_get_share))
}

// 期限切れ・存在しないIDはどちらもnot-foundになる。
// 取得の副作用としてアクセスカウンタが進む
async fn handle_get_share(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<impl IntoResponse> {
    let shared = state.share_service.resolve(&share_id).await?;

    Ok(Json(shared))
}
