use axum::{
    Json,
    Router,
    http::{Method, header},
    response::IntoResponse,
    routing::get,
};
use jsonwebtoken::DecodingKey;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::routes::{create_api_routes, create_share_routes};
use crate::services::{
    AuthService, BookService, EventService, MemoService, PreferencesService, ShareService,
};

/// アプリケーション全体で共有される状態
#[derive(Clone)]
pub struct AppState {
    pub jwt_decoding_key: DecodingKey,
    /// サービス層
    pub auth_service: Arc<AuthService>,
    pub book_service: Arc<BookService>,
    pub event_service: Arc<EventService>,
    pub memo_service: Arc<MemoService>,
    pub share_service: Arc<ShareService>,
    pub preferences_service: Arc<PreferencesService>,
    /// アプリケーション設定
    pub config: Arc<Config>,
}

pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("Starting LearnLock Server...");

    println!("Configuring CORS...");
    let allowed_origins = state.config.server.get_allowed_origins(&addr)?;

    // Cookie認証のためallow_credentialsが必要（オリジンはワイルドカード不可）
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers(vec![header::CONTENT_TYPE])
        .allow_credentials(true);

    println!("Creating routes...");
    let app = Router::new()
        .route("/health", get(handle_health))
        .nest("/api", create_api_routes())
        .nest("/shared", create_share_routes())
        .with_state(state)
        .layer(cors);

    let listener = TcpListener::bind(addr).await?;
    println!("Server is running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
