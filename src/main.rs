use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod auth;
mod clock;
mod config;
mod error;
mod repositories;
mod routes;
mod server;
mod services;

use clock::{RandomIdGenerator, SystemClock};
use config::{Config, Environment};
use repositories::{
    AuthRepository, MongoBookRepository, MongoEventRepository, MongoMemoRepository,
    MongoPreferencesRepository, MongoShareRepository, RevocationHandler,
};
use server::AppState;
use services::{
    AuthService, BookService, EmailService, EventService, FcmPushService, GeminiClient,
    GenerationRateLimiter, MemoService, PreferencesService, ReminderService, ShareService,
    spawn_sweep_task,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // JWT秘密鍵。開発環境でのみ未設定を自動生成で補う
    let jwt_secret = if config.jwt.secret.is_empty() {
        if config.server.env == Environment::Production {
            return Err("JWT_SECRET must be set in production".into());
        }
        println!("⚠️  JWT secret not found. Generating a new one for this session...");
        println!("⚠️  WARNING: This is for development/testing only!");
        auth::generate_secret_key()
    } else {
        config.jwt.secret.clone()
    };

    println!("Connecting to PostgreSQL...");
    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.postgres.connection_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pg_pool).await?;

    println!("Connecting to MongoDB...");
    let mongo_client =
        mongodb::Client::with_uri_str(&config.database.mongodb.connection_uri).await?;
    let mongo_db = mongo_client.database(&config.database.mongodb.db_name);

    // リポジトリ層
    let auth_repo = Arc::new(AuthRepository::new(pg_pool));
    let book_repo = Arc::new(MongoBookRepository::new(mongo_db.clone()));
    let event_repo = Arc::new(MongoEventRepository::new(mongo_db.clone()));
    let memo_repo = Arc::new(MongoMemoRepository::new(mongo_db.clone()));
    let share_repo = Arc::new(MongoShareRepository::new(mongo_db.clone()));
    let prefs_repo = Arc::new(MongoPreferencesRepository::new(mongo_db));

    let clock = Arc::new(SystemClock);
    let ids = Arc::new(RandomIdGenerator);

    // 外部サービス
    let email_service = Arc::new(EmailService::from_config(&config.email, &config.app.base_url)?);
    let push_service = Arc::new(FcmPushService::new(config.push.fcm_server_key.clone()));
    let ai_client = Arc::new(GeminiClient::new(
        config.gemini.api_key.clone(),
        config.gemini.model.clone(),
    ));

    // サービス層
    let auth_service = Arc::new(AuthService::new(
        auth_repo.clone(),
        auth_repo.clone(),
        prefs_repo.clone(),
        jwt_secret.clone(),
        clock.clone(),
    ));
    let book_service = Arc::new(BookService::new(
        book_repo.clone(),
        auth_repo.clone(),
        clock.clone(),
        ids.clone(),
    ));
    let event_service = Arc::new(EventService::new(
        event_repo.clone(),
        clock.clone(),
        ids.clone(),
    ));
    let memo_service = Arc::new(MemoService::new(
        memo_repo.clone(),
        event_repo.clone(),
        book_repo.clone(),
        prefs_repo.clone(),
        auth_repo.clone(),
        ai_client,
        email_service.clone(),
        Arc::new(GenerationRateLimiter::new()),
        clock.clone(),
        ids.clone(),
    ));
    let share_service = Arc::new(ShareService::new(
        share_repo,
        memo_repo,
        clock.clone(),
        ids,
        config.app.base_url.clone(),
    ));
    let preferences_service = Arc::new(PreferencesService::new(prefs_repo.clone(), clock.clone()));

    // リマインダー掃引（1時間ごと）
    let reminder_service = Arc::new(ReminderService::new(
        event_repo,
        prefs_repo,
        auth_repo.clone(),
        email_service,
        push_service,
        clock,
    ));
    spawn_sweep_task(reminder_service);

    // 期限切れJWT失効レコードの掃除（1日ごと）
    {
        let auth_repo = auth_repo.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(86400));
            loop {
                interval.tick().await;
                if let Err(e) = auth_repo.cleanup().await {
                    tracing::error!("jwt revocation cleanup failed: {}", e);
                }
            }
        });
    }

    let state = AppState {
        jwt_decoding_key: auth::create_decoding_key(&jwt_secret),
        auth_service,
        book_service,
        event_service,
        memo_service,
        share_service,
        preferences_service,
        config: Arc::new(config.clone()),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    server::start_server(addr, state).await?;

    Ok(())
}
