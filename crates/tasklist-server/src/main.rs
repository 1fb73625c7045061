use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tasklist_api::auth::{AppState, AppStateInner};
use tasklist_api::cookies::origin_host;
use tasklist_api::routes::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasklist=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("TASKLIST_DB_PATH").unwrap_or_else(|_| "tasklist.db".into());
    let host = std::env::var("TASKLIST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TASKLIST_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let cors_origin = std::env::var("TASKLIST_CORS_ORIGIN")
        .unwrap_or_else(|_| "http://localhost:5173".into());
    let jwt_secret =
        std::env::var("TASKLIST_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let access_ttl_seconds: i64 = std::env::var("TASKLIST_JWT_TTL_SECONDS")
        .unwrap_or_else(|_| "900".into())
        .parse()?;
    let refresh_ttl_seconds: i64 = std::env::var("TASKLIST_REFRESH_TTL_SECONDS")
        .unwrap_or_else(|_| "604800".into())
        .parse()?;

    // Init database
    let db = tasklist_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        access_ttl_seconds,
        refresh_ttl_seconds,
        cookie_domain: origin_host(&cors_origin).to_string(),
    });

    // Cookie-carrying CORS: exact origin, credentials on
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>()?)
        .allow_credentials(true)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE]);

    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Tasklist server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
