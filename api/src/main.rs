mod error;
mod routes;
mod state;

use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use transcode_core::config::Config;
use transcode_core::jobs::AnalyzeJob;
use transcode_core::storage::ObjectStore;

use state::AppState;

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_pool_size)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!(pool_size = config.database_pool_size, "database pool connected");

    sqlx::migrate!("./migrations").run(&pool).await.expect("failed to run migrations");

    let storage = ObjectStore::connect(
        &config.s3_endpoint_url,
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        &config.s3_bucket,
    )
    .await;

    PostgresStorage::setup(&pool).await.expect("failed to set up apalis storage");
    let analyze_queue: PostgresStorage<AnalyzeJob> = PostgresStorage::new(pool.clone());

    let state = Arc::new(AppState {
        db: pool,
        storage,
        analyze_queue,
        presigned_url_expiration: config.presigned_url_expiration,
    });

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::build_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));

    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await.expect("server failed");

    Ok(())
}
