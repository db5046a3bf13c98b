mod analyze;
mod jobs;
mod transcode;

use apalis::prelude::*;
use apalis_sql::postgres::PostgresStorage;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use transcode_core::config::Config;
use transcode_core::predictor::{CatBoostRegressor, ConstantRegressor, Regressor};
use transcode_core::storage::ObjectStore;

use jobs::{AnalyzeJob, TranscodeJob, WorkerContext};

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

    let storage = ObjectStore::connect(
        &config.s3_endpoint_url,
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        &config.s3_bucket,
    )
    .await;

    let regressor: Arc<dyn Regressor> = match &config.regressor_path {
        Some(path) => match CatBoostRegressor::load(std::path::Path::new(path)) {
            Ok(r) => {
                tracing::info!(path, "regressor artifact loaded");
                Arc::new(r)
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "regressor artifact unreadable, falling back to constant regressor");
                Arc::new(ConstantRegressor(0.0))
            }
        },
        None => {
            tracing::warn!("REGRESSOR_PATH not set, using constant regressor (every task takes the fallback parameter)");
            Arc::new(ConstantRegressor(0.0))
        }
    };

    let ffmpeg = transcode_core::encoder::resolve_ffmpeg_binary().expect("ffmpeg binary not found on PATH");

    PostgresStorage::setup(&pool).await.expect("failed to set up apalis storage");

    let analyze_storage: PostgresStorage<AnalyzeJob> = PostgresStorage::new(pool.clone());
    let transcode_storage: PostgresStorage<TranscodeJob> = PostgresStorage::new(pool.clone());

    let ctx = WorkerContext {
        pool: pool.clone(),
        storage,
        regressor,
        ffmpeg,
        soft_deadline: Duration::from_secs(parsed_soft_deadline_secs()),
        dag_worker_count: config.dag_worker_count,
        transcode_queue: transcode_storage.clone(),
    };

    tracing::info!(
        concurrency = config.outer_concurrency,
        dag_workers = config.dag_worker_count,
        "starting transcode worker"
    );

    let analyze_worker = WorkerBuilder::new("analyze-worker")
        .concurrency(config.outer_concurrency)
        .data(ctx.clone())
        .backend(analyze_storage)
        .build_fn(analyze::process_analyze_job);

    let transcode_worker = WorkerBuilder::new("transcode-worker")
        .concurrency(config.outer_concurrency)
        .data(ctx)
        .backend(transcode_storage)
        .build_fn(transcode::process_transcode_job);

    Monitor::new()
        .register(analyze_worker)
        .register(transcode_worker)
        .on_event(|e| tracing::debug!(event = ?e, "worker event"))
        .shutdown_timeout(Duration::from_secs(30))
        .run_with_signal(async {
            wait_for_shutdown_signal().await;
            tracing::info!("shutdown signal received, draining in-flight jobs");
            Ok(())
        })
        .await
        .expect("worker monitor failed");

    Ok(())
}

/// The soft per-task deadline enforced around the ffmpeg subprocess (spec
/// §5); separate from the monitor's own shutdown grace period above.
fn parsed_soft_deadline_secs() -> u64 {
    std::env::var("ENCODER_SOFT_DEADLINE_SECS").ok().and_then(|s| s.parse().ok()).filter(|v| *v > 0).unwrap_or(600)
}

/// Resolves on either Ctrl-C or SIGTERM, whichever arrives first — spec §5
/// requires a shutdown signal to drain in-flight tasks rather than leave
/// them in `PROCESSING`; orchestrators (systemd, Kubernetes) send SIGTERM,
/// not just the interactive Ctrl-C this process might also receive.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
