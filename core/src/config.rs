//! Environment-driven configuration (spec §6), read the way the teacher's
//! `main.rs` reads its own: `.expect(...)` for hard requirements,
//! `env::var(...).ok().and_then(|s| s.parse().ok()).filter(...).unwrap_or(DEFAULT)`
//! for optional numeric knobs.

use std::env;
use std::time::Duration;

fn parsed_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn positive_or_default(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_pool_size: u32,
    pub s3_endpoint_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub s3_bucket: String,
    pub presigned_url_expiration: Duration,
    pub celery_broker_url: String,
    pub celery_queue_name: String,
    pub regressor_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub dag_worker_count: usize,
    pub outer_concurrency: usize,
}

impl Config {
    /// Loads every variable spec §6 names, plus the ambient process knobs
    /// (`PORT`/`HOST`, `DATABASE_POOL_SIZE`) the teacher's `main.rs` always
    /// reads alongside its domain config.
    pub fn from_env() -> Self {
        let outer_concurrency = positive_or_default("WORKER_CONCURRENCY", 1);
        let cores = num_cpus::get();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_pool_size: parsed_or_default("DATABASE_POOL_SIZE", 10),
            s3_endpoint_url: env::var("S3_ENDPOINT_URL").expect("S3_ENDPOINT_URL must be set"),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").expect("AWS_ACCESS_KEY_ID must be set"),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").expect("AWS_SECRET_ACCESS_KEY must be set"),
            s3_bucket: env::var("S3_BUCKET").expect("S3_BUCKET must be set"),
            presigned_url_expiration: Duration::from_secs(parsed_or_default("PRESIGNED_URL_EXPIRATION", 3600)),
            celery_broker_url: env::var("CELERY_BROKER_URL").unwrap_or_else(|_| env::var("DATABASE_URL").unwrap_or_default()),
            celery_queue_name: env::var("CELERY_QUEUE_NAME").unwrap_or_else(|_| "transcode".to_string()),
            regressor_path: env::var("REGRESSOR_PATH").ok(),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed_or_default("PORT", 8080),
            dag_worker_count: (cores / outer_concurrency.max(1)).max(1),
            outer_concurrency,
        }
    }
}
