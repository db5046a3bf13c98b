//! The process-wide state threaded through route handlers via axum's
//! `State` extractor — an explicit context value per spec §9's "global
//! state -> explicit context" note, mirroring the teacher's `AppState`.

use std::time::Duration;

use apalis_sql::postgres::PostgresStorage;
use sqlx::PgPool;

use transcode_core::jobs::AnalyzeJob;
use transcode_core::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: ObjectStore,
    pub analyze_queue: PostgresStorage<AnalyzeJob>,
    pub presigned_url_expiration: Duration,
}
