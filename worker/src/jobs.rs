//! The shared worker-process context threaded through both handlers — an
//! explicit context value per spec §9's "global state -> explicit context"
//! note, rather than process-wide singletons. The broker message shapes
//! themselves (`AnalyzeJob`/`TranscodeJob`) live in `transcode_core::jobs`
//! since the API also needs them to enqueue the initial `Analyze` job.

use sqlx::PgPool;
use std::sync::Arc;

pub use transcode_core::jobs::{AnalyzeJob, TranscodeJob};
use transcode_core::predictor::Regressor;

#[derive(Clone)]
pub struct WorkerContext {
    pub pool: PgPool,
    pub storage: transcode_core::storage::ObjectStore,
    pub regressor: Arc<dyn Regressor>,
    pub ffmpeg: std::path::PathBuf,
    pub soft_deadline: std::time::Duration,
    pub dag_worker_count: usize,
    pub transcode_queue: apalis_sql::postgres::PostgresStorage<TranscodeJob>,
}
