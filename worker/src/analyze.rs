//! The Analyze stage of the Orchestrator (C8): streams frames through the
//! DAG Scheduler and Aggregator, then the Predictor, and enqueues the
//! Transcode job with its output.

use apalis::prelude::{Data, Error};

use transcode_core::aggregate::Aggregator;
use transcode_core::dag::Dag;
use transcode_core::domain::Finished;
use transcode_core::predictor::Predictor;
use transcode_core::source::FrameSource;
use transcode_core::{repository, storage};

use crate::jobs::{AnalyzeJob, TranscodeJob, WorkerContext};

const PROGRESS_INTERVAL: u64 = 25;

pub async fn process_analyze_job(job: AnalyzeJob, ctx: Data<WorkerContext>) -> Result<(), Error> {
    let claimed = repository::claim(&ctx.pool, job.task_id)
        .await
        .map_err(|e| Error::Failed(std::sync::Arc::new(Box::new(e))))?;

    if claimed.is_err() {
        tracing::info!(task_id = job.task_id, "task already finished, skipping analyze");
        return Ok(());
    }

    match analyze_file(&ctx, &job.source_key).await {
        Ok(outcome) => {
            tracing::info!(task_id = job.task_id, ?outcome, "analysis complete");
            let mut queue = ctx.transcode_queue.clone();
            if let Err(e) = apalis::prelude::Storage::push(&mut queue, TranscodeJob { task_id: job.task_id, outcome }).await {
                tracing::error!(task_id = job.task_id, error = %e, "failed to enqueue transcode job");
                let _ = repository::mark_failed(&ctx.pool, job.task_id, &format!("failed to enqueue transcode: {e}")).await;
            }
        }
        Err(e) => {
            tracing::error!(task_id = job.task_id, error = %e, "analysis failed");
            let _ = repository::mark_failed(&ctx.pool, job.task_id, &e.to_string()).await;
        }
    }

    Ok(())
}

async fn analyze_file(
    ctx: &WorkerContext,
    source_key: &str,
) -> Result<transcode_core::predictor::PredictorOutcome, transcode_core::error::CoreError> {
    let url = ctx.storage.presigned_download_url(source_key, storage::SOURCE_READ_EXPIRY).await?;

    let mut source = FrameSource::open(&url).await?;
    let duration = source.duration();
    let mut dag = Dag::new(ctx.dag_worker_count);
    let mut aggregator = Aggregator::new();

    let mut frame_count: u64 = 0;
    while let Some(frame) = source.next_frame().await {
        let frame = frame?;
        if frame_count % PROGRESS_INTERVAL == 0 {
            tracing::info!(pts = frame.pts, duration, "analyze progress");
        }
        let row = dag.process_frame(frame).await?;
        aggregator.push(&row);
        frame_count += 1;
    }

    let descriptor = aggregator.finish();
    let predictor = Predictor::new(ctx.regressor.clone());
    Ok(predictor.predict(&descriptor))
}

/// Sentinel used only to document the `Finished` branch above is
/// exhaustively handled; the repository's `claim` already returns
/// `Result<Task, Finished>` and we short-circuit on `Err`.
#[allow(dead_code)]
fn _assert_finished_is_handled(_: Finished) {}
