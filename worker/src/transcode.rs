//! The Transcode stage of the Orchestrator (C8): invokes the Encoder
//! Driver with the predictor's chosen parameter, uploads the result, and
//! records the terminal status.

use apalis::prelude::{Data, Error};
use uuid::Uuid;

use transcode_core::encoder::EncoderDriver;
use transcode_core::{repository, storage};

use crate::jobs::{TranscodeJob, WorkerContext};

pub async fn process_transcode_job(job: TranscodeJob, ctx: Data<WorkerContext>) -> Result<(), Error> {
    let claimed = repository::claim(&ctx.pool, job.task_id)
        .await
        .map_err(|e| Error::Failed(std::sync::Arc::new(Box::new(e))))?;

    let task = match claimed {
        Ok(task) => task,
        Err(_finished) => {
            tracing::info!(task_id = job.task_id, "task already finished, skipping transcode");
            return Ok(());
        }
    };

    match run_transcode(&ctx, &task.source_file, &job.outcome).await {
        Ok((key, size)) => {
            if let Err(e) = repository::mark_completed(&ctx.pool, job.task_id, &key, size as i64).await {
                tracing::error!(task_id = job.task_id, error = %e, "failed to persist completion");
            }
        }
        Err(e) => {
            tracing::error!(task_id = job.task_id, error = %e, "transcode failed");
            let _ = repository::mark_failed(&ctx.pool, job.task_id, &e.to_string()).await;
        }
    }

    Ok(())
}

async fn run_transcode(
    ctx: &WorkerContext,
    source_key: &str,
    outcome: &transcode_core::predictor::PredictorOutcome,
) -> Result<(String, u64), transcode_core::error::CoreError> {
    let source_url = ctx.storage.presigned_download_url(source_key, storage::SOURCE_READ_EXPIRY).await?;

    let driver = EncoderDriver::new(ctx.ffmpeg.clone(), ctx.soft_deadline);
    let encoded = driver.run(&source_url, outcome).await?;

    let output_key = format!("encoded/{}.mp4", Uuid::new_v4().simple());
    ctx.storage.upload_file(&output_key, &encoded.path).await?;

    Ok((output_key, encoded.size))
}
