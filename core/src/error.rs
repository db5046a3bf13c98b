//! Crate-wide error taxonomy, grouped the way spec §7 groups failure modes:
//! decode, processor, encoder, storage, repository, predictor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no video stream found")]
    NoVideoStream,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("processor {name} failed: {message}")]
    Processor { name: &'static str, message: String },

    #[error("encoder binary not found on PATH")]
    EncoderBinaryNotFound,

    #[error("encoder exited with {status}: {stderr}")]
    EncoderFailed { status: i32, stderr: String },

    #[error("encoder timed out after soft deadline")]
    EncoderTimedOut,

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("predictor error: {0}")]
    Predictor(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
