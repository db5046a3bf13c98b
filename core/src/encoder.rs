//! The Encoder Driver (C6): invokes the external encoder with the chosen
//! rate-control parameter, streaming input from a signed URL, output via a
//! temp file, then handing the result to the object store.
//!
//! Argument groups are reproduced byte-for-byte from spec §4.6, grounded in
//! `original_source/web/api/src/tasks/transcode.py`'s `encode_video` and
//! the teacher's own `media_studio.rs`/`thumbnails.rs` subprocess pattern
//! (incremental `Vec<String>` assembly, `Stdio::piped()` stderr capture,
//! cleanup on every exit path).

use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::error::{CoreError, CoreResult};
use crate::predictor::PredictorOutcome;

/// Resolved once per worker process and cached (`transcode.py`'s
/// `ffmpeg_bin` cached_property analog).
pub fn resolve_ffmpeg_binary() -> CoreResult<std::path::PathBuf> {
    which::which("ffmpeg").map_err(|_| CoreError::EncoderBinaryNotFound)
}

/// Translates a predictor outcome into the `-c:v libx265 -preset veryslow
/// [-<param> <value>]` group. Every `PredictorOutcome` variant maps to a
/// concrete rate-control choice — unlike
/// `original_source/transcode.py`'s `encode_params`, which silently emits
/// no rate-control flag at all when `status` is neither `"success"` nor
/// `"failed"`, this is unreachable by construction since the enum is
/// exhaustive (see DESIGN.md).
pub fn parameter_group(outcome: &PredictorOutcome) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), "libx265".to_string(), "-preset".to_string(), "veryslow".to_string()];
    match outcome {
        PredictorOutcome::Success { parameter, value } => {
            args.push(format!("-{}", parameter.as_str()));
            args.push(value.to_string());
        }
        PredictorOutcome::SuccessFallback | PredictorOutcome::Failed { .. } => {
            args.push("-crf".to_string());
            args.push("16".to_string());
        }
    }
    args
}

pub struct EncodedOutput {
    pub path: std::path::PathBuf,
    pub size: u64,
    _temp: NamedTempFile,
}

pub struct EncoderDriver {
    ffmpeg: std::path::PathBuf,
    soft_deadline: Duration,
}

impl EncoderDriver {
    pub fn new(ffmpeg: std::path::PathBuf, soft_deadline: Duration) -> Self {
        Self { ffmpeg, soft_deadline }
    }

    /// Runs the encoder against `source_url`, writing to a fresh `.mp4`
    /// temp file. The temp file outlives this call (its contents are
    /// uploaded by the caller) but is removed once the returned
    /// `EncodedOutput` is dropped.
    pub async fn run(&self, source_url: &str, outcome: &PredictorOutcome) -> CoreResult<EncodedOutput> {
        let temp = tempfile::Builder::new().suffix(".mp4").tempfile()?;
        let output_path = temp.path().to_path_buf();

        let input_group = [
            "-seekable", "1",
            "-reconnect_delay_max", "300",
            "-multiple_requests", "1",
            "-reconnect_on_http_error", "429,5xx",
            "-reconnect_on_network_error", "1",
            "-i", source_url,
        ];
        let parameters = parameter_group(outcome);
        let global_group = [
            "-codec:a", "copy",
            "-sn",
            "-y",
            "-hide_banner",
            "-loglevel", "error",
        ];

        let mut command = Command::new(&self.ffmpeg);
        command
            .args(input_group)
            .args(&parameters)
            .args(global_group)
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::info!(args = ?parameters, "encoding video");

        let output = tokio::time::timeout(self.soft_deadline, command.output())
            .await
            .map_err(|_| CoreError::EncoderTimedOut)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::error!(%stderr, status = ?output.status, "encoder failed");
            return Err(CoreError::EncoderFailed { status: output.status.code().unwrap_or(-1), stderr });
        }

        let size = tokio::fs::metadata(&output_path).await?.len();
        Ok(EncodedOutput { path: output_path, size, _temp: temp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::RateControlParameter;

    #[test]
    fn success_uses_predicted_parameter() {
        let outcome = PredictorOutcome::Success { parameter: RateControlParameter::Qp, value: 30 };
        let args = parameter_group(&outcome);
        assert_eq!(args, vec!["-c:v", "libx265", "-preset", "veryslow", "-qp", "30"]);
    }

    #[test]
    fn fallback_uses_crf_16() {
        let args = parameter_group(&PredictorOutcome::SuccessFallback);
        assert_eq!(args, vec!["-c:v", "libx265", "-preset", "veryslow", "-crf", "16"]);
    }

    #[test]
    fn failed_degrades_to_crf_16() {
        let args = parameter_group(&PredictorOutcome::Failed { error: "boom".into() });
        assert_eq!(args, vec!["-c:v", "libx265", "-preset", "veryslow", "-crf", "16"]);
    }
}
