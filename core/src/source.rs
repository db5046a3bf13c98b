//! The Frame Source (C1): a lazy, single-pass, restartable-only-by-reopening
//! sequence of decoded frames from a URL-addressable video.
//!
//! Backed by `ffmpeg`/`ffprobe` subprocesses, following the teacher's
//! `frames.rs`/`thumbnails.rs` pattern of shelling out rather than linking a
//! decode library. Grounded in `original_source/web/api/src/tasks/decoder.py`
//! for the "no video stream -> error" contract and single-pass iteration
//! semantics.

use std::process::Stdio;

use ndarray::Array2;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::{CoreError, CoreResult};
use crate::frame::Frame;

/// Depth of the decode-to-schedule handoff channel (spec §4.3, §9):
/// bounds memory to `O(K * frame_size)` and gives the decoder backpressure
/// against a slow scheduler.
pub const DEFAULT_LOOKAHEAD: usize = 10;

#[derive(Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    duration: Option<f64>,
}

/// ffprobe's `-of json` reports `duration` as a JSON string (e.g.
/// `"12.345000"`), not a number.
fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Probes for a video stream's dimensions and the container's total
/// duration in time-base units (spec §4.1: "the stream's total duration").
/// Fails with `NoVideoStream` if none is present or the URL is unreachable.
async fn probe_video_stream(url: &str) -> CoreResult<(u32, u32, f64)> {
    let ffprobe = which::which("ffprobe").map_err(|_| CoreError::EncoderBinaryNotFound)?;
    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,duration",
            "-of", "json",
        ])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(CoreError::Decode(String::from_utf8_lossy(&output.stderr).into_owned()));
    }

    let parsed: ProbeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| CoreError::Decode(e.to_string()))?;
    let stream = parsed.streams.into_iter().next().ok_or(CoreError::NoVideoStream)?;
    Ok((stream.width, stream.height, stream.duration.unwrap_or(0.0)))
}

/// Streams decoded luma planes one frame at a time; never buffers the
/// whole video (spec §4.1).
pub struct FrameSource {
    child: Child,
    rx: mpsc::Receiver<CoreResult<Frame>>,
    duration: f64,
}

impl FrameSource {
    pub async fn open(url: &str) -> CoreResult<Self> {
        let (width, height, duration) = probe_video_stream(url).await?;

        let ffmpeg = which::which("ffmpeg").map_err(|_| CoreError::EncoderBinaryNotFound)?;
        let mut child = Command::new(ffmpeg)
            .args([
                "-seekable", "1",
                "-reconnect_delay_max", "300",
                "-multiple_requests", "1",
                "-reconnect_on_http_error", "429,5xx",
                "-reconnect_on_network_error", "1",
                "-i", url,
                "-an",
                "-f", "rawvideo",
                "-pix_fmt", "gray",
                "-hide_banner",
                "-loglevel", "error",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdout = child.stdout.take().expect("stdout piped");
        let (tx, rx) = mpsc::channel(DEFAULT_LOOKAHEAD);
        let frame_bytes = (width as usize) * (height as usize);

        tokio::spawn(async move {
            let mut index: i64 = 0;
            loop {
                let mut buf = vec![0u8; frame_bytes];
                match stdout.read_exact(&mut buf).await {
                    Ok(()) => {
                        let plane = Array2::from_shape_fn((height as usize, width as usize), |(i, j)| {
                            buf[i * width as usize + j] as f64
                        });
                        let frame = Frame {
                            width,
                            height,
                            format: "gray".to_string(),
                            pts: index,
                            dts: index,
                            key_frame: index == 0,
                            time: index as f64,
                            planes: vec![plane],
                        };
                        index += 1;
                        if tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => {
                        let _ = tx.send(Err(CoreError::Decode(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(Self { child, rx, duration })
    }

    /// Single-pass iteration: returns `None` once the stream is exhausted.
    pub async fn next_frame(&mut self) -> Option<CoreResult<Frame>> {
        self.rx.recv().await
    }

    /// The container's total duration in time-base units (spec §4.1),
    /// probed once at open time. Used by the analyzer's progress logging
    /// (`pts/duration`, spec §4.8).
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}
