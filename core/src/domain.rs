//! The durable Task state machine and the transient per-frame row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status {other}")),
        }
    }
}

/// The unit of durable work. See spec §3: status transitions only along
/// PENDING -> PROCESSING -> {COMPLETED, FAILED}; PROCESSING -> PROCESSING is
/// idempotent re-entry; terminal states are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub source_file: String,
    pub source_size: i64,
    pub output_file: Option<String>,
    pub output_size: Option<i64>,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sentinel returned by `Claim` when the task is already terminal — callers
/// exit cleanly rather than treating this as an error (idempotent recovery,
/// spec §4.8).
#[derive(Debug, Clone, Copy)]
pub struct Finished;

/// Transient per-frame output: timing/shape metadata plus one value per
/// registered feature calculator. Consumed by the Aggregator and dropped.
#[derive(Debug, Clone)]
pub struct FrameRow {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub key_frame: bool,
    pub pts: i64,
    pub dts: i64,
    pub time: f64,
    pub values: HashMap<&'static str, Option<f64>>,
}

impl FrameRow {
    pub fn new(width: u32, height: u32, format: String, key_frame: bool, pts: i64, dts: i64, time: f64) -> Self {
        Self {
            width,
            height,
            format,
            key_frame,
            pts,
            dts,
            time,
            values: HashMap::new(),
        }
    }
}
