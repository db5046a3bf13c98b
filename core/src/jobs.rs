//! The two broker message shapes from spec §6/§4.8. These are the shared
//! contract between the Query API (producer of `AnalyzeJob`) and the
//! worker (consumer of both, producer of `TranscodeJob`), so they live here
//! rather than in either binary crate.

use serde::{Deserialize, Serialize};

use crate::predictor::PredictorOutcome;

/// `feature_calculator(task_id, source_key)` from spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeJob {
    pub task_id: i64,
    pub source_key: String,
}

/// `transcode_video(predictor_output, task_id)` from spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub task_id: i64,
    pub outcome: PredictorOutcome,
}
