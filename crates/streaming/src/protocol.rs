//! Wire types for the pipeline backend.
//!
//! - `POST /annotation/from-map` takes an [`AnnotationRequest`].
//! - `POST /pipeline/run/{job}` takes a [`RunPipelineRequest`].
//! - `GET /pipeline/status` and `GET /pipeline/logs` answer with
//!   [`PipelineStatusResponse`] and [`PipelineLogsResponse`], which fold into
//!   a [`PipelineJobStatus`].
//!
//! Region and asset payloads are typed by `catalog` and `scene`.

use serde::{Deserialize, Serialize};

pub const TRAIN_SATELLITE_JOB: &str = "train_satellite";
pub const DEFAULT_ANNOTATION_DATASET: &str = "satellite";

/// One captured training coordinate. Note the backend names longitude `lon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRequest {
    pub lat: f64,
    pub lon: f64,
    pub dataset: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainParams {
    pub epochs: u32,
    pub batch_size: u32,
    /// Continue from the last checkpoint instead of starting fresh.
    pub resume: bool,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 8,
            resume: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPipelineRequest<P> {
    pub params: P,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineStatusResponse {
    pub running: bool,
    #[serde(default)]
    pub job_type: Option<String>,
}

/// `logs` arrives either as a list of lines or as one newline-joined string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogLines {
    Lines(Vec<String>),
    Text(String),
}

impl Default for LogLines {
    fn default() -> Self {
        LogLines::Lines(Vec::new())
    }
}

impl LogLines {
    pub fn last_line(&self) -> Option<&str> {
        match self {
            LogLines::Lines(lines) => lines.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty()),
            LogLines::Text(text) => text.lines().rev().map(str::trim).find(|l| !l.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineLogsResponse {
    #[serde(default)]
    pub logs: LogLines,
}

/// Read-only snapshot of the backend job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineJobStatus {
    pub running: bool,
    pub phase_label: Option<String>,
    pub last_log_line: Option<String>,
}

impl PipelineJobStatus {
    pub fn from_parts(status: PipelineStatusResponse, logs: Option<PipelineLogsResponse>) -> Self {
        Self {
            running: status.running,
            phase_label: status.job_type.filter(|j| !j.is_empty()),
            last_log_line: logs.and_then(|l| l.logs.last_line().map(str::to_string)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnnotationRequest, PipelineJobStatus, PipelineLogsResponse, PipelineStatusResponse,
        RunPipelineRequest, TrainParams,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_bodies_match_the_backend() {
        let a = AnnotationRequest {
            lat: 40.1,
            lon: -76.8,
            dataset: "satellite".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({"lat": 40.1, "lon": -76.8, "dataset": "satellite"})
        );

        let run = RunPipelineRequest {
            params: TrainParams::default(),
        };
        assert_eq!(
            serde_json::to_value(&run).unwrap(),
            json!({"params": {"epochs": 5, "batch_size": 8, "resume": true}})
        );
    }

    #[test]
    fn status_folds_logs_in_either_shape() {
        let status: PipelineStatusResponse =
            serde_json::from_value(json!({"running": true, "job_type": "train_satellite"})).unwrap();
        let listed: PipelineLogsResponse =
            serde_json::from_value(json!({"logs": ["epoch 1/5", "epoch 2/5", ""]})).unwrap();
        let joined: PipelineLogsResponse =
            serde_json::from_value(json!({"logs": "loading\nepoch 3/5\n"})).unwrap();

        let snap = PipelineJobStatus::from_parts(status.clone(), Some(listed));
        assert_eq!(snap.phase_label.as_deref(), Some("train_satellite"));
        assert_eq!(snap.last_log_line.as_deref(), Some("epoch 2/5"));

        let snap = PipelineJobStatus::from_parts(status, Some(joined));
        assert_eq!(snap.last_log_line.as_deref(), Some("epoch 3/5"));

        let idle: PipelineStatusResponse = serde_json::from_value(json!({"running": false})).unwrap();
        assert_eq!(PipelineJobStatus::from_parts(idle, None), PipelineJobStatus::default());
    }
}
