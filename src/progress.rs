//! Progress event interpretation.
//!
//! Progress events carry an untyped `details` mapping whose shape depends on
//! the step that produced it. This module turns `(step, details)` into a
//! normalized [`DisplayMetrics`] value and keeps the most recent event so a
//! view can be derived at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::steps::{describe, PipelineStep, StepInfo};

const BYTE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

const CLEANUP_PLACEHOLDER: &str = "Initializing AI cleanup...";

/// A single progress report from the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: PipelineStep,
    #[serde(default)]
    pub percent: f64,
    #[serde(default, deserialize_with = "deserialize_message")]
    pub message: String,
    #[serde(default)]
    pub details: Option<JsonValue>,
}

fn deserialize_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadMetrics {
    pub downloaded: String,
    pub total: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// Playback position of an analysis pass, in whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetrics {
    pub current_time: Option<u64>,
    pub total_duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionMetrics {
    pub completed_segments: u64,
    pub total_segments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupMetrics {
    pub parsed: u64,
    pub expected: u64,
    pub deselected: u64,
    pub message: String,
}

/// Step-specific metrics derived from a progress event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayMetrics {
    Download(DownloadMetrics),
    Analysis(AnalysisMetrics),
    Transcription(TranscriptionMetrics),
    Cleanup(CleanupMetrics),
}

/// Format a byte count with 1024-based units and two decimals.
///
/// `0` (and anything that is not a positive finite number) formats as `"0 B"`.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }

    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, BYTE_UNITS[unit])
}

/// Format an ETA: `"Ns"` under a minute, `"Mm Ss"` under an hour, `"Hh Mm"` above.
/// Returns an empty string for non-positive input.
pub fn format_time_remaining(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return String::new();
    }

    if seconds < 60.0 {
        format!("{}s", seconds.round() as u64)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor() as u64;
        let secs = (seconds % 60.0).round() as u64;
        format!("{}m {}s", minutes, secs)
    } else {
        let hours = (seconds / 3600.0).floor() as u64;
        let minutes = ((seconds % 3600.0) / 60.0).round() as u64;
        format!("{}h {}m", hours, minutes)
    }
}

fn number(details: &JsonValue, key: &str) -> Option<f64> {
    details.get(key).and_then(JsonValue::as_f64).filter(|v| v.is_finite())
}

fn count(details: &JsonValue, key: &str) -> u64 {
    number(details, key)
        .map(|v| v.max(0.0).round() as u64)
        .unwrap_or(0)
}

fn whole_seconds(details: &JsonValue, key: &str) -> Option<u64> {
    number(details, key).map(|v| v.max(0.0).round() as u64)
}

fn download_metrics(details: &JsonValue) -> DownloadMetrics {
    let eta = number(details, "eta_seconds")
        .filter(|s| *s > 0.0)
        .map(format_time_remaining);

    DownloadMetrics {
        downloaded: format_bytes(number(details, "bytes_downloaded").unwrap_or(0.0)),
        total: number(details, "total_bytes").map(format_bytes),
        speed: number(details, "speed_bps").map(|bps| format!("{}/s", format_bytes(bps))),
        eta,
    }
}

/// `event_message` is the event-level message, used when the details carry none.
fn cleanup_metrics(details: &JsonValue, event_message: &str) -> CleanupMetrics {
    let parsed = count(details, "parsed_count");
    let expected = count(details, "expected_count");
    let deselected = count(details, "deselected_count");

    let message = match details.get("message").and_then(JsonValue::as_str) {
        Some(m) if !m.trim().is_empty() => m.to_string(),
        _ if !event_message.trim().is_empty() => event_message.to_string(),
        _ if parsed > 0 && expected > 0 => {
            format!("Cleaning up chapters: {}/{}", parsed, expected)
        }
        _ => CLEANUP_PLACEHOLDER.to_string(),
    };

    CleanupMetrics {
        parsed,
        expected,
        deselected,
        message,
    }
}

/// Derive display metrics for `step` from its details payload.
///
/// Returns `None` for steps without metrics or when `details` is not a mapping;
/// the caller then shows only the raw message and percent.
pub fn interpret(step: &PipelineStep, details: Option<&JsonValue>) -> Option<DisplayMetrics> {
    derive_metrics(step, details, "")
}

fn derive_metrics(
    step: &PipelineStep,
    details: Option<&JsonValue>,
    event_message: &str,
) -> Option<DisplayMetrics> {
    let details = details.filter(|d| d.is_object())?;

    match step {
        PipelineStep::Downloading => Some(DisplayMetrics::Download(download_metrics(details))),
        PipelineStep::AudioAnalysis
        | PipelineStep::VadAnalysis
        | PipelineStep::PartialAudioAnalysis
        | PipelineStep::PartialVadAnalysis => Some(DisplayMetrics::Analysis(AnalysisMetrics {
            current_time: whole_seconds(details, "current_time"),
            total_duration: whole_seconds(details, "total_duration"),
        })),
        PipelineStep::AsrProcessing => Some(DisplayMetrics::Transcription(TranscriptionMetrics {
            completed_segments: count(details, "completed_segments"),
            total_segments: count(details, "total_segments"),
        })),
        PipelineStep::AiCleanup => {
            Some(DisplayMetrics::Cleanup(cleanup_metrics(details, event_message)))
        }
        _ => None,
    }
}

/// Everything a renderer needs for the active step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub step: PipelineStep,
    pub info: &'static StepInfo,
    pub percent: f64,
    pub message: String,
    pub metrics: Option<DisplayMetrics>,
    /// When the client received the event
    pub received_at: Option<DateTime<Utc>>,
}

/// Holds the most recently received progress event.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    latest: Option<ProgressEvent>,
    received_at: Option<DateTime<Utc>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current event. Step and details are always taken from the same event.
    pub fn apply(&mut self, mut event: ProgressEvent) {
        event.percent = if event.percent.is_finite() {
            event.percent.clamp(0.0, 100.0)
        } else {
            0.0
        };

        if self.latest.as_ref().map(|e| e.step) != Some(event.step) {
            log::debug!("Progress: step changed to {:?}", event.step);
        }

        self.latest = Some(event);
        self.received_at = Some(Utc::now());
    }

    pub fn view(&self) -> Option<ProgressView> {
        let event = self.latest.as_ref()?;
        let metrics = derive_metrics(&event.step, event.details.as_ref(), &event.message);

        let message = match &metrics {
            Some(DisplayMetrics::Cleanup(cleanup)) => cleanup.message.clone(),
            _ => event.message.clone(),
        };

        Some(ProgressView {
            step: event.step,
            info: describe(&event.step),
            percent: event.percent,
            message,
            metrics,
            received_at: self.received_at,
        })
    }

    pub fn reset(&mut self) {
        self.latest = None;
        self.received_at = None;
    }
}
