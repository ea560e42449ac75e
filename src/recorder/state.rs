//! Recording state management
//!
//! Defines the recording session status and the session record itself.

use crate::capture::CaptureHandle;
use crate::events::CallState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Status of the single recording session slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No recording in progress
    #[default]
    None,
    /// Capture device is recording
    Active,
    /// A stop is in progress
    Stopping,
}

/// The in-flight recording.
///
/// Owns the capture handle, so the handle lives exactly as long as the session.
#[derive(Debug)]
pub struct RecordingSession {
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,

    /// Where the device writes audio
    pub sink: PathBuf,

    pub(crate) handle: CaptureHandle,

    started: Instant,
}

impl RecordingSession {
    pub(crate) fn new(handle: CaptureHandle, sink: PathBuf, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            sink,
            handle,
            started: Instant::now(),
        }
    }

    pub fn sink(&self) -> &Path {
        &self.sink
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

/// Timestamped record of one processed call-state event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub from: SessionStatus,
    pub event: CallState,
    pub to: SessionStatus,
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    /// Path to the recorded file
    pub sink: String,

    /// When recording started
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds
    pub duration_ms: f64,

    /// Whether the device reported a clean stop
    pub clean_stop: bool,
}
