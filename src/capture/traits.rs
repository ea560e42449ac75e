//! Capture device trait definitions
//!
//! Platform-agnostic boundary to the audio-recording hardware.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Capture-device errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device is busy")]
    DeviceBusy,

    #[error("Capture device not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Exclusive handle to an acquired capture device
///
/// Not `Clone`: releasing consumes it, so a handle can only be released once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CaptureHandle {
    id: Uuid,
}

impl CaptureHandle {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for CaptureHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture-{}", self.id)
    }
}

/// The audio-recording hardware.
///
/// The hardware is a singleton; at most one handle is outstanding at a time.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Take exclusive ownership of the hardware
    async fn acquire(&mut self) -> CaptureResult<CaptureHandle>;

    /// Begin writing captured audio to `sink`
    async fn start(&mut self, handle: &CaptureHandle, sink: &Path) -> CaptureResult<()>;

    /// Finish the recording and flush the sink
    async fn stop(&mut self, handle: &CaptureHandle) -> CaptureResult<()>;

    /// Give the hardware back
    async fn release(&mut self, handle: CaptureHandle) -> CaptureResult<()>;
}

/// Build the sink path for a recording starting at `started_at`
///
/// Files are named `<prefix>_<unix-millis>.<extension>` inside `dir`.
pub fn sink_path(dir: &Path, prefix: &str, extension: &str, started_at: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        prefix,
        started_at.timestamp_millis(),
        extension
    ))
}
