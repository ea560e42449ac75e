//! Agent configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or empty)
//! object is a valid configuration.

use crate::utils::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration for the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Directory that receives recording sinks
    pub recordings_dir: PathBuf,

    /// File name prefix for recording sinks
    pub recording_file_prefix: String,

    /// File extension for recording sinks
    pub recording_file_extension: String,

    /// Call-log polling interval in milliseconds
    pub call_log_interval_ms: u64,

    /// Message polling interval in milliseconds
    pub messages_interval_ms: u64,

    /// Pause after a transient location error, in milliseconds
    pub location_retry_backoff_ms: u64,

    /// Capacity of the recording event broadcast channel
    pub event_buffer_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
            recording_file_prefix: "CallRecording".to_string(),
            recording_file_extension: "3gp".to_string(),
            call_log_interval_ms: 10_000,
            messages_interval_ms: 10_000,
            location_retry_backoff_ms: 1_000,
            event_buffer_capacity: 64,
        }
    }
}

impl AgentConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> AgentResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: AgentConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!("Loaded agent config from {:?}", path);

        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> AgentResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.call_log_interval_ms == 0 {
            return Err(AgentError::Config("callLogIntervalMs must be positive".to_string()));
        }
        if self.messages_interval_ms == 0 {
            return Err(AgentError::Config("messagesIntervalMs must be positive".to_string()));
        }
        if self.recording_file_prefix.trim().is_empty() {
            return Err(AgentError::Config("recordingFilePrefix is empty".to_string()));
        }
        if self.recording_file_extension.trim().is_empty() {
            return Err(AgentError::Config("recordingFileExtension is empty".to_string()));
        }
        if self.event_buffer_capacity == 0 {
            return Err(AgentError::Config("eventBufferCapacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn call_log_interval(&self) -> Duration {
        Duration::from_millis(self.call_log_interval_ms)
    }

    pub fn messages_interval(&self) -> Duration {
        Duration::from_millis(self.messages_interval_ms)
    }

    pub fn location_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.location_retry_backoff_ms)
    }
}
