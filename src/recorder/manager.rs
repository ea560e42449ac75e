//! Recording session manager
//!
//! Maps call-state events onto capture-device operations. Events are handled
//! strictly one at a time (`&mut self`), so a `start` can never overlap a
//! `stop` that is still running.

use super::state::{RecordingOutput, RecordingSession, SessionStatus, TransitionRecord};
use crate::capability::{Capability, CapabilityGate};
use crate::capture::{sink_path, CaptureDevice, CaptureError};
use crate::config::AgentConfig;
use crate::events::CallState;
use crate::utils::error::AgentError;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the session manager
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started writing to `sink`
    Started { sink: PathBuf },
    /// Recording stopped
    Stopped(RecordingOutput),
    /// A start or stop failed
    Error(String),
    /// A call-state event was processed
    Transition(TransitionRecord),
}

/// Where recording sinks are written
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl From<&AgentConfig> for SinkSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            dir: config.recordings_dir.clone(),
            prefix: config.recording_file_prefix.clone(),
            extension: config.recording_file_extension.clone(),
        }
    }
}

/// Owns the capture device and the single recording session slot
pub struct RecordingSessionManager {
    device: Box<dyn CaptureDevice>,
    gate: Arc<dyn CapabilityGate>,
    sinks: SinkSettings,

    /// Shared so observers can read it while an event is being processed
    status: Arc<RwLock<SessionStatus>>,

    session: Option<RecordingSession>,

    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSessionManager {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        gate: Arc<dyn CapabilityGate>,
        sinks: SinkSettings,
        event_capacity: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));
        Self {
            device,
            gate,
            sinks,
            status: Arc::new(RwLock::new(SessionStatus::None)),
            session: None,
            event_tx,
        }
    }

    /// Get the current session status
    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    /// Shared view of the status for observers outside the event queue
    pub fn status_handle(&self) -> Arc<RwLock<SessionStatus>> {
        self.status.clone()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Apply one call-state event and return the resulting status
    pub async fn on_call_state_changed(&mut self, state: CallState) -> SessionStatus {
        let from = self.status();
        if from == SessionStatus::Stopping {
            self.complete_abandoned_stop().await;
        }

        match (self.status(), state) {
            (SessionStatus::None, CallState::Offhook) => self.begin().await,
            (SessionStatus::Active, CallState::Idle) => {
                self.finish().await;
            }
            (SessionStatus::Active, CallState::Offhook) => {
                tracing::debug!("Already recording");
            }
            (SessionStatus::Active, CallState::Ringing) => {
                tracing::debug!("Call waiting while recording");
            }
            (SessionStatus::None | SessionStatus::Stopping, _) => {}
        }

        let record = TransitionRecord {
            at: Utc::now(),
            from,
            event: state,
            to: self.status(),
        };
        tracing::info!(
            at = %record.at,
            from = ?record.from,
            event = %record.event,
            to = ?record.to,
            "Call state processed"
        );
        let _ = self.event_tx.send(RecordingEvent::Transition(record));

        record.to
    }

    /// Stop any active recording. Returns the output if one was stopped.
    pub async fn force_stop(&mut self) -> Option<RecordingOutput> {
        if self.session.is_none() {
            *self.status.write() = SessionStatus::None;
            return None;
        }
        tracing::info!("Forcing recording stop");
        self.finish().await
    }

    /// A stop whose future was dropped leaves the status at `Stopping`.
    /// Finish it, or reset the slot if the session was already released.
    async fn complete_abandoned_stop(&mut self) {
        tracing::warn!("Previous stop was interrupted, completing it");
        if self.finish().await.is_none() {
            *self.status.write() = SessionStatus::None;
        }
    }

    async fn begin(&mut self) {
        if !self.gate.is_granted(Capability::RecordAudio) {
            let denied = AgentError::PermissionDenied(Capability::RecordAudio.to_string());
            self.report(denied.to_string());
            return;
        }

        let started_at = Utc::now();
        let sink = sink_path(
            &self.sinks.dir,
            &self.sinks.prefix,
            &self.sinks.extension,
            started_at,
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.sinks.dir).await {
            self.report(format!("Error preparing {:?}: {}", self.sinks.dir, e));
            return;
        }

        let handle = match self.device.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                self.report(format!("Error acquiring {}: {}", self.device.id(), e));
                return;
            }
        };

        if let Err(e) = self.device.start(&handle, &sink).await {
            // Scoped acquisition: a failed start must still give the device back
            if let Err(release_err) = self.device.release(handle).await {
                tracing::warn!(error = %release_err, "Release after failed start also failed");
            }
            self.report(format!("Error starting recording: {}", e));
            return;
        }

        tracing::info!(sink = %sink.display(), "Recording started");
        self.session = Some(RecordingSession::new(handle, sink.clone(), started_at));
        *self.status.write() = SessionStatus::Active;
        let _ = self.event_tx.send(RecordingEvent::Started { sink });
    }

    /// Stop and release the session. It stays in its slot until `stop`
    /// returns, so an interrupted stop can be completed later.
    async fn finish(&mut self) -> Option<RecordingOutput> {
        let active = self.session.as_ref()?;
        *self.status.write() = SessionStatus::Stopping;

        let duration_ms = active.elapsed_ms();
        let stop_result = self.device.stop(&active.handle).await;
        let clean_stop = stop_result.is_ok();
        if let Err(e) = stop_result {
            self.report_stop_failure(&e);
        }

        let session = self.session.take()?;
        if let Err(e) = self.device.release(session.handle).await {
            tracing::warn!(error = %e, "Error releasing capture device");
        }

        *self.status.write() = SessionStatus::None;

        let output = RecordingOutput {
            sink: session.sink.to_string_lossy().to_string(),
            started_at: session.started_at,
            duration_ms,
            clean_stop,
        };
        tracing::info!(sink = %output.sink, duration_ms, "Recording stopped");
        let _ = self.event_tx.send(RecordingEvent::Stopped(output.clone()));

        Some(output)
    }

    fn report_stop_failure(&self, error: &CaptureError) {
        self.report(format!("Error stopping recording: {}", error));
    }

    fn report(&self, message: String) {
        tracing::error!("{}", message);
        let _ = self.event_tx.send(RecordingEvent::Error(message));
    }
}
