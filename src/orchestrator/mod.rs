//! Agent orchestrator
//!
//! Root of the agent. Wires the host event stream into the recording session
//! manager and owns the scheduler. `initialize` and `shutdown` are the only
//! lifecycle entry points, each called exactly once.

use crate::capability::{Capability, CapabilityGate, CapabilitySet};
use crate::capture::CaptureDevice;
use crate::config::AgentConfig;
use crate::events::{EventSource, HostEvent, HostEventKind};
use crate::providers::{
    CallLogEntry, Fetcher, LocationProvider, MessageLogEntry, PhoneNumberEntry,
};
use crate::publish::PublishSink;
use crate::radio::{self, RadioStampStore};
use crate::recorder::{
    RecordingEvent, RecordingOutput, RecordingSessionManager, SessionStatus, SinkSettings,
};
use crate::scheduler::{FetchJobSpec, JobKind, LocationStatus, Scheduler};
use crate::utils::error::AgentResult;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Host-provided collaborators
pub struct Collaborators {
    pub gate: Arc<dyn CapabilityGate>,
    pub events: Arc<dyn EventSource>,
    pub capture: Box<dyn CaptureDevice>,
    pub radio_store: Arc<dyn RadioStampStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    ShutDown,
}

struct EventPump {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the agent's components for the lifetime of the process
pub struct Orchestrator {
    config: AgentConfig,
    gate: Arc<dyn CapabilityGate>,
    events: Arc<dyn EventSource>,
    radio_store: Arc<dyn RadioStampStore>,
    manager: Arc<Mutex<RecordingSessionManager>>,
    status: Arc<RwLock<SessionStatus>>,
    scheduler: Scheduler,
    pump: Option<EventPump>,
    lifecycle: Lifecycle,
}

impl Orchestrator {
    pub fn new(config: AgentConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            gate,
            events,
            capture,
            radio_store,
        } = collaborators;

        let manager = RecordingSessionManager::new(
            capture,
            gate.clone(),
            SinkSettings::from(&config),
            config.event_buffer_capacity,
        );
        let status = manager.status_handle();

        Self {
            scheduler: Scheduler::new(gate.clone()),
            config,
            gate,
            events,
            radio_store,
            manager: Arc::new(Mutex::new(manager)),
            status,
            pump: None,
            lifecycle: Lifecycle::Created,
        }
    }

    /// Poll the call log every `callLogIntervalMs`
    pub fn register_call_log(
        &mut self,
        fetcher: Arc<dyn Fetcher<Vec<CallLogEntry>>>,
        sink: Arc<dyn PublishSink<Vec<CallLogEntry>>>,
    ) {
        let spec = FetchJobSpec::every(
            JobKind::CallLog,
            Capability::CallLog,
            self.config.call_log_interval(),
        );
        self.scheduler.register_job(spec, fetcher, sink);
    }

    /// Poll stored messages every `messagesIntervalMs`
    pub fn register_messages(
        &mut self,
        fetcher: Arc<dyn Fetcher<Vec<MessageLogEntry>>>,
        sink: Arc<dyn PublishSink<Vec<MessageLogEntry>>>,
    ) {
        let spec = FetchJobSpec::every(
            JobKind::Messages,
            Capability::Messages,
            self.config.messages_interval(),
        );
        self.scheduler.register_job(spec, fetcher, sink);
    }

    /// Read the phone-number registry once per start
    pub fn register_phone_numbers(
        &mut self,
        fetcher: Arc<dyn Fetcher<Vec<PhoneNumberEntry>>>,
        sink: Arc<dyn PublishSink<Vec<PhoneNumberEntry>>>,
    ) {
        let spec = FetchJobSpec::once(JobKind::PhoneNumbers, Capability::PhoneNumbers);
        self.scheduler.register_job(spec, fetcher, sink);
    }

    pub fn register_location(
        &mut self,
        provider: Arc<dyn LocationProvider>,
        sink: Arc<dyn PublishSink<LocationStatus>>,
    ) {
        let backoff = self.config.location_retry_backoff();
        self.scheduler.register_location(provider, sink, backoff);
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current recording status, readable while an event is being processed
    pub fn recording_status(&self) -> SessionStatus {
        *self.status.read()
    }

    /// Recording events from the session manager
    pub async fn subscribe_recording(&self) -> broadcast::Receiver<RecordingEvent> {
        self.manager.lock().await.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Subscribe to host events and start every permitted job.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn initialize(&mut self) -> AgentResult<()> {
        assert_eq!(
            self.lifecycle,
            Lifecycle::Created,
            "Orchestrator::initialize called more than once"
        );

        tracing::info!("Initializing capture agent v{}", env!("CARGO_PKG_VERSION"));

        let rx = self.events.subscribe()?;
        let token = CancellationToken::new();
        let task = tokio::spawn(pump_events(
            rx,
            self.manager.clone(),
            self.gate.clone(),
            self.radio_store.clone(),
            token.clone(),
        ));
        self.pump = Some(EventPump { token, task });

        let granted = CapabilitySet::query(self.gate.as_ref());
        if granted.is_empty() {
            tracing::warn!("No capabilities granted, call events ignored and no jobs started");
        } else if !granted.contains(Capability::PhoneState) {
            tracing::warn!("Phone state not granted, call events ignored until it is");
        }
        self.scheduler.start_all(&granted);

        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Start jobs whose capability was granted after `initialize`
    pub fn refresh_jobs(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }
        let granted = CapabilitySet::query(self.gate.as_ref());
        self.scheduler.start_all(&granted)
    }

    /// Tear the agent down: unsubscribe, stop recording, then stop all jobs.
    ///
    /// # Panics
    ///
    /// Panics unless the orchestrator is running.
    pub async fn shutdown(&mut self) -> Option<RecordingOutput> {
        assert_eq!(
            self.lifecycle,
            Lifecycle::Running,
            "Orchestrator::shutdown called without a running agent"
        );

        tracing::info!("Shutting down capture agent");

        self.events.unsubscribe();
        if let Some(pump) = self.pump.take() {
            pump.token.cancel();
            if let Err(e) = pump.task.await {
                tracing::error!(error = %e, "Event pump task failed");
            }
        }

        let output = self.manager.lock().await.force_stop().await;

        self.scheduler.stop_all().await;

        self.lifecycle = Lifecycle::ShutDown;
        tracing::info!("Capture agent stopped");
        output
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.token.cancel();
        }
    }
}

/// Drain host events one at a time.
///
/// An event already being processed is finished before cancellation is seen.
async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<HostEvent>,
    manager: Arc<Mutex<RecordingSessionManager>>,
    gate: Arc<dyn CapabilityGate>,
    radio_store: Arc<dyn RadioStampStore>,
    token: CancellationToken,
) {
    let mut last_at = None;

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if let Some(previous) = last_at {
            if event.at < previous {
                tracing::warn!(at = %event.at, %previous, "Host event out of order");
            }
        }
        last_at = Some(event.at);

        match event.kind {
            HostEventKind::CallStateChanged { state } => {
                if !gate.is_granted(Capability::PhoneState) {
                    tracing::debug!(%state, "Phone state not granted, ignoring call event");
                    continue;
                }
                manager.lock().await.on_call_state_changed(state).await;
            }
            HostEventKind::RadioModeChanged {
                airplane_mode_enabled,
            } => {
                radio::on_radio_mode_changed(radio_store.as_ref(), airplane_mode_enabled, event.at);
            }
        }
    }

    tracing::debug!("Event pump stopped");
}
