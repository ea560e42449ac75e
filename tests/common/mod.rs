//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use capture_agent::capability::{Capability, SharedCapabilities};
use capture_agent::capture::{CaptureDevice, CaptureError, CaptureHandle, CaptureResult};
use capture_agent::events::ChannelEventSource;
use capture_agent::providers::{Fetcher, LocationFix, LocationProvider, ProviderResult};
use capture_agent::radio::MemoryStampStore;
use capture_agent::recorder::RecordingEvent;
use capture_agent::{AgentConfig, Collaborators, Orchestrator};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Acquire,
    Start(PathBuf),
    StopBegin,
    StopEnd,
    Release,
}

#[derive(Default)]
pub struct DeviceState {
    pub calls: Vec<DeviceCall>,
    pub recording: bool,
    pub acquired: usize,
    pub busy_starts: usize,
}

/// Capture device that records every call made on it
pub struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
    stop_delay: Duration,
}

impl FakeDevice {
    pub fn new() -> (Self, Arc<Mutex<DeviceState>>) {
        Self::with_stop_delay(Duration::ZERO)
    }

    pub fn with_stop_delay(stop_delay: Duration) -> (Self, Arc<Mutex<DeviceState>>) {
        let state = Arc::new(Mutex::new(DeviceState::default()));
        (
            Self {
                state: state.clone(),
                stop_delay,
            },
            state,
        )
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    fn id(&self) -> &str {
        "fake-microphone"
    }

    async fn acquire(&mut self) -> CaptureResult<CaptureHandle> {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Acquire);
        assert_eq!(state.acquired, 0, "device acquired twice");
        state.acquired += 1;
        Ok(CaptureHandle::new())
    }

    async fn start(&mut self, _handle: &CaptureHandle, sink: &Path) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Start(sink.to_path_buf()));
        if state.busy_starts > 0 {
            state.busy_starts -= 1;
            return Err(CaptureError::DeviceBusy);
        }
        state.recording = true;
        Ok(())
    }

    async fn stop(&mut self, _handle: &CaptureHandle) -> CaptureResult<()> {
        self.state.lock().calls.push(DeviceCall::StopBegin);
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        let mut state = self.state.lock();
        state.recording = false;
        state.calls.push(DeviceCall::StopEnd);
        Ok(())
    }

    async fn release(&mut self, _handle: CaptureHandle) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Release);
        state.acquired -= 1;
        Ok(())
    }
}

/// Fetcher that returns a fixed value and counts calls
pub struct CountingFetcher<T> {
    value: T,
    calls: AtomicUsize,
}

impl<T> CountingFetcher<T> {
    pub fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Fetcher<T> for CountingFetcher<T> {
    async fn fetch(&self) -> ProviderResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// Location provider that answers each request after a fixed delay
pub struct SteadyLocation {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    served: AtomicUsize,
}

impl SteadyLocation {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            served: AtomicUsize::new(0),
        })
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for SteadyLocation {
    fn is_provider_enabled(&self) -> bool {
        true
    }

    async fn request_single_update(&self) -> ProviderResult<LocationFix> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let n = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LocationFix {
            latitude: n as f64,
            longitude: 0.0,
            recorded_at: Utc::now(),
        })
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub gate: Arc<SharedCapabilities>,
    pub source: Arc<ChannelEventSource>,
    pub device: Arc<Mutex<DeviceState>>,
    pub stamps: Arc<MemoryStampStore>,
}

pub fn harness(
    config: AgentConfig,
    device: FakeDevice,
    device_state: Arc<Mutex<DeviceState>>,
) -> Harness {
    let gate = Arc::new(SharedCapabilities::with_granted(Capability::ALL));
    let source = Arc::new(ChannelEventSource::new());
    let stamps = Arc::new(MemoryStampStore::new());
    let orchestrator = Orchestrator::new(
        config,
        Collaborators {
            gate: gate.clone(),
            events: source.clone(),
            capture: Box::new(device),
            radio_store: stamps.clone(),
        },
    );
    Harness {
        orchestrator,
        gate,
        source,
        device: device_state,
        stamps,
    }
}

pub fn config_in(dir: &Path) -> AgentConfig {
    AgentConfig {
        recordings_dir: dir.join("recordings"),
        ..AgentConfig::default()
    }
}

/// Wait until `count` call-state events have been processed
pub async fn wait_for_transitions(rx: &mut broadcast::Receiver<RecordingEvent>, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut seen = 0;
        while seen < count {
            match rx.recv().await {
                Ok(RecordingEvent::Transition(_)) => seen += 1,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("recording events closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for call-state transitions");
}
