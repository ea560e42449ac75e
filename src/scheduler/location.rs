//! Location chase loop
//!
//! Completion-driven polling: one single-shot location request is outstanding
//! at a time, and the next one is only issued after the previous one resolved.
//! Provider-disabled and permission-denied are terminal.

use crate::capability::{Capability, CapabilityGate};
use crate::providers::{ErrorKind, LocationFix, LocationProvider};
use crate::publish::PublishSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Status string published by the chase loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LocationStatus {
    Fix(LocationFix),
    ProviderDisabled,
    PermissionDenied,
}

impl LocationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LocationStatus::Fix(_))
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationStatus::Fix(fix) => fmt::Display::fmt(fix, f),
            LocationStatus::ProviderDisabled => f.write_str("GPS is not enabled."),
            LocationStatus::PermissionDenied => f.write_str("Permission denied"),
        }
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    ProviderDisabled,
    PermissionDenied,
    Aborted,
}

/// Request bookkeeping shared between the loop task and its owner
#[derive(Debug, Default)]
struct RequestState {
    outstanding: AtomicBool,
    issued: AtomicU64,
}

/// A running location chase loop.
///
/// [`cancel`](Self::cancel) only signals, like [`FetchJob::cancel`]. A request
/// already resolving on another worker may still be published before the task
/// sees it. [`stop`](Self::stop) waits for the task, after which nothing is
/// requested or published.
///
/// [`FetchJob::cancel`]: super::FetchJob::cancel
pub struct LocationChaseLoop {
    token: CancellationToken,
    requests: Arc<RequestState>,
    task: JoinHandle<LoopExit>,
}

impl LocationChaseLoop {
    /// Start chasing fixes. `retry_backoff` is the pause after a transient error.
    pub fn spawn(
        gate: Arc<dyn CapabilityGate>,
        provider: Arc<dyn LocationProvider>,
        sink: Arc<dyn PublishSink<LocationStatus>>,
        retry_backoff: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let requests = Arc::new(RequestState::default());
        let task = tokio::spawn(chase(
            gate,
            provider,
            sink,
            retry_backoff,
            requests.clone(),
            token.clone(),
        ));
        Self {
            token,
            requests,
            task,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    /// Whether a location request is currently waiting on the provider
    pub fn is_request_outstanding(&self) -> bool {
        self.requests.outstanding.load(Ordering::SeqCst)
    }

    /// Total requests issued so far
    pub fn requests_issued(&self) -> u64 {
        self.requests.issued.load(Ordering::SeqCst)
    }

    /// Cancel and wait for the loop to finish
    pub async fn stop(self) -> LoopExit {
        self.token.cancel();
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!(error = %e, "Location loop task failed");
                LoopExit::Aborted
            }
        }
    }
}

async fn chase(
    gate: Arc<dyn CapabilityGate>,
    provider: Arc<dyn LocationProvider>,
    sink: Arc<dyn PublishSink<LocationStatus>>,
    retry_backoff: Duration,
    requests: Arc<RequestState>,
    token: CancellationToken,
) -> LoopExit {
    loop {
        if token.is_cancelled() {
            return LoopExit::Cancelled;
        }

        let gps_enabled = provider.is_provider_enabled();
        tracing::debug!(gps_enabled, "Requesting location");
        if !gps_enabled {
            sink.publish(LocationStatus::ProviderDisabled);
            tracing::info!("GPS is not enabled, location loop halting");
            return LoopExit::ProviderDisabled;
        }
        if !gate.is_granted(Capability::Location) {
            sink.publish(LocationStatus::PermissionDenied);
            tracing::info!("Location permission denied, loop halting");
            return LoopExit::PermissionDenied;
        }

        if requests.outstanding.swap(true, Ordering::SeqCst) {
            // The loop is the only issuer, so this cannot happen
            tracing::error!("Location request already outstanding");
            return LoopExit::Aborted;
        }
        requests.issued.fetch_add(1, Ordering::SeqCst);

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                requests.outstanding.store(false, Ordering::SeqCst);
                return LoopExit::Cancelled;
            }
            result = provider.request_single_update() => result,
        };
        requests.outstanding.store(false, Ordering::SeqCst);

        // A fix that lands after cancellation is dropped
        if token.is_cancelled() {
            return LoopExit::Cancelled;
        }

        match result {
            Ok(fix) => {
                tracing::debug!(
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    "Location updated"
                );
                sink.publish(LocationStatus::Fix(fix));
            }
            Err(e) => match e.kind() {
                ErrorKind::ProviderUnavailable => {
                    sink.publish(LocationStatus::ProviderDisabled);
                    tracing::info!(error = %e, "Location provider disabled, loop halting");
                    return LoopExit::ProviderDisabled;
                }
                ErrorKind::PermissionDenied => {
                    sink.publish(LocationStatus::PermissionDenied);
                    tracing::info!(error = %e, "Location permission denied, loop halting");
                    return LoopExit::PermissionDenied;
                }
                ErrorKind::TransientIo => {
                    sink.publish_error(&e);
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return LoopExit::Cancelled,
                        _ = tokio::time::sleep(retry_backoff) => {}
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SharedCapabilities;
    use crate::providers::{ProviderError, ProviderResult};
    use crate::publish::LatestSink;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Provider that resolves each request after a delay, tracking overlap
    struct FakeLocation {
        enabled: AtomicBool,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        served: AtomicUsize,
        script: Mutex<VecDeque<ProviderResult<LocationFix>>>,
    }

    impl FakeLocation {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                enabled: AtomicBool::new(true),
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                served: AtomicUsize::new(0),
                script: Mutex::new(VecDeque::new()),
            })
        }
    }

    #[async_trait]
    impl LocationProvider for FakeLocation {
        fn is_provider_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }

        async fn request_single_update(&self) -> ProviderResult<LocationFix> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let n = self.served.fetch_add(1, Ordering::SeqCst) + 1;
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(LocationFix {
                    latitude: n as f64,
                    longitude: 0.0,
                    recorded_at: Utc::now(),
                })
            })
        }
    }

    fn location_gate() -> Arc<SharedCapabilities> {
        Arc::new(SharedCapabilities::with_granted([Capability::Location]))
    }

    fn spawn_loop(
        gate: Arc<SharedCapabilities>,
        provider: &Arc<FakeLocation>,
        sink: &Arc<LatestSink<LocationStatus>>,
    ) -> LocationChaseLoop {
        LocationChaseLoop::spawn(gate, provider.clone(), sink.clone(), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_never_overlap() {
        let provider = FakeLocation::new(Duration::from_millis(700));
        let sink = Arc::new(LatestSink::new("location"));
        let chase = spawn_loop(location_gate(), &provider, &sink);

        tokio::time::sleep(Duration::from_millis(7_350)).await;

        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(provider.served.load(Ordering::SeqCst), 10);
        assert_eq!(chase.requests_issued(), 11);
        assert!(chase.is_request_outstanding());
        assert_eq!(
            sink.latest().map(|s| s.to_string()),
            Some("Latitude: 10, Longitude: 0".to_string())
        );

        assert_eq!(chase.stop().await, LoopExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gps_disabled_is_terminal() {
        let provider = FakeLocation::new(Duration::from_millis(100));
        provider.enabled.store(false, Ordering::SeqCst);
        let sink = Arc::new(LatestSink::new("location"));
        let chase = spawn_loop(location_gate(), &provider, &sink);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(sink.latest(), Some(LocationStatus::ProviderDisabled));
        assert_eq!(chase.requests_issued(), 0);
        assert!(!chase.is_live());
        assert_eq!(chase.stop().await, LoopExit::ProviderDisabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_terminal() {
        let provider = FakeLocation::new(Duration::from_millis(100));
        let sink = Arc::new(LatestSink::new("location"));
        let chase = spawn_loop(Arc::new(SharedCapabilities::new()), &provider, &sink);

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(sink.latest().map(|s| s.to_string()), Some("Permission denied".to_string()));
        assert_eq!(chase.stop().await, LoopExit::PermissionDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_disabled_mid_loop() {
        let provider = FakeLocation::new(Duration::from_millis(100));
        provider
            .script
            .lock()
            .extend([
                Err(ProviderError::Transient("no fix".into())),
                Err(ProviderError::ProviderUnavailable("gps switched off".into())),
            ]);
        let sink = Arc::new(LatestSink::new("location"));
        let chase = spawn_loop(location_gate(), &provider, &sink);

        tokio::time::sleep(Duration::from_secs(30)).await;

        // transient error, backoff, then terminal
        assert_eq!(chase.requests_issued(), 2);
        assert_eq!(sink.latest(), Some(LocationStatus::ProviderDisabled));
        assert_eq!(chase.stop().await, LoopExit::ProviderDisabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_nothing_published_once_stop_returns() {
        for _ in 0..20 {
            let provider = FakeLocation::new(Duration::from_millis(1));
            let sink = Arc::new(LatestSink::new("location"));
            let chase = spawn_loop(location_gate(), &provider, &sink);

            tokio::time::sleep(Duration::from_millis(5)).await;
            chase.cancel();
            assert_eq!(chase.stop().await, LoopExit::Cancelled);
            let published = sink.publish_count();
            let served = provider.served.load(Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(sink.publish_count(), published);
            assert_eq!(provider.served.load(Ordering::SeqCst), served);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_request() {
        let provider = FakeLocation::new(Duration::from_secs(60));
        let sink = Arc::new(LatestSink::new("location"));
        let chase = spawn_loop(location_gate(), &provider, &sink);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(chase.is_request_outstanding());

        assert_eq!(chase.stop().await, LoopExit::Cancelled);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(sink.publish_count(), 0);
        assert_eq!(provider.served.load(Ordering::SeqCst), 0);
    }
}
