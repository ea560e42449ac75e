//! Self-rescheduling fetch job
//!
//! fetch -> publish -> sleep(interval) -> repeat. The interval is measured from
//! the end of a fetch, so a slow provider never causes catch-up bursts.

use crate::capability::{Capability, CapabilityGate};
use crate::providers::{ErrorKind, Fetcher};
use crate::publish::PublishSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity of a registered job; at most one live job per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    CallLog,
    Messages,
    PhoneNumbers,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::CallLog => "call-log",
            JobKind::Messages => "messages",
            JobKind::PhoneNumbers => "phone-numbers",
        };
        f.write_str(name)
    }
}

/// When a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Repeat, pausing this long after each fetch completes
    Every(Duration),
    /// Fetch once, then finish
    Once,
}

/// Static description of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchJobSpec {
    pub kind: JobKind,
    pub capability: Capability,
    pub schedule: JobSchedule,
}

impl FetchJobSpec {
    pub fn every(kind: JobKind, capability: Capability, interval: Duration) -> Self {
        Self {
            kind,
            capability,
            schedule: JobSchedule::Every(interval),
        }
    }

    pub fn once(kind: JobKind, capability: Capability) -> Self {
        Self {
            kind,
            capability,
            schedule: JobSchedule::Once,
        }
    }
}

/// Why a job's task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
    Cancelled,
    /// The capability was gone at a check point
    CapabilityRevoked,
    /// The provider itself reported permission denied
    PermissionDenied,
    /// A `Once` job finished its fetch
    Completed,
    /// The task panicked
    Aborted,
}

/// A running fetch job.
///
/// [`cancel`](Self::cancel) only signals: on a multi-threaded runtime a fetch
/// that is already being polled can still finish after it returns. Callers
/// that need "no fetch after this point" use [`stop`](Self::stop), which also
/// waits for the task to exit.
pub struct FetchJob {
    kind: JobKind,
    token: CancellationToken,
    completed: Arc<AtomicBool>,
    task: JoinHandle<JobExit>,
}

impl FetchJob {
    /// Start the job. The first fetch is attempted immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Send + 'static>(
        spec: FetchJobSpec,
        gate: Arc<dyn CapabilityGate>,
        fetcher: Arc<dyn Fetcher<T>>,
        sink: Arc<dyn PublishSink<T>>,
    ) -> Self {
        let token = CancellationToken::new();
        let completed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn({
            let token = token.clone();
            let completed = completed.clone();
            async move {
                let exit = run(spec, gate, fetcher, sink, token).await;
                if exit == JobExit::Completed {
                    completed.store(true, Ordering::SeqCst);
                }
                exit
            }
        });
        tracing::debug!(kind = %spec.kind, schedule = ?spec.schedule, "Fetch job spawned");
        Self {
            kind: spec.kind,
            token,
            completed,
            task,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Signal cancellation without waiting for the task
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A `Once` job that finished its fetch
    pub fn has_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Still scheduled: neither cancelled nor finished on its own
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    /// Cancel and wait for the task to observe it.
    ///
    /// Once this returns no further fetch can start.
    pub async fn stop(self) -> JobExit {
        self.token.cancel();
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!(kind = %self.kind, error = %e, "Fetch job task failed");
                JobExit::Aborted
            }
        }
    }
}

async fn run<T>(
    spec: FetchJobSpec,
    gate: Arc<dyn CapabilityGate>,
    fetcher: Arc<dyn Fetcher<T>>,
    sink: Arc<dyn PublishSink<T>>,
    token: CancellationToken,
) -> JobExit {
    let kind = spec.kind;

    loop {
        if token.is_cancelled() {
            return JobExit::Cancelled;
        }
        if !gate.is_granted(spec.capability) {
            let capability = spec.capability;
            tracing::info!(%kind, %capability, "Capability revoked, job stopping");
            return JobExit::CapabilityRevoked;
        }

        // biased: a cancellation that is already visible wins over starting the fetch
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return JobExit::Cancelled,
            result = fetcher.fetch() => result,
        };

        // A result that lands after cancellation is dropped
        if token.is_cancelled() {
            return JobExit::Cancelled;
        }

        match result {
            Ok(value) => sink.publish(value),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                sink.publish_error(&e);
                tracing::info!(%kind, "Provider denied access, job stopping");
                return JobExit::PermissionDenied;
            }
            Err(e) => sink.publish_error(&e),
        }

        let interval = match spec.schedule {
            JobSchedule::Every(interval) => interval,
            JobSchedule::Once => return JobExit::Completed,
        };

        if !gate.is_granted(spec.capability) {
            let capability = spec.capability;
            tracing::info!(%kind, %capability, "Capability revoked, job stopping");
            return JobExit::CapabilityRevoked;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return JobExit::Cancelled,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
