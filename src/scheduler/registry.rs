//! Job scheduler
//!
//! Owns one fetch job per registered kind plus the location chase loop.

use super::fetch_job::{FetchJob, FetchJobSpec, JobKind};
use super::location::{LocationChaseLoop, LocationStatus};
use crate::capability::{Capability, CapabilitySet, CapabilityGate};
use crate::providers::{Fetcher, LocationProvider};
use crate::publish::PublishSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type SpawnFn = Box<dyn Fn(Arc<dyn CapabilityGate>) -> FetchJob + Send + Sync>;

struct JobRegistration {
    spec: FetchJobSpec,
    spawn: SpawnFn,
}

struct LocationRegistration {
    provider: Arc<dyn LocationProvider>,
    sink: Arc<dyn PublishSink<LocationStatus>>,
    retry_backoff: Duration,
}

/// Starts and stops the polling jobs
pub struct Scheduler {
    gate: Arc<dyn CapabilityGate>,
    registrations: Vec<JobRegistration>,
    location: Option<LocationRegistration>,
    jobs: HashMap<JobKind, FetchJob>,
    location_loop: Option<LocationChaseLoop>,
}

impl Scheduler {
    pub fn new(gate: Arc<dyn CapabilityGate>) -> Self {
        Self {
            gate,
            registrations: Vec::new(),
            location: None,
            jobs: HashMap::new(),
            location_loop: None,
        }
    }

    /// Register a job kind. A later registration for the same kind replaces
    /// the earlier one from the next `start_all` on.
    pub fn register_job<T: Send + 'static>(
        &mut self,
        spec: FetchJobSpec,
        fetcher: Arc<dyn Fetcher<T>>,
        sink: Arc<dyn PublishSink<T>>,
    ) {
        tracing::info!(kind = %spec.kind, capability = %spec.capability, "Registering job");
        let spawn: SpawnFn = Box::new(move |gate: Arc<dyn CapabilityGate>| {
            FetchJob::spawn(spec, gate, fetcher.clone(), sink.clone())
        });
        self.registrations.retain(|r| r.spec.kind != spec.kind);
        self.registrations.push(JobRegistration { spec, spawn });
    }

    pub fn register_location(
        &mut self,
        provider: Arc<dyn LocationProvider>,
        sink: Arc<dyn PublishSink<LocationStatus>>,
        retry_backoff: Duration,
    ) {
        tracing::info!("Registering location loop");
        self.location = Some(LocationRegistration {
            provider,
            sink,
            retry_backoff,
        });
    }

    /// Start every registered job whose capability is in `capabilities`.
    ///
    /// Jobs that are already live are left alone, so repeated calls never
    /// create duplicates. A `Once` job that finished its fetch is not run
    /// again until `stop_all` ends the cycle. Returns how many jobs were started.
    pub fn start_all(&mut self, capabilities: &CapabilitySet) -> usize {
        let mut started = 0;

        for registration in &self.registrations {
            let kind = registration.spec.kind;
            if let Some(job) = self.jobs.get(&kind) {
                if job.is_live() {
                    tracing::debug!(%kind, "Job already running");
                    continue;
                }
                if job.has_completed() {
                    tracing::debug!(%kind, "Job already completed this cycle");
                    continue;
                }
            }
            let capability = registration.spec.capability;
            if !capabilities.contains(capability) {
                tracing::info!(%kind, %capability, "Capability not granted, job not started");
                continue;
            }

            let job = (registration.spawn)(self.gate.clone());
            if let Some(previous) = self.jobs.insert(kind, job) {
                previous.cancel();
            }
            started += 1;
        }

        if let Some(location) = &self.location {
            let running = self
                .location_loop
                .as_ref()
                .is_some_and(LocationChaseLoop::is_live);
            if running {
                tracing::debug!("Location loop already running");
            } else if capabilities.contains(Capability::Location) {
                let chase = LocationChaseLoop::spawn(
                    self.gate.clone(),
                    location.provider.clone(),
                    location.sink.clone(),
                    location.retry_backoff,
                );
                if let Some(previous) = self.location_loop.replace(chase) {
                    previous.cancel();
                }
                started += 1;
            } else {
                tracing::info!("Location not granted, loop not started");
            }
        }

        tracing::info!(started, "Scheduler started jobs");
        started
    }

    /// Cancel every job and wait until each has observed the cancellation.
    ///
    /// No fetch or location request is issued after this returns.
    pub async fn stop_all(&mut self) {
        let jobs: Vec<FetchJob> = self.jobs.drain().map(|(_, job)| job).collect();
        let chase = self.location_loop.take();

        for job in &jobs {
            job.cancel();
        }
        if let Some(chase) = &chase {
            chase.cancel();
        }

        for job in jobs {
            let kind = job.kind();
            let exit = job.stop().await;
            tracing::debug!(%kind, ?exit, "Job stopped");
        }
        if let Some(chase) = chase {
            let exit = chase.stop().await;
            tracing::debug!(?exit, "Location loop stopped");
        }

        tracing::info!("Scheduler stopped");
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.jobs.get(&kind).is_some_and(FetchJob::is_live)
    }

    pub fn is_location_running(&self) -> bool {
        self.location_loop
            .as_ref()
            .is_some_and(LocationChaseLoop::is_live)
    }

    /// Kinds with a live job
    pub fn live_jobs(&self) -> Vec<JobKind> {
        let mut kinds: Vec<JobKind> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.is_live())
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort_by_key(|kind| kind.to_string());
        kinds
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for job in self.jobs.values() {
            job.cancel();
        }
        if let Some(chase) = &self.location_loop {
            chase.cancel();
        }
    }
}
