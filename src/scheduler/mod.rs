//! Polling scheduler
//!
//! - FetchJob: interval-driven fetch/publish loop
//! - LocationChaseLoop: completion-driven location loop
//! - Scheduler: owns both kinds and their lifecycle

pub mod fetch_job;
pub mod location;
pub mod registry;

pub use fetch_job::{FetchJob, FetchJobSpec, JobExit, JobKind, JobSchedule};
pub use location::{LocationChaseLoop, LocationStatus, LoopExit};
pub use registry::Scheduler;
