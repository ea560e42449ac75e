//! Capture Agent - call-state driven recording with permission-gated polling.
//!
//! This is the core of the background capture agent. It maps telephony call
//! state onto the recording lifecycle and runs the call-log, message,
//! phone-number and location polling jobs. Host platforms supply the actual
//! devices and data sources through the traits in [`capture`], [`providers`],
//! [`events`] and [`capability`].

pub mod capability;
pub mod capture;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod providers;
pub mod publish;
pub mod radio;
pub mod recorder;
pub mod scheduler;
pub mod utils;

pub use config::AgentConfig;
pub use orchestrator::{Collaborators, Orchestrator};
pub use utils::error::{AgentError, AgentResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate. Safe to call
/// more than once, later calls are ignored.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Capture agent v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
}
