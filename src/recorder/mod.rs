//! Call recording
//!
//! This module turns call-state events into recording lifecycle actions:
//! - RecordingSessionManager owns the capture device and the session slot
//! - state holds the session record and status types

pub mod manager;
pub mod state;

pub use manager::{RecordingEvent, RecordingSessionManager, SinkSettings};
pub use state::{RecordingOutput, RecordingSession, SessionStatus, TransitionRecord};
