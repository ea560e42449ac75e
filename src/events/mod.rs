//! Host event source
//!
//! Telephony and radio callbacks can fire on any platform thread. They are
//! funneled into one ordered queue here; the orchestrator drains that queue
//! one event at a time.

use crate::utils::error::{AgentError, AgentResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Telephony call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallState {
    /// No call activity
    Idle,
    /// Incoming call ringing, or call-waiting tone
    Ringing,
    /// A call is connected (dialing, active or on hold)
    Offhook,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "IDLE",
            CallState::Ringing => "RINGING",
            CallState::Offhook => "OFFHOOK",
        };
        f.write_str(name)
    }
}

/// What happened on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEventKind {
    CallStateChanged { state: CallState },
    RadioModeChanged { airplane_mode_enabled: bool },
}

/// A timestamped host event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEvent {
    pub at: DateTime<Utc>,
    pub kind: HostEventKind,
}

impl HostEvent {
    pub fn now(kind: HostEventKind) -> Self {
        Self { at: Utc::now(), kind }
    }

    pub fn call_state(state: CallState) -> Self {
        Self::now(HostEventKind::CallStateChanged { state })
    }

    pub fn radio_mode(airplane_mode_enabled: bool) -> Self {
        Self::now(HostEventKind::RadioModeChanged {
            airplane_mode_enabled,
        })
    }
}

/// Source of host events.
///
/// Implementations must deliver events in non-decreasing timestamp order.
pub trait EventSource: Send + Sync {
    /// Register for events. Only one subscription may be live at a time.
    fn subscribe(&self) -> AgentResult<mpsc::UnboundedReceiver<HostEvent>>;

    /// Drop the subscription. Events emitted afterwards are discarded.
    fn unsubscribe(&self);
}

type SharedSender = Arc<Mutex<Option<mpsc::UnboundedSender<HostEvent>>>>;

/// Event source fed by host callbacks through [`HostEventEmitter`]s
#[derive(Debug, Default)]
pub struct ChannelEventSource {
    sender: SharedSender,
}

impl ChannelEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for platform callbacks to push events through
    pub fn emitter(&self) -> HostEventEmitter {
        HostEventEmitter {
            sender: self.sender.clone(),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().is_some()
    }
}

impl EventSource for ChannelEventSource {
    fn subscribe(&self) -> AgentResult<mpsc::UnboundedReceiver<HostEvent>> {
        let mut slot = self.sender.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(AgentError::EventSource("already subscribed".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        tracing::debug!("Host event subscription registered");
        Ok(rx)
    }

    fn unsubscribe(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!("Host event subscription dropped");
        }
    }
}

/// Cloneable producer side of a [`ChannelEventSource`]
#[derive(Debug, Clone)]
pub struct HostEventEmitter {
    sender: SharedSender,
}

impl HostEventEmitter {
    /// Stamp and enqueue an event. Returns false when nobody is subscribed.
    ///
    /// Stamping happens under the queue lock, so timestamps never go
    /// backwards across concurrent emitters.
    pub fn emit(&self, kind: HostEventKind) -> bool {
        let slot = self.sender.lock();
        match slot.as_ref() {
            Some(tx) => tx.send(HostEvent::now(kind)).is_ok(),
            None => {
                tracing::trace!(?kind, "Dropping host event, no subscriber");
                false
            }
        }
    }

    pub fn call_state(&self, state: CallState) -> bool {
        self.emit(HostEventKind::CallStateChanged { state })
    }

    pub fn radio_mode(&self, airplane_mode_enabled: bool) -> bool {
        self.emit(HostEventKind::RadioModeChanged {
            airplane_mode_enabled,
        })
    }
}
