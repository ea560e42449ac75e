//! Capability gate
//!
//! Answers "is capability C currently authorized?". Grants can be revoked from
//! outside the agent at any moment, so callers query the gate at every
//! decision point instead of caching the answer.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A revocable permission guarding a data source or device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Receive call-state changes
    PhoneState,
    /// Use the microphone for recording
    RecordAudio,
    CallLog,
    Messages,
    /// Fine or coarse location
    Location,
    PhoneNumbers,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::PhoneState,
        Capability::RecordAudio,
        Capability::CallLog,
        Capability::Messages,
        Capability::Location,
        Capability::PhoneNumbers,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::PhoneState => "phone-state",
            Capability::RecordAudio => "record-audio",
            Capability::CallLog => "call-log",
            Capability::Messages => "messages",
            Capability::Location => "location",
            Capability::PhoneNumbers => "phone-numbers",
        };
        f.write_str(name)
    }
}

/// Host-backed permission query
pub trait CapabilityGate: Send + Sync {
    fn is_granted(&self, capability: Capability) -> bool;
}

/// Point-in-time snapshot of the granted capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    granted: HashSet<Capability>,
}

impl CapabilitySet {
    /// Query every known capability from the gate
    pub fn query(gate: &dyn CapabilityGate) -> Self {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| gate.is_granted(*c))
            .collect()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}

/// Capability gate whose grants the host updates as permission results arrive
#[derive(Debug, Default)]
pub struct SharedCapabilities {
    granted: RwLock<HashSet<Capability>>,
}

impl SharedCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate with the given capabilities already granted
    pub fn with_granted(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            granted: RwLock::new(capabilities.into_iter().collect()),
        }
    }

    pub fn grant(&self, capability: Capability) {
        if self.granted.write().insert(capability) {
            tracing::info!(%capability, "Capability granted");
        }
    }

    pub fn revoke(&self, capability: Capability) {
        if self.granted.write().remove(&capability) {
            tracing::info!(%capability, "Capability revoked");
        }
    }
}

impl CapabilityGate for SharedCapabilities {
    fn is_granted(&self, capability: Capability) -> bool {
        self.granted.read().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_gate() {
        let gate = SharedCapabilities::with_granted([Capability::CallLog, Capability::Location]);
        let set = CapabilitySet::query(&gate);
        assert!(set.contains(Capability::CallLog));
        assert!(set.contains(Capability::Location));
        assert!(!set.contains(Capability::Messages));
    }

    #[test]
    fn test_revocation_is_seen_immediately() {
        let gate = SharedCapabilities::with_granted([Capability::Messages]);
        let before = CapabilitySet::query(&gate);

        gate.revoke(Capability::Messages);

        assert!(!gate.is_granted(Capability::Messages));
        // Snapshots are not live
        assert!(before.contains(Capability::Messages));
        assert!(CapabilitySet::query(&gate).is_empty());
    }
}
