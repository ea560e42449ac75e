//! Radio (airplane) mode tracking
//!
//! The agent only notices when airplane mode is switched off and hands the
//! timestamp to an external key/value store.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Persistent record of the last time airplane mode was disabled
pub trait RadioStampStore: Send + Sync {
    fn record_airplane_mode_disabled(&self, at: DateTime<Utc>);

    fn last_airplane_mode_disabled(&self) -> Option<DateTime<Utc>>;
}

/// Store that keeps the stamp in memory only
#[derive(Debug, Default)]
pub struct MemoryStampStore {
    last: RwLock<Option<DateTime<Utc>>>,
}

impl MemoryStampStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RadioStampStore for MemoryStampStore {
    fn record_airplane_mode_disabled(&self, at: DateTime<Utc>) {
        *self.last.write() = Some(at);
    }

    fn last_airplane_mode_disabled(&self) -> Option<DateTime<Utc>> {
        *self.last.read()
    }
}

/// Apply a radio-mode change. Returns true when a stamp was recorded.
pub fn on_radio_mode_changed(
    store: &dyn RadioStampStore,
    airplane_mode_enabled: bool,
    at: DateTime<Utc>,
) -> bool {
    if airplane_mode_enabled {
        tracing::debug!(%at, "Airplane mode enabled");
        return false;
    }
    store.record_airplane_mode_disabled(at);
    tracing::info!(%at, "Airplane mode disabled, time recorded");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_only_disable_is_recorded() {
        let store = MemoryStampStore::new();
        let t0 = Utc::now();

        assert!(!on_radio_mode_changed(&store, true, t0));
        assert_eq!(store.last_airplane_mode_disabled(), None);

        assert!(on_radio_mode_changed(&store, false, t0));
        let t1 = t0 + Duration::seconds(90);
        assert!(on_radio_mode_changed(&store, false, t1));

        assert_eq!(store.last_airplane_mode_disabled(), Some(t1));
    }
}
