//! Publish sinks
//!
//! Append-and-notify targets for harvested results. The agent only writes to
//! them; the presentation layer reads the last published value.

use crate::providers::ProviderError;
use crate::utils::error::ErrorResponse;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Destination for one job's results
pub trait PublishSink<T>: Send + Sync {
    fn publish(&self, value: T);

    /// Report a failed attempt. The default only logs it.
    fn publish_error(&self, error: &ProviderError) {
        tracing::warn!(%error, "Fetch failed");
    }
}

/// Last-published state of a sink
#[derive(Debug, Clone)]
pub struct Published<T> {
    pub value: Option<T>,
    pub last_error: Option<ErrorResponse>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of values published so far (errors not included)
    pub publish_count: u64,
}

impl<T> Default for Published<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_error: None,
            updated_at: None,
            publish_count: 0,
        }
    }
}

/// Sink that keeps only the latest value and notifies watchers
pub struct LatestSink<T> {
    name: String,
    tx: watch::Sender<Published<T>>,
}

impl<T> LatestSink<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(Published::default());
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Watch for updates
    pub fn subscribe(&self) -> watch::Receiver<Published<T>> {
        self.tx.subscribe()
    }

    pub fn publish_count(&self) -> u64 {
        self.tx.borrow().publish_count
    }

    pub fn last_error(&self) -> Option<ErrorResponse> {
        self.tx.borrow().last_error.clone()
    }
}

impl<T: Clone> LatestSink<T> {
    pub fn latest(&self) -> Option<T> {
        self.tx.borrow().value.clone()
    }

    pub fn snapshot(&self) -> Published<T> {
        self.tx.borrow().clone()
    }
}

impl<T: Send + Sync> PublishSink<T> for LatestSink<T> {
    fn publish(&self, value: T) {
        self.tx.send_modify(|state| {
            state.value = Some(value);
            state.last_error = None;
            state.updated_at = Some(Utc::now());
            state.publish_count += 1;
        });
        tracing::debug!(sink = %self.name, "Published result");
    }

    fn publish_error(&self, error: &ProviderError) {
        tracing::warn!(sink = %self.name, %error, "Fetch failed");
        self.tx.send_modify(|state| {
            state.last_error = Some(ErrorResponse::from(error));
            state.updated_at = Some(Utc::now());
        });
    }
}
