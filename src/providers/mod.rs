//! Data provider boundary
//!
//! The raw data sources (call log, message store, location, phone-number
//! registry) live outside the agent. This module defines the records they
//! return and the traits the scheduler drives them through.

pub mod records;

pub use records::{CallLogEntry, CallType, LocationFix, MessageLogEntry, PhoneNumberEntry};

use async_trait::async_trait;
use thiserror::Error;

/// Errors signalled by a data provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How an error affects the job or loop that hit it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Capability missing; the job halts until restarted.
    PermissionDenied,
    /// Radio/GPS off or provider disabled.
    ProviderUnavailable,
    /// A single attempt failed; the job carries on.
    TransientIo,
}

impl ErrorKind {
    /// Stable code used in published error responses
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorKind::TransientIo => "TRANSIENT_IO",
        }
    }
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ProviderError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            ProviderError::Transient(_) | ProviderError::Io(_) => ErrorKind::TransientIo,
        }
    }
}

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A "fetch now" operation against one data source.
///
/// Synchronous providers simply return without awaiting anything.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self) -> ProviderResult<T>;
}

/// Single-shot location provider.
///
/// `request_single_update` resolves once with the next fix, or with
/// `ProviderUnavailable` / `PermissionDenied` when the request cannot be served.
/// Dropping the returned future must retract the request where the platform
/// allows it; callers never rely on that.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether the underlying positioning provider (GPS) is switched on
    fn is_provider_enabled(&self) -> bool;

    async fn request_single_update(&self) -> ProviderResult<LocationFix>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ProviderError::PermissionDenied("x".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            ProviderError::ProviderUnavailable("gps".into()).kind(),
            ErrorKind::ProviderUnavailable
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "database is locked");
        assert_eq!(ProviderError::from(io).kind(), ErrorKind::TransientIo);
        assert_eq!(ErrorKind::TransientIo.code(), "TRANSIENT_IO");
    }
}
