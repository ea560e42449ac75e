//! Capture device boundary
//!
//! The recording hardware itself is provided by the host; this module holds the
//! trait the recording session manager drives it through.

pub mod traits;

// Re-export traits
pub use traits::{sink_path, CaptureDevice, CaptureError, CaptureHandle, CaptureResult};
