//! Progress reporting seam.
//!
//! The core reports byte counts and completion events; how they are shown is
//! up to the caller. Every method has a no-op default so sinks implement only
//! what they display.

/// Receiver of progress events from transfers and the traversal.
///
/// Called concurrently from many traversal tasks.
pub trait ProgressSink: Send + Sync {
    /// A transfer attempt opened its stream. `total_bytes` is 0 when unknown.
    fn transfer_started(&self, _file: &str, _total_bytes: u64) {}

    /// `bytes` more bytes of `file` were written.
    fn transfer_progress(&self, _file: &str, _bytes: u64) {}

    /// A transfer attempt ended.
    fn transfer_finished(&self, _file: &str, _succeeded: bool) {}

    /// A directory was recorded as processed.
    fn directory_completed(&self, _path: &str) {}
}

/// Sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}
