/// Lifecycle of a [`WavRecorder`](crate::session::recorder::WavRecorder).
///
/// State transitions (one-way, no restart):
/// ```text
/// not-started → running → stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    NotStarted,
    Running,
    Stopped,
}

impl CaptureState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// What the capture loop did before it exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSummary {
    /// Bytes written to the sink, including the 44-byte header.
    pub bytes_written: u64,
    /// Non-empty device reads.
    pub reads: u64,
    /// Zero-length reads that were retried.
    pub empty_reads: u64,
    /// Whether the loop ended on an error rather than a stop request.
    pub failed: bool,
}
