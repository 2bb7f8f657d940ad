use serde::{Deserialize, Serialize};

/// Counters for debugging a capture session.
///
/// Updated on the dispatch thread only; read them between callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSessionDiagnostics {
    /// Completions delivered to the callback while running.
    pub callback_count: u64,
    /// Completions that carried zero bytes.
    pub empty_buffers: u64,
    /// Bytes successfully handed to the sink.
    pub bytes_written: u64,
    /// Sink writes that failed.
    pub write_errors: u64,
    /// Buffers handed back to the backend after a completion.
    pub resubmit_count: u64,
    /// Re-submissions the backend refused.
    pub resubmit_failures: u64,
    /// Completions whose fill count exceeded the buffer capacity.
    pub rejected_fills: u64,
    /// Completions carrying a buffer this session's pool did not submit.
    pub unknown_buffers: u64,
    /// Completions that arrived after the session stopped running.
    pub late_completions: u64,
}

impl CaptureSessionDiagnostics {
    /// Fraction of callbacks whose write failed, 0.0 when idle.
    pub fn write_error_rate(&self) -> f64 {
        if self.callback_count == 0 {
            return 0.0;
        }
        self.write_errors as f64 / self.callback_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rate_handles_idle_session() {
        let diag = CaptureSessionDiagnostics::default();
        assert_eq!(diag.write_error_rate(), 0.0);
    }

    #[test]
    fn error_rate_is_fraction_of_callbacks() {
        let diag = CaptureSessionDiagnostics {
            callback_count: 4,
            write_errors: 1,
            ..Default::default()
        };
        assert_eq!(diag.write_error_rate(), 0.25);
    }
}
