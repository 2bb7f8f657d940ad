use std::time::Duration;

use serde::Serialize;

use pcm_capture_core::{AudioFormat, CaptureSessionDiagnostics};

/// End-of-run report, logged as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct DumpSummary {
    pub device: String,
    pub format: AudioFormat,
    pub duration_secs: f64,
    /// Seconds of audio actually written downstream.
    pub audio_secs: f64,
    pub overrun_bytes: u64,
    /// Fraction of callbacks whose write failed.
    pub write_error_rate: f64,
    pub diagnostics: CaptureSessionDiagnostics,
}

impl DumpSummary {
    pub fn new(
        device: impl Into<String>,
        format: AudioFormat,
        elapsed: Duration,
        overrun_bytes: u64,
        diagnostics: CaptureSessionDiagnostics,
    ) -> Self {
        Self {
            device: device.into(),
            audio_secs: format.duration_of(diagnostics.bytes_written as usize).as_secs_f64(),
            format,
            duration_secs: elapsed.as_secs_f64(),
            overrun_bytes,
            write_error_rate: diagnostics.write_error_rate(),
            diagnostics,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}
