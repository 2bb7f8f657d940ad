use thiserror::Error;

/// Backend status codes used by the core itself.
///
/// Backends are free to report their own platform codes; these cover the
/// conditions the engine and the bundled backends detect on their own.
pub mod codes {
    /// The backend reported more filled bytes than the buffer can hold.
    pub const FILLED_OUT_OF_RANGE: i32 = -50;
    /// A buffer came back that the pool never handed out.
    pub const UNKNOWN_BUFFER: i32 = -51;
    /// The requested PCM layout cannot be produced by this backend.
    pub const UNSUPPORTED_FORMAT: i32 = -52;
    /// No input device could be opened.
    pub const DEVICE_UNAVAILABLE: i32 = -53;
    /// The stream handle does not refer to an open stream.
    pub const INVALID_HANDLE: i32 = -54;
    /// Generic backend failure without a more specific code.
    pub const UNSPECIFIED: i32 = -1;
}

/// Errors that can occur during capture operations.
///
/// Setup errors (`InvalidFormat`, `ConfigurationFailed`, `BackendError` and
/// `ResourceExhausted` out of `start`) are fatal to the session. `WriteError`
/// is a steady-state error: the engine reports it and keeps capturing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("backend error (status {code})")]
    BackendError { code: i32 },

    #[error("write failed: {reason}")]
    WriteError { reason: String },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl CaptureError {
    pub fn backend(code: i32) -> Self {
        Self::BackendError { code }
    }

    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteError {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        Self::write_failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_includes_code() {
        let err = CaptureError::backend(-66681);
        assert_eq!(err.to_string(), "backend error (status -66681)");
    }

    #[test]
    fn io_error_becomes_write_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = CaptureError::from(io);
        assert!(matches!(err, CaptureError::WriteError { .. }));
        assert!(err.to_string().contains("pipe closed"));
    }
}
