//! # pcm-capture-core
//!
//! Platform-agnostic live PCM capture core.
//!
//! A small fixed pool of equally sized buffers rotates between a platform
//! backend and an output sink: the backend fills a buffer, the completion
//! callback writes its bytes downstream, and the same buffer goes straight
//! back to the backend. Platform backends (cpal, mocks) implement the
//! `AudioBackend` trait and plug into the generic `CaptureEngine`.
//!
//! ## Architecture
//!
//! ```text
//! pcm-capture-core (this crate)
//! ├── traits/       ← AudioBackend, OutputSink, CaptureDelegate
//! ├── models/       ← AudioFormat, CaptureConfiguration, CaptureError, CaptureState
//! ├── processing/   ← BufferPool, AudioBuffer
//! ├── session/      ← CaptureEngine (lifecycle + callback), RunLoop (dispatch)
//! ├── sink/         ← StreamSink over stdout, files, any `Write`
//! └── mock/         ← MockBackend, MemorySink, FailingSink (`mock` feature)
//! ```

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod processing;
pub mod session;
pub mod sink;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{capacity_for_duration, CaptureConfiguration};
pub use models::diagnostics::CaptureSessionDiagnostics;
pub use models::error::{codes, CaptureError};
pub use models::format::AudioFormat;
pub use models::state::CaptureState;
pub use processing::buffer_pool::{AudioBuffer, BufferId, BufferPool, BufferState};
pub use session::engine::CaptureEngine;
pub use session::run_loop::{RunLoop, StopHandle};
pub use sink::stream_sink::StreamSink;
pub use traits::audio_backend::{AudioBackend, BufferCompletion, CompletionSender, StreamHandle, SubmitRejected};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::output_sink::OutputSink;
