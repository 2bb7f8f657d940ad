use std::fmt;

use crossbeam::channel::Sender;

use crate::models::error::CaptureError;
use crate::models::format::AudioFormat;
use crate::processing::buffer_pool::AudioBuffer;

/// Opaque handle to an input stream opened by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// A filled buffer on its way back to the engine.
///
/// `filled` is what the backend claims it wrote; the engine checks it
/// against the buffer capacity before trusting it.
#[derive(Debug)]
pub struct BufferCompletion {
    pub buffer: AudioBuffer,
    pub filled: usize,
}

/// Where backends post completions. The run loop owns the receiving end
/// and invokes the engine's callback once per message, in order.
pub type CompletionSender = Sender<BufferCompletion>;

/// A buffer the backend refused to queue, handed back with the reason.
#[derive(Debug)]
pub struct SubmitRejected {
    pub error: CaptureError,
    pub buffer: AudioBuffer,
}

/// Interface to a platform audio capture subsystem.
///
/// Implemented by:
/// - `CpalInputBackend` (pcm-capture-cpal)
/// - `MockBackend` (`mock` feature) for tests
///
/// The engine calls these from a single thread. A backend whose hardware
/// callback runs elsewhere must synchronize its own fill state and post
/// completions through the sender it got in `open_input_stream`.
pub trait AudioBackend {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Open a capture stream for `format`. Nothing is captured until
    /// `start_stream`.
    fn open_input_stream(
        &mut self,
        format: &AudioFormat,
        completions: CompletionSender,
    ) -> Result<StreamHandle, CaptureError>;

    /// Provide `capacity` bytes of buffer memory for `stream`.
    ///
    /// Fails with `ResourceExhausted` when memory cannot be provided.
    fn allocate_buffer(&mut self, stream: StreamHandle, capacity: usize) -> Result<Box<[u8]>, CaptureError>;

    /// Queue a buffer for filling. Buffers complete in submission order.
    fn submit_buffer(&mut self, stream: StreamHandle, buffer: AudioBuffer) -> Result<(), SubmitRejected>;

    fn start_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError>;

    /// Halt capture. Queued buffers stay with the backend.
    fn stop_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError>;

    /// Close the stream and free every buffer still queued on it.
    fn dispose_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError>;

    /// Return buffer memory that is no longer needed.
    fn free_buffer(&mut self, buffer: AudioBuffer) {
        drop(buffer);
    }
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open_input_stream(
        &mut self,
        format: &AudioFormat,
        completions: CompletionSender,
    ) -> Result<StreamHandle, CaptureError> {
        (**self).open_input_stream(format, completions)
    }

    fn allocate_buffer(&mut self, stream: StreamHandle, capacity: usize) -> Result<Box<[u8]>, CaptureError> {
        (**self).allocate_buffer(stream, capacity)
    }

    fn submit_buffer(&mut self, stream: StreamHandle, buffer: AudioBuffer) -> Result<(), SubmitRejected> {
        (**self).submit_buffer(stream, buffer)
    }

    fn start_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        (**self).start_stream(stream)
    }

    fn stop_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        (**self).stop_stream(stream)
    }

    fn dispose_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        (**self).dispose_stream(stream)
    }

    fn free_buffer(&mut self, buffer: AudioBuffer) {
        (**self).free_buffer(buffer)
    }
}
