use crate::models::error::CaptureError;

/// Downstream consumer of captured PCM bytes.
///
/// `write` gets one completed buffer's valid bytes, in capture order. It
/// must deliver all of them (looping over partial writes) and flush before
/// returning, and it must not batch across calls. Failures come back as
/// `CaptureError::WriteError`; the engine reports them and keeps capturing.
pub trait OutputSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CaptureError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "output"
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        (**self).write(bytes)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
