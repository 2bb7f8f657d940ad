use crate::models::error::CaptureError;
use crate::traits::output_sink::OutputSink;

/// Sink that keeps every write as a separate chunk.
#[derive(Debug, Default)]
pub struct MemorySink {
    chunks: Vec<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn write_count(&self) -> usize {
        self.chunks.len()
    }

    /// Size of each write, in order.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.chunks.iter().map(Vec::len).collect()
    }

    /// Everything written, concatenated.
    pub fn data(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        self.chunks.push(bytes.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Sink whose writes always fail, like a closed pipe.
#[derive(Debug)]
pub struct FailingSink {
    reason: String,
    attempts: usize,
}

impl FailingSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl OutputSink for FailingSink {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), CaptureError> {
        self.attempts += 1;
        Err(CaptureError::write_failed(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
