use std::fs::{self, File};
use std::io::{self, ErrorKind, Stdout, Write};
use std::path::Path;

use crate::models::error::CaptureError;
use crate::traits::output_sink::OutputSink;

/// Raw PCM sink over any byte transport (stdout, pipe, file, socket).
///
/// Each `write` pushes the whole span through the transport, looping over
/// short writes and retrying interrupted ones, then flushes so a reader on
/// the other end sees the audio right away.
///
/// ```text
/// [buffer 1 bytes][buffer 2 bytes][buffer 3 bytes]...
/// ```
/// No header, no framing: the stream is exactly the captured samples.
pub struct StreamSink<W: Write> {
    writer: W,
    name: String,
    total_bytes_written: u64,
}

impl StreamSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), "stdout")
    }
}

impl StreamSink<File> {
    /// Create (or truncate) `path` and stream into it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::write_failed(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(path)
            .map_err(|e| CaptureError::write_failed(format!("failed to create {}: {}", path.display(), e)))?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer,
            name: name.into(),
            total_bytes_written: 0,
        }
    }

    /// Total bytes accepted by the transport so far.
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for StreamSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let mut remaining = bytes;
        while !remaining.is_empty() {
            match self.writer.write(remaining) {
                Ok(0) => {
                    return Err(CaptureError::write_failed(format!(
                        "{} accepted no bytes ({} left unwritten)",
                        self.name,
                        remaining.len()
                    )))
                }
                Ok(n) => {
                    remaining = &remaining[n..];
                    self.total_bytes_written += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
