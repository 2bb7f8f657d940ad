use std::sync::Arc;

use crate::models::config::CaptureConfiguration;
use crate::models::diagnostics::CaptureSessionDiagnostics;
use crate::models::error::{codes, CaptureError};
use crate::models::format::AudioFormat;
use crate::models::state::CaptureState;
use crate::processing::buffer_pool::{AudioBuffer, BufferPool};
use crate::traits::audio_backend::{AudioBackend, CompletionSender, StreamHandle};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::output_sink::OutputSink;

/// What happened to one completed buffer's bytes.
enum Drained {
    Empty,
    Written(usize),
    WriteFailed(CaptureError),
    Rejected(CaptureError),
}

/// One capture session: format, buffer pool, backend stream and lifecycle.
///
/// Generic over the platform backend and the output sink. Data flow:
/// ```text
/// [Backend] → completion → on_buffer_filled → [OutputSink]
///     ↑                           │
///     └────── re-submit ──────────┘
/// ```
///
/// All methods take `&mut self`, so the owner (normally a
/// [`RunLoop`](crate::RunLoop)) serializes callbacks with `start` and
/// `stop` and the engine needs no locks.
pub struct CaptureEngine<B: AudioBackend, S: OutputSink> {
    backend: B,
    sink: S,
    config: Option<CaptureConfiguration>,
    state: CaptureState,
    pool: BufferPool,
    stream: Option<StreamHandle>,
    diagnostics: CaptureSessionDiagnostics,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<B: AudioBackend, S: OutputSink> CaptureEngine<B, S> {
    pub fn new(backend: B, sink: S) -> Self {
        Self {
            backend,
            sink,
            config: None,
            state: CaptureState::Uninitialized,
            pool: BufferPool::new(0),
            stream: None,
            diagnostics: CaptureSessionDiagnostics::default(),
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> Option<&CaptureConfiguration> {
        self.config.as_ref()
    }

    pub fn format(&self) -> Option<&AudioFormat> {
        self.config.as_ref().map(|c| &c.format)
    }

    pub fn diagnostics(&self) -> &CaptureSessionDiagnostics {
        &self.diagnostics
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Validate and store the configuration. Transitions: uninitialized → configured.
    ///
    /// Makes no backend calls.
    pub fn configure(&mut self, config: CaptureConfiguration) -> Result<(), CaptureError> {
        if self.state != CaptureState::Uninitialized {
            return Err(CaptureError::InvalidState(format!(
                "can only configure an uninitialized session (state: {})",
                self.state
            )));
        }

        config.validate()?;

        log::debug!(
            "configured {} with {} x {} byte buffers ({:?} each)",
            config.format,
            config.buffer_count,
            config.buffer_capacity,
            config.buffer_duration()
        );
        self.config = Some(config);
        self.set_state(CaptureState::Configured);
        Ok(())
    }

    /// Open the stream, prime the backend with every buffer and start it.
    /// Transitions: configured → running.
    ///
    /// On failure everything allocated so far is freed, the stream is
    /// disposed and the session stays configured.
    pub fn start(&mut self, completions: CompletionSender) -> Result<(), CaptureError> {
        let config = match (&self.config, self.state.can_start()) {
            (Some(config), true) => config.clone(),
            _ => {
                return Err(CaptureError::InvalidState(format!(
                    "can only start a configured session (state: {})",
                    self.state
                )))
            }
        };

        let stream = self.backend.open_input_stream(&config.format, completions)?;
        self.pool = BufferPool::new(config.buffer_capacity);

        if let Err(e) = self.prime(stream, config.buffer_count) {
            self.abort_start(stream);
            return Err(e);
        }

        if let Err(e) = self.backend.start_stream(stream) {
            self.abort_start(stream);
            return Err(e);
        }

        self.stream = Some(stream);
        self.diagnostics = CaptureSessionDiagnostics::default();
        log::info!(
            "capture started on {} ({}): {} buffers of {} bytes",
            self.backend.name(),
            config.format,
            self.pool.len(),
            self.pool.capacity()
        );
        self.set_state(CaptureState::Running);
        Ok(())
    }

    /// Completion callback, invoked once per filled buffer in capture order.
    ///
    /// Writes the filled bytes to the sink, then hands the same buffer back
    /// to the backend. The buffer is re-submitted even when the write
    /// fails: losing output is acceptable, starving the backend is not.
    /// Completions that arrive after the session stopped are freed.
    pub fn on_buffer_filled(&mut self, buffer: AudioBuffer, filled: usize) {
        let stream = match self.stream {
            Some(stream) if self.state.is_running() => stream,
            _ => {
                self.diagnostics.late_completions += 1;
                self.backend.free_buffer(buffer);
                return;
            }
        };

        self.diagnostics.callback_count += 1;
        let id = buffer.id();

        let drained = match self.pool.reclaim(&mut self.backend, buffer, filled) {
            Ok([]) => Drained::Empty,
            Ok(bytes) => match self.sink.write(bytes) {
                Ok(()) => Drained::Written(bytes.len()),
                Err(e) => Drained::WriteFailed(e),
            },
            Err(e) => Drained::Rejected(e),
        };

        match drained {
            Drained::Empty => self.diagnostics.empty_buffers += 1,
            Drained::Written(len) => self.diagnostics.bytes_written += len as u64,
            Drained::WriteFailed(e) => {
                self.diagnostics.write_errors += 1;
                if self.diagnostics.write_errors == 1 {
                    log::error!(
                        "write to {} failed: {}; capture continues, output is being lost",
                        self.sink.name(),
                        e
                    );
                } else {
                    log::debug!("write failed ({} so far): {}", self.diagnostics.write_errors, e);
                }
                self.notify_error(&e);
            }
            Drained::Rejected(e) => {
                self.notify_error(&e);
                if e != CaptureError::backend(codes::FILLED_OUT_OF_RANGE) {
                    // Not ours: already freed by the pool, nothing to re-submit.
                    self.diagnostics.unknown_buffers += 1;
                    return;
                }
                self.diagnostics.rejected_fills += 1;
                log::error!(
                    "backend reported {} filled bytes for buffer {} (capacity {})",
                    filled,
                    id,
                    self.pool.capacity()
                );
            }
        }

        match self.pool.submit(&mut self.backend, stream, id) {
            Ok(()) => self.diagnostics.resubmit_count += 1,
            Err(e) => {
                self.diagnostics.resubmit_failures += 1;
                log::error!("failed to re-submit buffer {}: {}", id, e);
                self.notify_error(&e);
            }
        }
    }

    /// Halt capture and release every buffer and the stream.
    /// Transitions: running/configured → stopped.
    ///
    /// Teardown always runs to completion; the first backend error is
    /// returned afterwards. Stopping a stopped session does nothing.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Stopped => return Ok(()),
            CaptureState::Uninitialized => {
                return Err(CaptureError::InvalidState(
                    "can only stop a configured or running session".into(),
                ))
            }
            CaptureState::Configured | CaptureState::Running => {}
        }

        let mut first_error = None;

        if let Some(stream) = self.stream.take() {
            if let Err(e) = self.backend.stop_stream(stream) {
                log::error!("failed to stop {}: {}", stream, e);
                first_error.get_or_insert(e);
            }

            let freed = self.pool.release_all(&mut self.backend);

            if let Err(e) = self.backend.dispose_stream(stream) {
                log::error!("failed to dispose {}: {}", stream, e);
                first_error.get_or_insert(e);
            }

            let d = &self.diagnostics;
            log::info!(
                "capture stopped: {} callbacks, {} bytes written, {} write errors, {} buffers freed",
                d.callback_count,
                d.bytes_written,
                d.write_errors,
                freed
            );
        }

        self.set_state(CaptureState::Stopped);
        first_error.map_or(Ok(()), Err)
    }

    // --- Internal helpers ---

    fn set_state(&mut self, new_state: CaptureState) {
        log::debug!("capture state {} → {}", self.state, new_state);
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(new_state);
        }
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    /// Allocate and submit `count` buffers, one at a time.
    fn prime(&mut self, stream: StreamHandle, count: usize) -> Result<(), CaptureError> {
        for _ in 0..count {
            let id = self.pool.allocate(&mut self.backend, stream)?;
            self.pool.submit(&mut self.backend, stream, id)?;
        }
        Ok(())
    }

    fn abort_start(&mut self, stream: StreamHandle) {
        let freed = self.pool.release_all(&mut self.backend);
        if let Err(e) = self.backend.dispose_stream(stream) {
            log::warn!("failed to dispose {} after aborted start: {}", stream, e);
        }
        log::debug!("aborted start, freed {} pooled buffers", freed);
    }
}
