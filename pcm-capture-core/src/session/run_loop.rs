use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError};

use crate::models::error::CaptureError;
use crate::session::engine::CaptureEngine;
use crate::traits::audio_backend::{AudioBackend, BufferCompletion, CompletionSender};
use crate::traits::output_sink::OutputSink;

/// How often a blocked run loop checks the stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cloneable, thread-safe request to end a running [`RunLoop`].
///
/// Safe to trigger from a signal-handling thread: it only sets a flag that
/// the loop checks between callbacks.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serial dispatcher of buffer completions.
///
/// Backends post [`BufferCompletion`]s into the loop's channel from
/// whatever thread fills them; the loop hands them to the engine one at a
/// time, in arrival order, on the thread that calls [`RunLoop::run`].
pub struct RunLoop {
    sender: CompletionSender,
    receiver: Receiver<BufferCompletion>,
    stop: StopHandle,
    poll_interval: Duration,
}

impl RunLoop {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            stop: StopHandle::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sender to pass to [`CaptureEngine::start`].
    pub fn completion_sender(&self) -> CompletionSender {
        self.sender.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Completions waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Dispatch the completions queued at the time of the call without
    /// blocking. Returns how many were dispatched.
    pub fn dispatch_pending<B: AudioBackend, S: OutputSink>(&self, engine: &mut CaptureEngine<B, S>) -> usize {
        let queued = self.receiver.len();
        let mut dispatched = 0;
        while dispatched < queued {
            match self.receiver.try_recv() {
                Ok(completion) => {
                    engine.on_buffer_filled(completion.buffer, completion.filled);
                    dispatched += 1;
                }
                Err(_) => break,
            }
        }
        dispatched
    }

    /// Dispatch completions until a stop is requested, then stop the engine.
    ///
    /// Blocks the calling thread. Completions already queued when the stop
    /// is noticed are still written out; anything arriving during teardown
    /// is handed to the stopped engine, which frees it.
    pub fn run<B: AudioBackend, S: OutputSink>(&self, engine: &mut CaptureEngine<B, S>) -> Result<(), CaptureError> {
        log::debug!("run loop dispatching (poll every {:?})", self.poll_interval);

        while !self.stop.is_stop_requested() {
            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(completion) => engine.on_buffer_filled(completion.buffer, completion.filled),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let flushed = self.dispatch_pending(engine);
        let result = engine.stop();
        let late = self.dispatch_pending(engine);
        log::debug!("run loop finished: {} flushed, {} freed after stop", flushed, late);
        result
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}
