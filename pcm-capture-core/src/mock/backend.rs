use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::{codes, CaptureError};
use crate::models::format::AudioFormat;
use crate::processing::buffer_pool::{AudioBuffer, BufferId};
use crate::traits::audio_backend::{
    AudioBackend, BufferCompletion, CompletionSender, StreamHandle, SubmitRejected,
};

/// A call the engine made into the [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Open,
    Allocate(usize),
    Submit(BufferId),
    Start,
    Stop,
    Dispose,
    Free(BufferId),
}

#[derive(Default)]
struct Failures {
    open: Option<i32>,
    allocations_before_failure: Option<usize>,
    start: Option<i32>,
    stop: Option<i32>,
    dispose: Option<i32>,
    submit: Option<i32>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<BackendCall>,
    failures: Failures,
    completions: Option<CompletionSender>,
    stream: Option<StreamHandle>,
    next_handle: u64,
    format: Option<AudioFormat>,
    queue: VecDeque<AudioBuffer>,
    allocations: usize,
    live_buffers: usize,
    started: bool,
    dispose_count: usize,
}

impl MockState {
    fn check_handle(&self, stream: StreamHandle) -> Result<(), CaptureError> {
        match self.stream {
            Some(open) if open == stream => Ok(()),
            _ => Err(CaptureError::backend(codes::INVALID_HANDLE)),
        }
    }
}

/// Scriptable in-memory backend for tests.
///
/// Clones share state, so a test can keep one clone to drive completions
/// and inspect calls after moving another into the engine. Submitted
/// buffers complete in FIFO order through the sender given at open.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open_input_stream` fail with `code`.
    pub fn fail_open(&self, code: i32) {
        self.inner.lock().failures.open = Some(code);
    }

    /// Let `count` allocations succeed, then fail with `ResourceExhausted`.
    pub fn fail_allocation_after(&self, count: usize) {
        self.inner.lock().failures.allocations_before_failure = Some(count);
    }

    pub fn fail_start(&self, code: i32) {
        self.inner.lock().failures.start = Some(code);
    }

    pub fn fail_stop(&self, code: i32) {
        self.inner.lock().failures.stop = Some(code);
    }

    pub fn fail_dispose(&self, code: i32) {
        self.inner.lock().failures.dispose = Some(code);
    }

    /// Refuse every submission from now on with `code`.
    pub fn reject_submissions(&self, code: i32) {
        self.inner.lock().failures.submit = Some(code);
    }

    /// Fill the oldest submitted buffer with `payload` and post its
    /// completion. Returns `false` when nothing is submitted.
    ///
    /// Panics if `payload` is larger than the buffer.
    pub fn complete_next(&self, payload: &[u8]) -> bool {
        let mut state = self.inner.lock();
        let Some(mut buffer) = state.queue.pop_front() else {
            return false;
        };
        buffer.storage_mut()[..payload.len()].copy_from_slice(payload);
        Self::post(&state, buffer, payload.len())
    }

    /// Post the oldest submitted buffer with an arbitrary fill count,
    /// without touching its bytes.
    pub fn complete_next_reporting(&self, filled: usize) -> bool {
        let mut state = self.inner.lock();
        let Some(buffer) = state.queue.pop_front() else {
            return false;
        };
        Self::post(&state, buffer, filled)
    }

    /// Remove the oldest submitted buffer without posting it.
    pub fn take_next(&self) -> Option<AudioBuffer> {
        self.inner.lock().queue.pop_front()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::Submit(_)))
    }

    pub fn stop_count(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::Stop))
    }

    pub fn dispose_count(&self) -> usize {
        self.inner.lock().dispose_count
    }

    /// Buffers currently queued for filling.
    pub fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Buffers allocated and not yet freed or disposed.
    pub fn live_buffers(&self) -> usize {
        self.inner.lock().live_buffers
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub fn opened_format(&self) -> Option<AudioFormat> {
        self.inner.lock().format
    }

    fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|call| pred(call)).count()
    }

    fn post(state: &MockState, buffer: AudioBuffer, filled: usize) -> bool {
        match state.completions {
            Some(ref sender) => sender.send(BufferCompletion { buffer, filled }).is_ok(),
            None => false,
        }
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn open_input_stream(
        &mut self,
        format: &AudioFormat,
        completions: CompletionSender,
    ) -> Result<StreamHandle, CaptureError> {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Open);
        if let Some(code) = state.failures.open {
            return Err(CaptureError::backend(code));
        }

        state.next_handle += 1;
        let handle = StreamHandle::new(state.next_handle);
        state.stream = Some(handle);
        state.format = Some(*format);
        state.completions = Some(completions);
        Ok(handle)
    }

    fn allocate_buffer(&mut self, stream: StreamHandle, capacity: usize) -> Result<Box<[u8]>, CaptureError> {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Allocate(capacity));
        state.check_handle(stream)?;

        if let Some(limit) = state.failures.allocations_before_failure {
            if state.allocations >= limit {
                return Err(CaptureError::ResourceExhausted(format!(
                    "mock allocation limit of {} reached",
                    limit
                )));
            }
        }

        state.allocations += 1;
        state.live_buffers += 1;
        Ok(vec![0u8; capacity].into_boxed_slice())
    }

    fn submit_buffer(&mut self, stream: StreamHandle, buffer: AudioBuffer) -> Result<(), SubmitRejected> {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Submit(buffer.id()));

        let refusal = state
            .check_handle(stream)
            .err()
            .or_else(|| state.failures.submit.map(CaptureError::backend));
        if let Some(error) = refusal {
            return Err(SubmitRejected { error, buffer });
        }

        state.queue.push_back(buffer);
        Ok(())
    }

    fn start_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Start);
        state.check_handle(stream)?;
        if let Some(code) = state.failures.start {
            return Err(CaptureError::backend(code));
        }
        state.started = true;
        Ok(())
    }

    fn stop_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Stop);
        state.check_handle(stream)?;
        state.started = false;
        match state.failures.stop {
            Some(code) => Err(CaptureError::backend(code)),
            None => Ok(()),
        }
    }

    fn dispose_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Dispose);
        state.check_handle(stream)?;

        // Disposal always releases the stream, even when it reports failure.
        let held = state.queue.len();
        state.queue.clear();
        state.live_buffers -= held;
        state.stream = None;
        state.completions = None;
        state.started = false;
        state.dispose_count += 1;

        match state.failures.dispose {
            Some(code) => Err(CaptureError::backend(code)),
            None => Ok(()),
        }
    }

    fn free_buffer(&mut self, buffer: AudioBuffer) {
        let mut state = self.inner.lock();
        state.calls.push(BackendCall::Free(buffer.id()));
        state.live_buffers -= 1;
    }
}
