use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::error::{codes, CaptureError};
use crate::traits::audio_backend::{AudioBackend, StreamHandle};

/// Source of pool identities; buffers carry the one of the pool that made them.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a buffer within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(usize);

impl BufferId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fixed-capacity byte region plus the number of valid bytes in it.
///
/// Only the pool creates buffers, and each one records the pool it came
/// from, so every buffer a backend hands back can be traced to exactly one
/// pool slot. Backends fill the storage through
/// [`AudioBuffer::storage_mut`] and report the fill count with the
/// completion.
pub struct AudioBuffer {
    pool: u64,
    id: BufferId,
    data: Box<[u8]>,
    len: usize,
}

impl AudioBuffer {
    pub(crate) fn new(pool: u64, id: BufferId, data: Box<[u8]>) -> Self {
        Self {
            pool,
            id,
            data,
            len: 0,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid bytes, as set when the buffer was last reclaimed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The whole backing storage, for the backend to fill.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.capacity());
        self.len = len;
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("pool", &self.pool)
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

/// Where a pooled buffer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Held by the pool, not yet handed out.
    Idle,
    /// Owned by the backend, waiting to be filled.
    Submitted,
    /// Returned by the backend; its bytes are being drained.
    Draining,
}

struct Slot {
    state: BufferState,
    buffer: Option<AudioBuffer>,
}

/// Fixed set of equally sized buffers rotated through the backend.
///
/// Invariant: every allocated buffer is in exactly one [`BufferState`], and
/// a slot holds its buffer unless the state is `Submitted`. Submitting
/// moves the buffer into the backend; reclaiming moves it back.
pub struct BufferPool {
    token: u64,
    capacity: usize,
    slots: Vec<Slot>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            token: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            slots: Vec::new(),
        }
    }

    /// Allocate one more buffer from the backend. It starts out idle.
    pub fn allocate<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        stream: StreamHandle,
    ) -> Result<BufferId, CaptureError> {
        let storage = backend.allocate_buffer(stream, self.capacity)?;
        let id = BufferId(self.slots.len());
        let buffer = AudioBuffer::new(self.token, id, storage);

        if buffer.capacity() != self.capacity {
            let got = buffer.capacity();
            backend.free_buffer(buffer);
            return Err(CaptureError::ResourceExhausted(format!(
                "backend provided {} bytes for a {} byte buffer",
                got, self.capacity
            )));
        }

        self.slots.push(Slot {
            state: BufferState::Idle,
            buffer: Some(buffer),
        });
        Ok(id)
    }

    /// Hand a buffer the pool holds to the backend for filling.
    ///
    /// Refuses a buffer that is already submitted without calling the
    /// backend. If the backend rejects the buffer, it returns to the pool
    /// as idle.
    pub fn submit<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        stream: StreamHandle,
        id: BufferId,
    ) -> Result<(), CaptureError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or_else(|| CaptureError::InvalidState(format!("buffer {} is not in this pool", id)))?;

        let mut buffer = match (slot.state, slot.buffer.take()) {
            (BufferState::Submitted, _) | (_, None) => {
                return Err(CaptureError::InvalidState(format!(
                    "buffer {} is already submitted",
                    id
                )))
            }
            (_, Some(buffer)) => buffer,
        };

        buffer.set_len(0);
        slot.state = BufferState::Submitted;

        if let Err(rejected) = backend.submit_buffer(stream, buffer) {
            slot.buffer = Some(rejected.buffer);
            slot.state = BufferState::Idle;
            return Err(rejected.error);
        }
        Ok(())
    }

    /// Take back a buffer the backend has filled and expose its bytes.
    ///
    /// The returned slice borrows the buffer in place. A fill count larger
    /// than the capacity is refused with `BackendError`; the buffer still
    /// returns to the pool (empty) so it can be submitted again. A buffer
    /// this pool did not submit (another pool's, or one already returned) is
    /// refused with `UNKNOWN_BUFFER` and freed through `backend`.
    pub fn reclaim<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        buffer: AudioBuffer,
        filled: usize,
    ) -> Result<&[u8], CaptureError> {
        let capacity = self.capacity;
        let token = self.token;
        let slot = match self.slots.get_mut(buffer.id().0) {
            Some(slot) if buffer.pool == token && slot.state == BufferState::Submitted => slot,
            _ => {
                log::error!("backend returned buffer {} that this pool did not submit", buffer.id());
                backend.free_buffer(buffer);
                return Err(CaptureError::backend(codes::UNKNOWN_BUFFER));
            }
        };

        let mut buffer = buffer;
        slot.state = BufferState::Draining;

        if filled > capacity {
            buffer.set_len(0);
            slot.buffer = Some(buffer);
            return Err(CaptureError::backend(codes::FILLED_OUT_OF_RANGE));
        }

        buffer.set_len(filled);
        let buffer = slot.buffer.insert(buffer);
        Ok(buffer.as_bytes())
    }

    /// Free every buffer the pool holds and forget the submitted ones.
    ///
    /// Submitted buffers belong to the backend until the stream is disposed.
    /// Returns how many buffers were freed here.
    pub fn release_all<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let mut freed = 0;
        for slot in self.slots.drain(..) {
            if let Some(buffer) = slot.buffer {
                backend.free_buffer(buffer);
                freed += 1;
            }
        }
        freed
    }

    /// Buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of allocated buffers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn state_of(&self, id: BufferId) -> Option<BufferState> {
        self.slots.get(id.0).map(|slot| slot.state)
    }

    pub fn idle_count(&self) -> usize {
        self.count_in(BufferState::Idle)
    }

    pub fn in_flight_count(&self) -> usize {
        self.count_in(BufferState::Submitted)
    }

    fn count_in(&self, state: BufferState) -> usize {
        self.slots.iter().filter(|slot| slot.state == state).count()
    }
}
