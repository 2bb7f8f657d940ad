//! cpal input stream backend.
//!
//! Opens an input stream on a cpal device and fills submitted buffers with
//! interleaved signed 16-bit little-endian samples. Completions are posted
//! from cpal's audio thread through the sender handed over at open.

use std::collections::VecDeque;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, BuildStreamError, Device, SampleFormat, SampleRate, Stream, StreamConfig};
use parking_lot::Mutex;

use pcm_capture_core::models::error::{codes, CaptureError};
use pcm_capture_core::models::format::AudioFormat;
use pcm_capture_core::processing::buffer_pool::AudioBuffer;
use pcm_capture_core::traits::audio_backend::{
    AudioBackend, BufferCompletion, CompletionSender, StreamHandle, SubmitRejected,
};

use crate::device_enumerator::DeviceEnumerator;

/// Symmetric i16 max for float conversion (avoids asymmetric clipping).
const I16_MAX_SYMMETRIC: f32 = i16::MAX as f32;
const I16_MIN_F32: f32 = i16::MIN as f32;
const I16_MAX_F32: f32 = i16::MAX as f32;

/// The only sample width this backend produces.
const OUTPUT_BITS: u16 = 16;

/// Buffers submitted to an open stream, filled front to back.
struct FillState {
    queue: VecDeque<AudioBuffer>,
    /// Bytes already written into the front buffer.
    offset: usize,
    /// Bytes that arrived with no buffer to put them in.
    overrun_bytes: u64,
    completions: CompletionSender,
}

impl FillState {
    fn new(completions: CompletionSender) -> Self {
        Self {
            queue: VecDeque::new(),
            offset: 0,
            overrun_bytes: 0,
            completions,
        }
    }

    fn push_samples(&mut self, samples: impl IntoIterator<Item = i16>) {
        for sample in samples {
            self.push_sample(sample);
        }
    }

    fn push_sample(&mut self, sample: i16) {
        let Some(front) = self.queue.front_mut() else {
            self.overrun_bytes += 2;
            return;
        };

        let storage = front.storage_mut();
        storage[self.offset..self.offset + 2].copy_from_slice(&sample.to_le_bytes());
        self.offset += 2;
        let full = self.offset >= storage.len();

        if full {
            self.complete_front();
        }
    }

    /// Post the front buffer with whatever it holds.
    fn complete_front(&mut self) {
        let Some(buffer) = self.queue.pop_front() else {
            return;
        };
        let filled = std::mem::take(&mut self.offset);
        // A closed channel means the run loop is gone; the buffer is dropped.
        let _ = self.completions.send(BufferCompletion { buffer, filled });
    }
}

struct OpenStream {
    handle: StreamHandle,
    stream: Stream,
    fill: Arc<Mutex<FillState>>,
}

/// `AudioBackend` on a cpal input device.
///
/// One stream at a time. The device is resolved at construction; the stream
/// is built paused in `open_input_stream` and only plays after `start_stream`.
pub struct CpalInputBackend {
    device: Device,
    device_name: String,
    open: Option<OpenStream>,
    next_handle: u64,
    overrun_bytes: u64,
}

impl CpalInputBackend {
    /// Use the host's default input device.
    pub fn default_device() -> Result<Self, CaptureError> {
        let device = DeviceEnumerator::new().default_input_device()?;
        Ok(Self::with_device(device))
    }

    /// Use the input device named `name`.
    pub fn with_device_name(name: &str) -> Result<Self, CaptureError> {
        let device = DeviceEnumerator::new().find_input_device(name)?;
        Ok(Self::with_device(device))
    }

    pub fn with_device(device: Device) -> Self {
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        Self {
            device,
            device_name,
            open: None,
            next_handle: 0,
            overrun_bytes: 0,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Bytes captured while no buffer was submitted, across all streams.
    pub fn overrun_bytes(&self) -> u64 {
        let current = self.open.as_ref().map_or(0, |open| open.fill.lock().overrun_bytes);
        self.overrun_bytes + current
    }

    fn stream(&self, handle: StreamHandle) -> Result<&OpenStream, CaptureError> {
        match self.open {
            Some(ref open) if open.handle == handle => Ok(open),
            _ => Err(CaptureError::backend(codes::INVALID_HANDLE)),
        }
    }

    fn device_sample_format(&self, format: &AudioFormat) -> Result<SampleFormat, CaptureError> {
        let rate = SampleRate(format.sample_rate);
        let ranges = self.device.supported_input_configs().map_err(|e| {
            log::error!("failed to query {} configs: {}", self.device_name, e);
            CaptureError::backend(codes::DEVICE_UNAVAILABLE)
        })?;

        let candidates = ranges
            .filter(|r| r.channels() == format.channels)
            .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
            .map(|r| r.sample_format());

        preferred_sample_format(candidates).ok_or_else(|| {
            log::error!("{} cannot capture {} as i16 or f32", self.device_name, format);
            CaptureError::backend(codes::UNSUPPORTED_FORMAT)
        })
    }

    fn build_stream(
        &self,
        config: &StreamConfig,
        sample_format: SampleFormat,
        fill: Arc<Mutex<FillState>>,
    ) -> Result<Stream, BuildStreamError> {
        let on_error = |err: cpal::StreamError| log::error!("input stream error: {}", err);

        match sample_format {
            SampleFormat::F32 => self.device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    fill.lock().push_samples(data.iter().map(|&s| f32_to_i16(s)));
                },
                on_error,
                None,
            ),
            _ => self.device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    fill.lock().push_samples(data.iter().copied());
                },
                on_error,
                None,
            ),
        }
    }
}

impl AudioBackend for CpalInputBackend {
    fn name(&self) -> &str {
        &self.device_name
    }

    fn open_input_stream(
        &mut self,
        format: &AudioFormat,
        completions: CompletionSender,
    ) -> Result<StreamHandle, CaptureError> {
        if self.open.is_some() {
            return Err(CaptureError::InvalidState(format!(
                "{} already has an open stream",
                self.device_name
            )));
        }
        if format.bits_per_sample != OUTPUT_BITS {
            log::error!("{} only produces 16-bit samples, asked for {}", self.device_name, format);
            return Err(CaptureError::backend(codes::UNSUPPORTED_FORMAT));
        }

        let sample_format = self.device_sample_format(format)?;
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let fill = Arc::new(Mutex::new(FillState::new(completions)));
        let stream = self
            .build_stream(&config, sample_format, Arc::clone(&fill))
            .map_err(|e| {
                log::error!("failed to build input stream on {}: {}", self.device_name, e);
                CaptureError::backend(build_error_code(&e))
            })?;

        // Some hosts start streams on creation.
        if let Err(e) = stream.pause() {
            log::warn!("could not pause new stream on {}: {}", self.device_name, e);
        }

        self.next_handle += 1;
        let handle = StreamHandle::new(self.next_handle);
        log::debug!(
            "opened {} on {} ({:?} device samples)",
            handle,
            self.device_name,
            sample_format
        );
        self.open = Some(OpenStream { handle, stream, fill });
        Ok(handle)
    }

    fn allocate_buffer(&mut self, stream: StreamHandle, capacity: usize) -> Result<Box<[u8]>, CaptureError> {
        self.stream(stream)?;
        Ok(vec![0u8; capacity].into_boxed_slice())
    }

    fn submit_buffer(&mut self, stream: StreamHandle, buffer: AudioBuffer) -> Result<(), SubmitRejected> {
        match self.stream(stream) {
            Ok(open) => {
                open.fill.lock().queue.push_back(buffer);
                Ok(())
            }
            Err(error) => Err(SubmitRejected { error, buffer }),
        }
    }

    fn start_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        let open = self.stream(stream)?;
        open.stream.play().map_err(|e| {
            log::error!("failed to start {}: {}", stream, e);
            CaptureError::backend(codes::DEVICE_UNAVAILABLE)
        })
    }

    fn stop_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        let open = self.stream(stream)?;
        let paused = open.stream.pause().map_err(|e| {
            log::error!("failed to stop {}: {}", stream, e);
            CaptureError::backend(codes::UNSPECIFIED)
        });
        // A partly filled front buffer is abandoned.
        open.fill.lock().offset = 0;
        paused
    }

    fn dispose_stream(&mut self, stream: StreamHandle) -> Result<(), CaptureError> {
        self.stream(stream)?;
        if let Some(open) = self.open.take() {
            // Dropping the cpal stream stops its callback before the buffers go.
            drop(open.stream);
            let mut fill = open.fill.lock();
            self.overrun_bytes += fill.overrun_bytes;
            let held = fill.queue.len();
            fill.queue.clear();
            log::debug!("disposed {}, dropped {} queued buffers", stream, held);
        }
        Ok(())
    }
}

/// Pick the device sample format to convert from, preferring native i16.
fn preferred_sample_format(candidates: impl IntoIterator<Item = SampleFormat>) -> Option<SampleFormat> {
    let mut best = None;
    for format in candidates {
        match format {
            SampleFormat::I16 => return Some(SampleFormat::I16),
            SampleFormat::F32 => best = Some(SampleFormat::F32),
            _ => {}
        }
    }
    best
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_MAX_SYMMETRIC).clamp(I16_MIN_F32, I16_MAX_F32) as i16
}

fn build_error_code(err: &BuildStreamError) -> i32 {
    match err {
        BuildStreamError::DeviceNotAvailable => codes::DEVICE_UNAVAILABLE,
        BuildStreamError::StreamConfigNotSupported | BuildStreamError::InvalidArgument => {
            codes::UNSUPPORTED_FORMAT
        }
        _ => codes::UNSPECIFIED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use pcm_capture_core::processing::buffer_pool::BufferPool;
    use pcm_capture_core::RunLoop;

    #[test]
    fn prefers_native_i16() {
        let formats = [SampleFormat::F32, SampleFormat::U8, SampleFormat::I16];
        assert_eq!(preferred_sample_format(formats), Some(SampleFormat::I16));
        assert_eq!(
            preferred_sample_format([SampleFormat::U16, SampleFormat::F32]),
            Some(SampleFormat::F32)
        );
        assert_eq!(preferred_sample_format([SampleFormat::U8]), None);
    }

    #[test]
    fn float_conversion_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
        assert_eq!(f32_to_i16(4.0), i16::MAX);
        assert_eq!(f32_to_i16(-4.0), i16::MIN);
    }

    /// Two submitted buffers of `capacity` bytes, as the pool would hand them out.
    fn fill_with_buffers(capacity: usize) -> (FillState, crossbeam::channel::Receiver<BufferCompletion>) {
        let (sender, receiver) = unbounded();
        let mut fill = FillState::new(sender);
        let mut backend = pcm_capture_core::mock::MockBackend::new();
        let run_loop = RunLoop::new();
        let stream = backend
            .open_input_stream(&AudioFormat::default(), run_loop.completion_sender())
            .unwrap();
        let mut pool = BufferPool::new(capacity);
        for _ in 0..2 {
            let id = pool.allocate(&mut backend, stream).unwrap();
            pool.submit(&mut backend, stream, id).unwrap();
        }
        while let Some(buffer) = backend.take_next() {
            fill.queue.push_back(buffer);
        }
        (fill, receiver)
    }

    #[test]
    fn fills_front_buffer_then_posts_it() {
        let (mut fill, completions) = fill_with_buffers(4);

        fill.push_samples([1i16, -2, 3]);

        let mut first = completions.try_recv().unwrap();
        assert_eq!(first.filled, 4);
        assert_eq!(first.buffer.storage_mut(), &[1, 0, 0xFE, 0xFF]);
        assert!(completions.try_recv().is_err());
        assert_eq!(fill.offset, 2);
        assert_eq!(fill.queue.len(), 1);
    }

    #[test]
    fn samples_without_buffers_count_as_overrun() {
        let (mut fill, completions) = fill_with_buffers(2);

        fill.push_samples([7i16, 8, 9, 10]);

        assert_eq!(completions.len(), 2);
        assert_eq!(fill.overrun_bytes, 4);
        assert!(fill.queue.is_empty());
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn default_device_opens_paused() {
        let mut backend = CpalInputBackend::default_device().unwrap();
        let run_loop = RunLoop::new();
        let stream = backend
            .open_input_stream(&AudioFormat::new(48000, 1, 16), run_loop.completion_sender())
            .unwrap();
        assert_eq!(run_loop.pending(), 0);
        backend.dispose_stream(stream).unwrap();
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn rejects_non_16_bit_output() {
        let mut backend = CpalInputBackend::default_device().unwrap();
        let run_loop = RunLoop::new();
        let err = backend
            .open_input_stream(&AudioFormat::new(48000, 1, 24), run_loop.completion_sender())
            .unwrap_err();
        assert_eq!(err, CaptureError::backend(codes::UNSUPPORTED_FORMAT));
    }
}
