use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::format::AudioFormat;

/// Default number of buffers rotated between backend and sink.
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Default buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4800;

/// Largest buffer capacity `validate` accepts, in bytes (16 MiB).
pub const MAX_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfiguration {
    /// PCM layout requested from the backend (default: 24000 Hz, 2 ch, 16 bit).
    pub format: AudioFormat,

    /// Number of buffers in the pool (default: 3).
    pub buffer_count: usize,

    /// Capacity of each buffer in bytes (default: 4800).
    /// Must be a whole number of frames.
    pub buffer_capacity: usize,
}

impl CaptureConfiguration {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Size the buffers to hold `duration` of audio, rounded down to whole
    /// frames and never below one frame.
    pub fn with_buffer_duration(mut self, duration: Duration) -> Self {
        self.buffer_capacity = capacity_for_duration(&self.format, duration);
        self
    }

    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.buffer_count = count;
        self
    }

    /// Validates format first, then the pool geometry.
    pub fn validate(&self) -> Result<(), CaptureError> {
        self.format.validate()?;

        if self.buffer_count == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "buffer count must be at least 1".into(),
            ));
        }
        let frame = self.format.bytes_per_frame();
        if self.buffer_capacity < frame {
            return Err(CaptureError::ConfigurationFailed(format!(
                "buffer capacity {} is smaller than one frame ({} bytes)",
                self.buffer_capacity, frame
            )));
        }
        if self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(CaptureError::ConfigurationFailed(format!(
                "buffer capacity {} exceeds the {} byte limit",
                self.buffer_capacity, MAX_BUFFER_CAPACITY
            )));
        }
        if self.buffer_capacity % frame != 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "buffer capacity {} is not a multiple of the frame size ({} bytes)",
                self.buffer_capacity, frame
            )));
        }
        Ok(())
    }

    /// Audio held by one full buffer.
    pub fn buffer_duration(&self) -> Duration {
        self.format.duration_of(self.buffer_capacity)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            buffer_count: DEFAULT_BUFFER_COUNT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Bytes needed for `duration` of audio, in whole frames (at least one).
///
/// Saturates at the largest whole-frame size a `usize` can hold; `validate`
/// rejects anything above [`MAX_BUFFER_CAPACITY`].
pub fn capacity_for_duration(format: &AudioFormat, duration: Duration) -> usize {
    let frame = format.bytes_per_frame().max(1);
    let frames = (duration.as_secs_f64() * f64::from(format.sample_rate)) as usize;
    frames
        .max(1)
        .checked_mul(frame)
        .unwrap_or(usize::MAX / frame * frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dump_tool() {
        let config = CaptureConfiguration::default();
        assert_eq!(config.format, AudioFormat::new(24000, 2, 16));
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.buffer_capacity, 4800);
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_duration(), Duration::from_millis(50));
    }

    #[test]
    fn capacity_from_duration() {
        let config = CaptureConfiguration::default().with_buffer_duration(Duration::from_millis(100));
        assert_eq!(config.buffer_capacity, 9600);

        let mono = AudioFormat::new(16000, 1, 16);
        assert_eq!(capacity_for_duration(&mono, Duration::from_millis(20)), 640);
        assert_eq!(capacity_for_duration(&mono, Duration::ZERO), 2);
    }

    #[test]
    fn format_errors_win_over_pool_errors() {
        let config = CaptureConfiguration {
            format: AudioFormat::new(0, 2, 16),
            buffer_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CaptureError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_bad_pool_geometry() {
        let empty_pool = CaptureConfiguration::default().with_buffer_count(0);
        assert!(matches!(empty_pool.validate(), Err(CaptureError::ConfigurationFailed(_))));

        let ragged = CaptureConfiguration {
            buffer_capacity: 4801,
            ..Default::default()
        };
        assert!(matches!(ragged.validate(), Err(CaptureError::ConfigurationFailed(_))));

        let tiny = CaptureConfiguration {
            buffer_capacity: 2,
            ..Default::default()
        };
        assert!(matches!(tiny.validate(), Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn huge_duration_saturates_and_fails_validation() {
        let config = CaptureConfiguration::new(AudioFormat::default()).with_buffer_duration(Duration::MAX);

        assert_eq!(config.buffer_capacity % config.format.bytes_per_frame(), 0);
        assert!(matches!(config.validate(), Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn capacity_limit_is_inclusive() {
        let at_limit = CaptureConfiguration {
            buffer_capacity: MAX_BUFFER_CAPACITY,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());

        let over = CaptureConfiguration {
            buffer_capacity: MAX_BUFFER_CAPACITY + 4,
            ..Default::default()
        };
        assert!(matches!(over.validate(), Err(CaptureError::ConfigurationFailed(_))));
    }
}
