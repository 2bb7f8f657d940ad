use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Uncompressed linear PCM layout: signed integer, packed, little-endian,
/// one frame per packet.
///
/// Fields are public so callers can describe any layout; `validate` decides
/// whether it is usable. The format is fixed for a session once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second per channel.
    pub sample_rate: u32,

    /// Interleaved channels per frame.
    pub channels: u16,

    /// Bits per sample. Must be a multiple of 8.
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidFormat("sample rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(CaptureError::InvalidFormat("channel count must be positive".into()));
        }
        if self.bits_per_sample == 0 {
            return Err(CaptureError::InvalidFormat("bits per sample must be positive".into()));
        }
        if self.bits_per_sample % 8 != 0 {
            return Err(CaptureError::InvalidFormat(format!(
                "bits per sample must be byte aligned, got {}",
                self.bits_per_sample
            )));
        }
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    pub fn frames_per_packet(&self) -> usize {
        1
    }

    pub fn bytes_per_packet(&self) -> usize {
        self.bytes_per_frame() * self.frames_per_packet()
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame()
    }

    /// Playback duration of `bytes` of audio in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let rate = self.bytes_per_second();
        if rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / rate as f64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(24000, 2, 16)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, s{}le",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}
