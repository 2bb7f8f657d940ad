//! Environment overrides for the capture configuration.

use pcm_capture_core::{AudioFormat, CaptureConfiguration, CaptureError};

pub const SAMPLE_RATE_VAR: &str = "PCM_DUMP_SAMPLE_RATE";
pub const CHANNELS_VAR: &str = "PCM_DUMP_CHANNELS";
pub const BUFFER_COUNT_VAR: &str = "PCM_DUMP_BUFFER_COUNT";
pub const BUFFER_BYTES_VAR: &str = "PCM_DUMP_BUFFER_BYTES";
pub const DEVICE_VAR: &str = "PCM_DUMP_DEVICE";

/// What to capture and from where.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpSettings {
    pub config: CaptureConfiguration,
    /// Input device name; `None` means the host default.
    pub device: Option<String>,
}

impl DumpSettings {
    pub fn from_env() -> Result<Self, CaptureError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from `lookup`, starting at the defaults
    /// (24000 Hz stereo 16-bit, 3 x 4800 byte buffers).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CaptureError> {
        let defaults = CaptureConfiguration::default();
        let format = AudioFormat {
            sample_rate: parse_or(&lookup, SAMPLE_RATE_VAR, defaults.format.sample_rate)?,
            channels: parse_or(&lookup, CHANNELS_VAR, defaults.format.channels)?,
            ..defaults.format
        };

        let config = CaptureConfiguration {
            format,
            buffer_count: parse_or(&lookup, BUFFER_COUNT_VAR, defaults.buffer_count)?,
            buffer_capacity: parse_or(&lookup, BUFFER_BYTES_VAR, defaults.buffer_capacity)?,
        };

        let device = lookup(DEVICE_VAR)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self { config, device })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, CaptureError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            CaptureError::ConfigurationFailed(format!("{} must be a non-negative integer, got {:?}", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<DumpSettings, CaptureError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DumpSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_overrides() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.config, CaptureConfiguration::default());
        assert_eq!(s.device, None);
    }

    #[test]
    fn overrides_apply() {
        let s = settings(&[
            (SAMPLE_RATE_VAR, "48000"),
            (CHANNELS_VAR, " 1 "),
            (BUFFER_COUNT_VAR, "4"),
            (BUFFER_BYTES_VAR, "9600"),
            (DEVICE_VAR, "USB Mic"),
        ])
        .unwrap();

        assert_eq!(s.config.format, AudioFormat::new(48000, 1, 16));
        assert_eq!(s.config.buffer_count, 4);
        assert_eq!(s.config.buffer_capacity, 9600);
        assert_eq!(s.device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn unparsable_value_is_fatal() {
        let err = settings(&[(CHANNELS_VAR, "two")]).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert!(err.to_string().contains(CHANNELS_VAR));
    }

    #[test]
    fn blank_device_means_default() {
        let s = settings(&[(DEVICE_VAR, "  ")]).unwrap();
        assert_eq!(s.device, None);
    }
}
