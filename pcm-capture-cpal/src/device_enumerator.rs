//! Input device enumeration through the cpal default host.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use pcm_capture_core::models::error::{codes, CaptureError};

/// An input endpoint as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub name: String,
    pub is_default: bool,
    /// Native sample rate of the device's default input config, if it has one.
    pub default_sample_rate: Option<u32>,
    pub default_channels: Option<u16>,
}

/// Audio device enumerator over the platform's default cpal host.
pub struct DeviceEnumerator {
    host: Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Name of the host backend (ALSA, CoreAudio, WASAPI, ...).
    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    pub fn default_input_device(&self) -> Result<Device, CaptureError> {
        self.host.default_input_device().ok_or_else(|| {
            log::error!("no default input device on {}", self.host_name());
            CaptureError::backend(codes::DEVICE_UNAVAILABLE)
        })
    }

    pub fn default_input_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Find an input device by its exact name.
    pub fn find_input_device(&self, name: &str) -> Result<Device, CaptureError> {
        let devices = self.host.input_devices().map_err(|e| {
            log::error!("failed to list input devices: {}", e);
            CaptureError::backend(codes::DEVICE_UNAVAILABLE)
        })?;

        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }

        log::error!("input device {:?} not found", name);
        Err(CaptureError::backend(codes::DEVICE_UNAVAILABLE))
    }

    /// List active input devices. Devices whose name cannot be read are skipped.
    pub fn list_input_devices(&self) -> Result<Vec<InputDevice>, CaptureError> {
        let default_name = self.default_input_name();
        let devices = self.host.input_devices().map_err(|e| {
            log::error!("failed to list input devices: {}", e);
            CaptureError::backend(codes::DEVICE_UNAVAILABLE)
        })?;

        let mut result = Vec::new();
        for device in devices {
            let Ok(name) = device.name() else {
                continue;
            };
            let native = device.default_input_config().ok();
            result.push(InputDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                default_sample_rate: native.as_ref().map(|c| c.sample_rate().0),
                default_channels: native.as_ref().map(|c| c.channels()),
                name,
            });
        }
        Ok(result)
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires audio hardware"]
    fn lists_default_input() {
        let enumerator = DeviceEnumerator::new();
        let devices = enumerator.list_input_devices().unwrap();
        assert!(devices.iter().filter(|d| d.is_default).count() <= 1);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn unknown_device_is_unavailable() {
        let enumerator = DeviceEnumerator::new();
        let err = enumerator
            .find_input_device("no such device, surely")
            .err()
            .expect("expected DEVICE_UNAVAILABLE error");
        assert_eq!(err, CaptureError::backend(codes::DEVICE_UNAVAILABLE));
    }
}
