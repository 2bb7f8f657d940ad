//! # pcm-capture-cpal
//!
//! Cross-platform input backend for pcm-capture, built on cpal.
//!
//! Provides:
//! - `CpalInputBackend`: `AudioBackend` over a cpal input stream (16-bit output)
//! - `DeviceEnumerator`: input device lookup and listing on the default host
//!
//! ## Usage
//! ```ignore
//! use pcm_capture_core::{CaptureConfiguration, CaptureEngine, RunLoop, StreamSink};
//! use pcm_capture_cpal::CpalInputBackend;
//!
//! let backend = CpalInputBackend::default_device()?;
//! let mut engine = CaptureEngine::new(backend, StreamSink::stdout());
//! let run_loop = RunLoop::new();
//! engine.configure(CaptureConfiguration::default())?;
//! engine.start(run_loop.completion_sender())?;
//! run_loop.run(&mut engine)?;
//! ```

pub mod cpal_input;
pub mod device_enumerator;

pub use cpal_input::CpalInputBackend;
pub use device_enumerator::{DeviceEnumerator, InputDevice};
