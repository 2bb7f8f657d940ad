//! pcm-dump: capture from an input device and stream raw PCM to stdout.
//!
//! ```text
//! pcm-dump > capture.pcm
//! pcm-dump | ffplay -f s16le -ar 24000 -ac 2 -
//! ```
//! Runs until SIGINT or SIGTERM. Logs go to stderr (`RUST_LOG`, default `info`).

mod settings;
mod signals;
mod summary;

use std::process::ExitCode;
use std::time::Instant;

use pcm_capture_core::{CaptureEngine, CaptureError, RunLoop, StreamSink};
use pcm_capture_cpal::CpalInputBackend;

use settings::DumpSettings;
use summary::DumpSummary;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let extra: Vec<String> = std::env::args().skip(1).collect();
    if !extra.is_empty() {
        log::warn!("ignoring unexpected arguments: {}", extra.join(" "));
    }

    let result = run();
    if let Err(ref e) = result {
        log::error!("pcm-dump: {}", e);
    }
    ExitCode::from(exit_status(&result))
}

/// Any error, at setup or teardown, makes the process exit with status 1.
fn exit_status(result: &Result<(), CaptureError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn run() -> Result<(), CaptureError> {
    let settings = DumpSettings::from_env()?;

    let backend = match settings.device {
        Some(ref name) => CpalInputBackend::with_device_name(name)?,
        None => CpalInputBackend::default_device()?,
    };
    log::info!("using input device {}", backend.device_name());

    let run_loop = RunLoop::new();
    signals::stop_on_signal(run_loop.stop_handle()).map_err(|e| {
        CaptureError::ConfigurationFailed(format!("failed to install signal handlers: {}", e))
    })?;

    let format = settings.config.format;
    let mut engine = CaptureEngine::new(backend, StreamSink::stdout());
    engine.configure(settings.config)?;
    engine.start(run_loop.completion_sender())?;
    eprintln!("pcm-dump: recording started");

    let started = Instant::now();
    let stopped = run_loop.run(&mut engine);

    let backend = engine.backend();
    let summary = DumpSummary::new(
        backend.device_name(),
        format,
        started.elapsed(),
        backend.overrun_bytes(),
        engine.diagnostics().clone(),
    );
    if summary.overrun_bytes > 0 {
        log::warn!(
            "{} bytes captured with no buffer to hold them were dropped",
            summary.overrun_bytes
        );
    }
    log::info!("summary: {}", summary.to_json());

    stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_capture_core::codes;

    #[test]
    fn clean_run_exits_zero() {
        assert_eq!(exit_status(&Ok(())), 0);
    }

    #[test]
    fn setup_failures_exit_non_zero() {
        let failures = [
            CaptureError::InvalidFormat("channel count must be positive".into()),
            CaptureError::backend(codes::DEVICE_UNAVAILABLE),
            CaptureError::ResourceExhausted("no memory".into()),
            CaptureError::ConfigurationFailed("PCM_DUMP_CHANNELS must be a non-negative integer".into()),
        ];
        for err in failures {
            assert_eq!(exit_status(&Err(err)), 1);
        }
    }
}
