//! Termination signals → run loop stop.

use std::io;
use std::thread;

use pcm_capture_core::StopHandle;

#[cfg(unix)]
struct Signals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl-C"
    }
}

/// Request a stop on `stop` when SIGINT or SIGTERM arrives.
///
/// Handlers are installed before this returns, so a signal sent right after
/// is not missed. Waiting happens on a dedicated thread running a
/// current-thread tokio runtime; the capture thread is never interrupted.
pub fn stop_on_signal(stop: StopHandle) -> io::Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut signals = runtime.block_on(async { Signals::install() })?;

    thread::Builder::new()
        .name("pcm-dump-signals".into())
        .spawn(move || {
            let name = runtime.block_on(signals.recv());
            log::info!("received {}, stopping capture", name);
            stop.request_stop();
        })
}
