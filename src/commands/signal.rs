//! Shutdown signals for the long-running subcommands.
//!
//! Handlers are installed when [`ShutdownSignal::new`] returns, so a SIGTERM
//! that arrives while the launcher is still loading weights is not lost and
//! does not kill the process before the launcher is torn down.

use std::future::Future;

/// Ctrl+C, plus SIGTERM on unix (sent by container runtimes when recycling).
#[derive(Debug)]
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the handlers. Must be called inside the tokio runtime.
    #[cfg(unix)]
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal and return its name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl+C",
            Err(_) => std::future::pending().await,
        }
    }
}

/// Drive `work` to completion unless a shutdown signal arrives first.
///
/// Returns `None` when interrupted; `work` is dropped at that point.
pub async fn until_shutdown<F, T>(work: F, signal: &mut ShutdownSignal) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        output = work => Some(output),
        name = signal.recv() => {
            tracing::info!(signal = name, "received shutdown signal");
            None
        }
    }
}
