/// Signal handling for graceful shutdown of `vigil watch`.
///
/// SIGINT (Ctrl-C) and SIGTERM both end the watchdog loop cleanly so the
/// supervisor receives STOPPING=1 before the process exits.
use std::fmt;

/// Which signal asked us to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

pub struct SignalHandler {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl SignalHandler {
    /// Register the handlers. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<SignalHandler> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(SignalHandler {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<SignalHandler> {
        Ok(SignalHandler {})
    }

    /// Wait for the next shutdown signal.
    #[cfg(unix)]
    pub async fn recv(mut self) -> ShutdownSignal {
        let signal = tokio::select! {
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
        };
        tracing::info!(%signal, "shutdown signal received");
        signal
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> ShutdownSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::Interrupt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending().await
            }
        }
    }
}
