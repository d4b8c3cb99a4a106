/// Lifecycle and status reports to the supervisor (see `sd_notify(3)`).
///
/// Every report re-reads `NOTIFY_SOCKET`. When it is unset or empty the
/// service is not running under a supervisor and reports succeed without
/// doing any I/O.
use crate::env::{Environment, ProcessEnv, NOTIFY_SOCKET};
use crate::error::NotifyError;
use crate::socket::{self, NotifyAddress};
use std::fmt;

/// A single `KEY=VALUE` field of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyState {
    /// `READY=1`: startup is finished.
    Ready,
    /// `RELOADING=1`: the service is reloading its configuration.
    Reloading,
    /// `STOPPING=1`: the service is shutting down.
    Stopping,
    /// `WATCHDOG=1`: a liveness pulse.
    Watchdog,
    /// `STATUS=...`: free-form status text, sent verbatim.
    Status(String),
    /// `MONOTONIC_USEC=...`: the `CLOCK_MONOTONIC` time of a reload.
    MonotonicUsec(u64),
    /// `MAINPID=...`: the main process of the service.
    MainPid(u32),
    /// `ERRNO=...`: an errno-style failure code.
    Errno(i32),
    /// `EXTEND_TIMEOUT_USEC=...`: ask for more time to finish the current transition.
    ExtendTimeoutUsec(u64),
}

impl fmt::Display for NotifyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyState::Ready => write!(f, "READY=1"),
            NotifyState::Reloading => write!(f, "RELOADING=1"),
            NotifyState::Stopping => write!(f, "STOPPING=1"),
            NotifyState::Watchdog => write!(f, "WATCHDOG=1"),
            NotifyState::Status(text) => write!(f, "STATUS={text}"),
            NotifyState::MonotonicUsec(usec) => write!(f, "MONOTONIC_USEC={usec}"),
            NotifyState::MainPid(pid) => write!(f, "MAINPID={pid}"),
            NotifyState::Errno(errno) => write!(f, "ERRNO={errno}"),
            NotifyState::ExtendTimeoutUsec(usec) => write!(f, "EXTEND_TIMEOUT_USEC={usec}"),
        }
    }
}

/// Join states into one newline-delimited message.
pub fn format_states(states: &[NotifyState]) -> String {
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sends notifications using the socket named by an [`Environment`].
#[derive(Debug, Clone, Default)]
pub struct Notifier<E = ProcessEnv> {
    env: E,
}

impl Notifier<ProcessEnv> {
    /// A notifier reading the process environment.
    pub fn new() -> Self {
        Self { env: ProcessEnv }
    }
}

impl<E: Environment> Notifier<E> {
    /// A notifier reading configuration from `env`.
    pub fn with_env(env: E) -> Self {
        Self { env }
    }

    /// The configuration source.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The currently configured socket, or `None` when reporting is disabled.
    pub fn address(&self) -> Option<NotifyAddress> {
        self.env
            .var(NOTIFY_SOCKET)
            .and_then(|value| NotifyAddress::parse(&value))
    }

    /// Send `message` to the supervisor as a single datagram.
    pub fn report(&self, message: &str) -> Result<(), NotifyError> {
        if !socket::SUPPORTED {
            return Ok(());
        }
        let Some(address) = self.address() else {
            tracing::debug!(state = message, "notify socket not configured, skipping report");
            return Ok(());
        };
        socket::send(&address, message.as_bytes())
    }

    /// Send several fields as one message.
    pub fn report_states(&self, states: &[NotifyState]) -> Result<(), NotifyError> {
        self.report(&format_states(states))
    }

    /// Report that startup has finished.
    pub fn ready(&self) -> Result<(), NotifyError> {
        self.report_states(&[NotifyState::Ready])
    }

    /// Report that the service is reloading. Report [`Notifier::ready`] once
    /// the reload is done so the reload job does not time out.
    pub fn reloading(&self) -> Result<(), NotifyError> {
        if !socket::SUPPORTED {
            return Ok(());
        }
        let usec = socket::monotonic_usec()?;
        self.report_states(&[NotifyState::Reloading, NotifyState::MonotonicUsec(usec)])
    }

    /// Report a human-readable status line.
    pub fn status(&self, text: &str) -> Result<(), NotifyError> {
        self.report_states(&[NotifyState::Status(text.to_string())])
    }

    /// Report that the service is shutting down.
    pub fn stopping(&self) -> Result<(), NotifyError> {
        self.report_states(&[NotifyState::Stopping])
    }

    /// Report that the service is alive.
    pub fn watchdog(&self) -> Result<(), NotifyError> {
        self.report_states(&[NotifyState::Watchdog])
    }
}

/// Send `message` using the process environment.
pub fn report(message: &str) -> Result<(), NotifyError> {
    Notifier::new().report(message)
}

/// Send `READY=1` using the process environment.
pub fn ready() -> Result<(), NotifyError> {
    Notifier::new().ready()
}

/// Send `RELOADING=1` with the current monotonic time using the process environment.
pub fn reloading() -> Result<(), NotifyError> {
    Notifier::new().reloading()
}

/// Send `STATUS=<text>` using the process environment.
pub fn status(text: &str) -> Result<(), NotifyError> {
    Notifier::new().status(text)
}

/// Send `STOPPING=1` using the process environment.
pub fn stopping() -> Result<(), NotifyError> {
    Notifier::new().stopping()
}

/// Send `WATCHDOG=1` using the process environment.
pub fn watchdog() -> Result<(), NotifyError> {
    Notifier::new().watchdog()
}
