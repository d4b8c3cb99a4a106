use std::num::ParseIntError;

/// Errors raised while reporting to the supervisor or running the watchdog.
#[derive(Debug)]
pub enum NotifyError {
    /// An environment variable was set but could not be parsed.
    InvalidVariable {
        name: &'static str,
        value: String,
        source: ParseIntError,
    },
    /// Failed to open or connect the notify socket.
    Open {
        address: String,
        source: std::io::Error,
    },
    /// Failed to write the message to the notify socket.
    Write {
        address: String,
        source: std::io::Error,
    },
    /// The monotonic clock could not be read.
    Clock { source: std::io::Error },
    /// The health check reported the service is unhealthy.
    Unhealthy,
    /// A watchdog pulse could not be delivered.
    Pulse { source: Box<NotifyError> },
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::InvalidVariable { name, value, source } => {
                write!(f, "failed to parse {} value {:?}: {}", name, value, source)
            }
            NotifyError::Open { address, source } => {
                write!(f, "failed to open notify socket {}: {}", address, source)
            }
            NotifyError::Write { address, source } => {
                write!(
                    f,
                    "failed to write state to notify socket {}: {}",
                    address, source
                )
            }
            NotifyError::Clock { source } => {
                write!(f, "failed to read the monotonic clock: {}", source)
            }
            NotifyError::Unhealthy => write!(f, "the service reported it is unhealthy"),
            NotifyError::Pulse { source } => {
                write!(f, "failed to send watchdog notification: {}", source)
            }
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::InvalidVariable { source, .. } => Some(source),
            NotifyError::Open { source, .. } => Some(source),
            NotifyError::Write { source, .. } => Some(source),
            NotifyError::Clock { source } => Some(source),
            NotifyError::Unhealthy => None,
            NotifyError::Pulse { source } => Some(source.as_ref()),
        }
    }
}
