/// Supervisor watchdog loop.
///
/// Polls a caller-supplied health check every half of `WATCHDOG_USEC` (the
/// margin recommended by `sd_watchdog_enabled(3)`) and sends `WATCHDOG=1`
/// while the service stays healthy. The loop ends only when the service
/// reports it is unhealthy, a pulse cannot be delivered, or (for
/// [`Watchdog::run_until`]) the shutdown future completes.
use crate::env::{Environment, ProcessEnv, WATCHDOG_PID, WATCHDOG_USEC};
use crate::error::NotifyError;
use crate::notify::Notifier;
use crate::socket;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Answers "is the service still healthy?" for the watchdog.
///
/// Implemented for every `FnMut() -> bool`, so a closure is usually enough.
pub trait HealthCheck {
    fn healthy(&mut self) -> bool;
}

impl<F: FnMut() -> bool> HealthCheck for F {
    fn healthy(&mut self) -> bool {
        self()
    }
}

/// Runs the watchdog loop against the configuration in an [`Environment`].
#[derive(Debug, Clone, Default)]
pub struct Watchdog<E = ProcessEnv> {
    notifier: Notifier<E>,
    watched_pid: Option<u32>,
}

impl Watchdog<ProcessEnv> {
    /// A watchdog reading the process environment.
    pub fn new() -> Self {
        Self {
            notifier: Notifier::new(),
            watched_pid: None,
        }
    }
}

impl<E: Environment> Watchdog<E> {
    /// A watchdog reading configuration from `env`.
    pub fn with_env(env: E) -> Self {
        Self {
            notifier: Notifier::with_env(env),
            watched_pid: None,
        }
    }

    /// Also accept a `WATCHDOG_PID` naming `pid`, for a sidecar that vouches
    /// for another process (the service's main pid).
    pub fn for_pid(mut self, pid: u32) -> Self {
        self.watched_pid = Some(pid);
        self
    }

    /// The notifier used for pulses.
    pub fn notifier(&self) -> &Notifier<E> {
        &self.notifier
    }

    /// The configured watchdog timeout.
    ///
    /// Returns `Ok(None)` when the supervisor did not enable the watchdog for
    /// this process, and an error when `WATCHDOG_USEC` or `WATCHDOG_PID` is set
    /// but malformed.
    pub fn interval(&self) -> Result<Option<Duration>, NotifyError> {
        if !socket::SUPPORTED {
            return Ok(None);
        }

        let env = self.notifier.env();
        let Some(usec) = env.var(WATCHDOG_USEC) else {
            return Ok(None);
        };
        let usec = usec
            .parse::<u64>()
            .map_err(|source| NotifyError::InvalidVariable {
                name: WATCHDOG_USEC,
                value: usec.clone(),
                source,
            })?;

        if let Some(pid) = env.var(WATCHDOG_PID) {
            let pid = pid
                .parse::<u32>()
                .map_err(|source| NotifyError::InvalidVariable {
                    name: WATCHDOG_PID,
                    value: pid.clone(),
                    source,
                })?;
            if pid != std::process::id() && Some(pid) != self.watched_pid {
                debug!(pid, "watchdog is configured for another process");
                return Ok(None);
            }
        }

        Ok(Some(Duration::from_micros(usec)))
    }

    /// Time between pulses, or `None` if the watchdog is disabled.
    fn pulse_period(&self) -> Result<Option<Duration>, NotifyError> {
        match self.interval()? {
            Some(interval) if !interval.is_zero() => {
                let period = interval / 2;
                info!(
                    interval_ms = interval.as_millis() as u64,
                    period_ms = period.as_millis() as u64,
                    "watchdog enabled"
                );
                Ok(Some(period))
            }
            _ => {
                debug!("watchdog not enabled, nothing to do");
                Ok(None)
            }
        }
    }

    /// One loop iteration after the sleep: check health, then pulse.
    fn check<H: HealthCheck>(&self, health: &mut H) -> Result<(), NotifyError> {
        if !health.healthy() {
            warn!("service reported it is unhealthy, stopping watchdog");
            return Err(NotifyError::Unhealthy);
        }
        self.notifier.watchdog().map_err(|e| NotifyError::Pulse {
            source: Box::new(e),
        })?;
        debug!("watchdog pulse sent");
        Ok(())
    }

    /// Run the loop on the current thread. Blocks until the service is
    /// unhealthy or a pulse fails; returns `Ok(())` at once if the watchdog
    /// is not enabled.
    pub fn run<H: HealthCheck>(&self, mut health: H) -> Result<(), NotifyError> {
        let Some(period) = self.pulse_period()? else {
            return Ok(());
        };
        loop {
            std::thread::sleep(period);
            self.check(&mut health)?;
        }
    }

    /// Async version of [`Watchdog::run`], sleeping on the tokio timer.
    pub async fn run_async<H: HealthCheck>(&self, health: H) -> Result<(), NotifyError> {
        self.run_until(health, std::future::pending::<()>()).await
    }

    /// Like [`Watchdog::run_async`], but also returns `Ok(())` as soon as
    /// `shutdown` completes.
    pub async fn run_until<H, F>(&self, mut health: H, shutdown: F) -> Result<(), NotifyError>
    where
        H: HealthCheck,
        F: Future,
    {
        let Some(period) = self.pulse_period()? else {
            return Ok(());
        };
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("watchdog shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(period) => {}
            }
            self.check(&mut health)?;
        }
    }
}

/// The configured watchdog timeout from the process environment.
pub fn interval() -> Result<Option<Duration>, NotifyError> {
    Watchdog::new().interval()
}

/// Run the watchdog loop on the current thread using the process environment.
pub fn watchdog<H: HealthCheck>(healthy: H) -> Result<(), NotifyError> {
    Watchdog::new().run(healthy)
}
