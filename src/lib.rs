//! Report service readiness, status, and watchdog liveness to systemd.
//!
//! Messages go over the datagram socket named by `NOTIFY_SOCKET` (see
//! `sd_notify(3)`). When the service is not running under systemd, or on
//! platforms without Unix sockets, every report is a successful no-op, so
//! callers never need platform-specific code.
//!
//! ```no_run
//! # async fn start() -> Result<(), vigil::NotifyError> {
//! vigil::ready()?;
//! tokio::spawn(async { vigil::Watchdog::new().run_async(|| true).await });
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod error;
pub mod notify;
pub mod socket;
pub mod watchdog;

pub use env::{Environment, ProcessEnv};
pub use error::NotifyError;
pub use notify::{
    format_states, ready, reloading, report, status, stopping, Notifier, NotifyState,
};
pub use socket::NotifyAddress;
pub use watchdog::{interval, watchdog, HealthCheck, Watchdog};

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixDatagram;
    use std::time::Duration;
    use tempfile::tempdir;

    // The only test in the crate that touches the real process environment.
    #[test]
    fn test_process_env_entry_points() {
        std::env::remove_var("NOTIFY_SOCKET");
        std::env::remove_var("WATCHDOG_USEC");
        std::env::remove_var("WATCHDOG_PID");

        super::report("TEST=1").unwrap();
        assert_eq!(super::interval().unwrap(), None);
        super::watchdog(|| true).unwrap();

        std::env::set_var("NOTIFY_SOCKET", "");
        super::ready().unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("notify.socket");
        let listener = UnixDatagram::bind(&path).unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        std::env::set_var("NOTIFY_SOCKET", &path);

        let mut buf = [0u8; 128];
        super::status("ok").unwrap();
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"STATUS=ok");

        super::stopping().unwrap();
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"STOPPING=1");

        super::notify::watchdog().unwrap();
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"WATCHDOG=1");

        super::reloading().unwrap();
        let n = listener.recv(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"RELOADING=1\nMONOTONIC_USEC="));

        std::env::set_var("WATCHDOG_USEC", "30000000");
        assert_eq!(super::interval().unwrap(), Some(Duration::from_secs(30)));
        std::env::set_var("WATCHDOG_USEC", "invalid");
        assert!(super::interval().is_err());

        std::env::remove_var("NOTIFY_SOCKET");
        std::env::remove_var("WATCHDOG_USEC");
    }
}
