/// Datagram transport to the supervisor's notify socket.
///
/// On Unix the message is sent over a fresh `SOCK_DGRAM` Unix socket that is
/// dropped (and therefore closed) before returning. Elsewhere there is no
/// supervisor integration and sending is a no-op.
use crate::error::NotifyError;
use std::fmt;
use std::path::PathBuf;

/// Where the supervisor listens for notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyAddress {
    /// A socket file on disk, e.g. `/run/systemd/notify`.
    Path(PathBuf),
    /// A Linux abstract-namespace socket, written as `@name` in the environment.
    Abstract(Vec<u8>),
}

impl NotifyAddress {
    /// Parse the value of `NOTIFY_SOCKET`. Empty values mean reporting is disabled.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        match value.strip_prefix('@') {
            Some(name) => Some(NotifyAddress::Abstract(name.as_bytes().to_vec())),
            None => Some(NotifyAddress::Path(PathBuf::from(value))),
        }
    }
}

impl fmt::Display for NotifyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyAddress::Path(path) => write!(f, "{}", path.display()),
            NotifyAddress::Abstract(name) => write!(f, "@{}", String::from_utf8_lossy(name)),
        }
    }
}

/// Whether this platform can talk to the supervisor at all.
#[cfg(unix)]
pub(crate) const SUPPORTED: bool = true;
#[cfg(not(unix))]
pub(crate) const SUPPORTED: bool = false;

/// Send `payload` to `address` as a single datagram.
#[cfg(unix)]
pub(crate) fn send(address: &NotifyAddress, payload: &[u8]) -> Result<(), NotifyError> {
    use socket2::{Domain, Socket, Type};

    let open_err = |source| NotifyError::Open {
        address: address.to_string(),
        source,
    };

    let sockaddr = sock_addr(address).map_err(open_err)?;
    let socket = Socket::new(Domain::UNIX, Type::DGRAM, None).map_err(open_err)?;
    socket.connect(&sockaddr).map_err(open_err)?;

    let sent = socket.send(payload).map_err(|e| NotifyError::Write {
        address: address.to_string(),
        source: e,
    })?;
    if sent != payload.len() {
        return Err(NotifyError::Write {
            address: address.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short datagram write ({sent} of {} bytes)", payload.len()),
            ),
        });
    }

    tracing::debug!(address = %address, bytes = sent, "sent notify datagram");
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn send(_address: &NotifyAddress, _payload: &[u8]) -> Result<(), NotifyError> {
    Ok(())
}

#[cfg(unix)]
fn sock_addr(address: &NotifyAddress) -> std::io::Result<socket2::SockAddr> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    match address {
        NotifyAddress::Path(path) => socket2::SockAddr::unix(path),
        NotifyAddress::Abstract(name) => {
            // Abstract names are a leading NUL byte followed by the name, with no terminator.
            let mut bytes = Vec::with_capacity(name.len() + 1);
            bytes.push(0);
            bytes.extend_from_slice(name);
            socket2::SockAddr::unix(Path::new(OsStr::from_bytes(&bytes)))
        }
    }
}

/// Read `CLOCK_MONOTONIC` in microseconds, the clock systemd compares reload stamps against.
#[cfg(unix)]
pub(crate) fn monotonic_usec() -> Result<u64, NotifyError> {
    use nix::time::{clock_gettime, ClockId};

    let now = clock_gettime(ClockId::CLOCK_MONOTONIC).map_err(|e| NotifyError::Clock {
        source: std::io::Error::from(e),
    })?;
    let secs = u64::try_from(now.tv_sec()).unwrap_or(0);
    let nanos = u64::try_from(now.tv_nsec()).unwrap_or(0);
    Ok(secs * 1_000_000 + nanos / 1_000)
}

#[cfg(not(unix))]
#[allow(dead_code)]
pub(crate) fn monotonic_usec() -> Result<u64, NotifyError> {
    Ok(0)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::net::UnixDatagram;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_parse_empty_is_disabled() {
        assert_eq!(NotifyAddress::parse(""), None);
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            NotifyAddress::parse("/run/systemd/notify"),
            Some(NotifyAddress::Path(PathBuf::from("/run/systemd/notify")))
        );
    }

    #[test]
    fn test_parse_abstract() {
        let addr = NotifyAddress::parse("@vigil/notify").unwrap();
        assert_eq!(addr, NotifyAddress::Abstract(b"vigil/notify".to_vec()));
        assert_eq!(addr.to_string(), "@vigil/notify");
    }

    #[test]
    fn test_send_delivers_exact_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notify.socket");
        let listener = UnixDatagram::bind(&path).unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        send(&NotifyAddress::Path(path), b"STATUS=ok").unwrap();

        let mut buf = [0u8; 1024];
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"STATUS=ok");
    }

    #[test]
    fn test_send_missing_socket_is_open_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.socket");
        let err = send(&NotifyAddress::Path(path), b"READY=1").unwrap_err();
        assert!(matches!(err, NotifyError::Open { .. }));
        assert!(err.to_string().contains("missing.socket"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_send_abstract_socket() {
        use std::os::linux::net::SocketAddrExt;
        use std::os::unix::net::SocketAddr;

        let name = format!("vigil-test-{}", std::process::id());
        let addr = SocketAddr::from_abstract_name(name.as_bytes()).unwrap();
        let listener = UnixDatagram::bind_addr(&addr).unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        send(&NotifyAddress::parse(&format!("@{name}")).unwrap(), b"READY=1").unwrap();

        let mut buf = [0u8; 64];
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"READY=1");
    }

    #[test]
    fn test_monotonic_usec_advances() {
        let first = monotonic_usec().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = monotonic_usec().unwrap();
        assert!(second > first);
    }
}
