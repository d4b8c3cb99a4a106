/// Health probe for `vigil watch`.
///
/// The service is healthy while the watched process is alive and the stop
/// file (if any) does not exist. With neither configured it is always healthy.
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct Probe {
    pid: Option<i32>,
    stop_file: Option<PathBuf>,
}

impl Probe {
    pub fn new(pid: Option<i32>, stop_file: Option<PathBuf>) -> Self {
        Self { pid, stop_file }
    }

    pub fn healthy(&self) -> bool {
        if let Some(stop_file) = &self.stop_file {
            if stop_file.exists() {
                tracing::warn!(path = %stop_file.display(), "stop file present");
                return false;
            }
        }
        if let Some(pid) = self.pid {
            if !process_alive(pid) {
                tracing::warn!(pid, "watched process is gone");
                return false;
            }
        }
        true
    }
}

/// Signal 0 checks for existence without delivering anything. EPERM means the
/// process exists but belongs to someone else.
#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_probe_is_healthy() {
        assert!(Probe::default().healthy());
    }

    #[test]
    fn test_stop_file_marks_unhealthy() {
        let dir = tempdir().unwrap();
        let stop = dir.path().join("STOP");
        let probe = Probe::new(None, Some(stop.clone()));
        assert!(probe.healthy());

        std::fs::write(&stop, "").unwrap();
        assert!(!probe.healthy());
    }

    #[test]
    fn test_own_process_is_alive() {
        let probe = Probe::new(Some(std::process::id() as i32), None);
        assert!(probe.healthy());
    }

    #[cfg(unix)]
    #[test]
    fn test_exited_process_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        assert!(!Probe::new(Some(pid), None).healthy());
    }
}
