/// Environment configuration source.
///
/// The notifier and watchdog read their settings through this trait on every
/// call rather than caching them, so a socket rotated by the supervisor across
/// a reload is picked up by the next report.
use std::collections::HashMap;

/// Socket address the supervisor listens on for notifications.
pub const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";
/// Watchdog timeout configured by the supervisor, in microseconds.
pub const WATCHDOG_USEC: &str = "WATCHDOG_USEC";
/// Process the watchdog timeout applies to.
pub const WATCHDOG_PID: &str = "WATCHDOG_PID";

/// A read-only lookup of string configuration values.
pub trait Environment {
    /// Return the value for `key`, or `None` if it is not set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_lookup() {
        let mut env = HashMap::new();
        env.insert(NOTIFY_SOCKET.to_string(), "/run/notify".to_string());
        assert_eq!(env.var(NOTIFY_SOCKET).as_deref(), Some("/run/notify"));
        assert_eq!(env.var(WATCHDOG_USEC), None);
    }

    #[test]
    fn test_reference_forwards_lookup() {
        let mut env = HashMap::new();
        env.insert(WATCHDOG_USEC.to_string(), "1000".to_string());
        let by_ref = &env;
        assert_eq!(by_ref.var(WATCHDOG_USEC).as_deref(), Some("1000"));
    }

    #[test]
    fn test_process_env_missing_variable() {
        assert_eq!(ProcessEnv.var("VIGIL_TEST_SURELY_UNSET_VARIABLE"), None);
    }
}
