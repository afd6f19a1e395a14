use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options of the [`LockingSessionHandler`](crate::LockingSessionHandler).
///
/// Field names follow the usual session ini settings, so an existing
/// configuration can be carried over as is.
///
/// ```
/// use std::time::Duration;
/// use lockbox::SessionOptions;
///
/// let options = SessionOptions {
///     gc_maxlifetime: 600,
///     cookie_lifetime: 3600,
///     ..SessionOptions::default()
/// };
/// assert_eq!(options.ttl(), Some(Duration::from_secs(3600)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionOptions {
    /// Session lifetime in seconds.
    pub gc_maxlifetime: u64,
    /// Cookie lifetime in seconds; raises the session lifetime when larger.
    pub cookie_lifetime: u64,
    /// Namespace prepended to session ids to form keys.
    pub prefix: String,
    /// Whether reads take the per-session lock.
    pub locking: bool,
    /// Pause between lock attempts, in microseconds.
    pub spin_lock_wait: u64,
    /// Upper bound on lock waits and on lock lifetime (e.g. "30s", "500ms").
    #[serde(with = "humantime_serde")]
    pub lock_max_wait: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            gc_maxlifetime: 1440,
            cookie_lifetime: 0,
            prefix: "session".to_owned(),
            locking: true,
            spin_lock_wait: 150_000,
            lock_max_wait: Duration::from_secs(30),
        }
    }
}

impl SessionOptions {
    /// Session record lifetime, `None` when records never expire.
    pub fn ttl(&self) -> Option<Duration> {
        let ttl = self.gc_maxlifetime.max(self.cookie_lifetime);
        (ttl > 0).then(|| Duration::from_secs(ttl))
    }

    /// [`spin_lock_wait`](Self::spin_lock_wait) as a duration.
    pub fn spin_interval(&self) -> Duration {
        Duration::from_micros(self.spin_lock_wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = SessionOptions::default();
        assert_eq!(options.ttl(), Some(Duration::from_secs(1440)));
        assert_eq!(options.spin_interval(), Duration::from_millis(150));
        assert_eq!(options.prefix, "session");
        assert!(options.locking);
    }

    #[test]
    fn cookie_lifetime_only_raises_ttl() {
        let options = SessionOptions {
            gc_maxlifetime: 600,
            cookie_lifetime: 60,
            ..SessionOptions::default()
        };
        assert_eq!(options.ttl(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn zero_lifetimes_disable_expiry() {
        let options = SessionOptions {
            gc_maxlifetime: 0,
            cookie_lifetime: 0,
            ..SessionOptions::default()
        };
        assert_eq!(options.ttl(), None);
    }
}
