//! A lock is a key `{resource}.lock` holding the owner's token, created with
//! a conditional set that expires on its own, and removed only by a
//! compare-and-delete carrying the same token.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use lockbox_backend::{BackendResult, KvBackend, LockStatus};
use tracing::{debug, trace};
use uuid::Uuid;

/// Suffix appended to a resource key to form its lock key.
pub const LOCK_SUFFIX: &str = ".lock";

/// Random value proving ownership of a lock.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Generates a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Token as stored in the lock record.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.0.as_bytes())
    }
}

impl From<String> for OwnerToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for OwnerToken {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

impl fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnerToken").field(&self.0).finish()
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of conditional-set attempts fitting into `max_wait`.
///
/// `floor(1_000_000 / spin_us) * max_wait_ms / 1000`, never less than one.
pub fn attempts(max_wait: Duration, spin_interval: Duration) -> u64 {
    let spin_us = spin_interval.as_micros().max(1);
    let per_second = 1_000_000 / spin_us;
    let attempts = per_second * max_wait.as_millis() / 1000;
    u64::try_from(attempts).unwrap_or(u64::MAX).max(1)
}

/// Builds the lock key guarding `resource`.
pub fn lock_key(resource: &str) -> String {
    format!("{resource}{LOCK_SUFFIX}")
}

/// Bounded-wait distributed lock.
///
/// `acquire` polls the backend every `spin_interval` until the lock is free
/// or the `max_wait` budget is spent. Contention is reported as `false`,
/// never as an error; backend failures propagate immediately and are not
/// retried.
///
/// The lock record expires `max_wait + 1ms` after it was taken, so a holder
/// that dies without releasing blocks others for at most one wait budget.
#[derive(Clone)]
pub struct SpinLock<B> {
    backend: B,
    max_wait: Duration,
    spin_interval: Duration,
}

impl<B> fmt::Debug for SpinLock<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("max_wait", &self.max_wait)
            .field("spin_interval", &self.spin_interval)
            .finish()
    }
}

impl<B> SpinLock<B>
where
    B: KvBackend,
{
    /// Creates a lock over `backend`.
    pub fn new(backend: B, max_wait: Duration, spin_interval: Duration) -> Self {
        Self {
            backend,
            max_wait,
            spin_interval,
        }
    }

    /// Backend holding the lock records.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Wait budget of [`acquire`](Self::acquire).
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Pause between two attempts.
    pub fn spin_interval(&self) -> Duration {
        self.spin_interval
    }

    /// Expiry given to a freshly acquired lock record.
    pub fn lock_ttl(&self) -> Duration {
        self.max_wait + Duration::from_millis(1)
    }

    /// Tries to take the lock on `resource` for `token`.
    ///
    /// Returns `Ok(false)` once every attempt found the lock held.
    #[tracing::instrument(name = "lock.acquire", skip_all, fields(resource = resource))]
    pub async fn acquire(&self, resource: &str, token: &OwnerToken) -> BackendResult<bool> {
        let key = lock_key(resource);
        let attempts = attempts(self.max_wait, self.spin_interval);
        let value = token.to_bytes();

        for attempt in 1..=attempts {
            match self
                .backend
                .set_nx(&key, value.clone(), self.lock_ttl())
                .await?
            {
                LockStatus::Acquired => {
                    debug!(attempt, "lock acquired");
                    return Ok(true);
                }
                LockStatus::Locked => {
                    trace!(attempt, attempts, "lock held elsewhere");
                    if attempt < attempts {
                        tokio::time::sleep(self.spin_interval).await;
                    }
                }
            }
        }

        debug!(attempts, "lock wait budget exhausted");
        Ok(false)
    }

    /// Releases the lock on `resource` if it is still owned by `token`.
    ///
    /// Returns whether a lock record was removed. A lock that expired or was
    /// taken over by another owner is left alone.
    #[tracing::instrument(name = "lock.release", skip_all, fields(resource = resource))]
    pub async fn release(&self, resource: &str, token: &OwnerToken) -> BackendResult<bool> {
        let status = self
            .backend
            .compare_and_delete(&lock_key(resource), token.as_str().as_bytes())
            .await?;
        if !status.is_deleted() {
            debug!("lock no longer owned, nothing released");
        }
        Ok(status.is_deleted())
    }
}
