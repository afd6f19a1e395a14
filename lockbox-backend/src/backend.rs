use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BackendError, BackendLabel, DeleteStatus, LockStatus};

/// Result of a backend command.
pub type BackendResult<T> = Result<T, BackendError>;

/// Type-erased backend shared between handlers and spawned cleanup tasks.
pub type SharedBackend = Arc<dyn KvBackend + Send + 'static>;

/// Capability interface of the key-value store.
///
/// Everything the spin lock and the session handler need from the store.
/// Conditional set and compare-and-delete must each be atomic on the
/// backend side: no implementation may emulate them with a client-side
/// read followed by a write.
#[async_trait]
pub trait KvBackend: Sync + Send {
    /// Returns the raw value, or `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>>;

    /// Unconditionally stores `value`.
    ///
    /// With `ttl` the key expires after that many whole seconds.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()>;

    /// Stores `value` only if `key` does not exist, expiring after `ttl`
    /// with millisecond precision.
    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus>;

    /// Removes `key`, reporting whether it existed.
    async fn del(&self, key: &str) -> BackendResult<DeleteStatus>;

    /// Resets the expiry of an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool>;

    /// Deletes `key` only if its current value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &[u8])
    -> BackendResult<DeleteStatus>;

    /// Returns the label of this backend, used in logs and metrics.
    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("backend")
    }
}

#[async_trait]
impl KvBackend for &dyn KvBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        (*self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        (*self).set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus> {
        (*self).set_nx(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> BackendResult<DeleteStatus> {
        (*self).del(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        (*self).expire(key, ttl).await
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        (*self).compare_and_delete(key, expected).await
    }

    fn label(&self) -> BackendLabel {
        (*self).label()
    }
}

#[async_trait]
impl KvBackend for Box<dyn KvBackend> {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus> {
        (**self).set_nx(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> BackendResult<DeleteStatus> {
        (**self).del(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        (**self).expire(key, ttl).await
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        (**self).compare_and_delete(key, expected).await
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }
}

#[async_trait]
impl KvBackend for SharedBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus> {
        (**self).set_nx(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> BackendResult<DeleteStatus> {
        (**self).del(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        (**self).expire(key, ttl).await
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        (**self).compare_and_delete(key, expected).await
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }
}
