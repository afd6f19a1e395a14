//! Shared test helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lockbox::SessionOptions;
use lockbox_backend::{BackendError, BackendResult, DeleteStatus, KvBackend, LockStatus};
use lockbox_moka::MokaBackend;

/// Prints spans and events of the test when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn moka() -> MokaBackend {
    MokaBackend::builder(1_000).build()
}

/// Options with a short spin so contention resolves quickly in tests.
pub fn fast_options(lock_max_wait: Duration) -> SessionOptions {
    SessionOptions {
        gc_maxlifetime: 60,
        spin_lock_wait: 10_000,
        lock_max_wait,
        ..SessionOptions::default()
    }
}

/// Backend that fails every command with a connection error and counts calls.
#[derive(Clone, Default)]
pub struct FailingBackend {
    calls: Arc<AtomicUsize>,
}

impl FailingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> BackendResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::ConnectionError(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ))))
    }
}

#[async_trait]
impl KvBackend for FailingBackend {
    async fn get(&self, _key: &str) -> BackendResult<Option<Bytes>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Option<Duration>) -> BackendResult<()> {
        self.fail()
    }

    async fn set_nx(&self, _key: &str, _value: Bytes, _ttl: Duration) -> BackendResult<LockStatus> {
        self.fail()
    }

    async fn del(&self, _key: &str) -> BackendResult<DeleteStatus> {
        self.fail()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> BackendResult<bool> {
        self.fail()
    }

    async fn compare_and_delete(
        &self,
        _key: &str,
        _expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        self.fail()
    }
}
