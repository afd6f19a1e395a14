//! Moka backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lockbox_backend::{BackendLabel, BackendResult, DeleteStatus, KvBackend, LockStatus};
use moka::future::Cache;
use moka::ops::compute::Op;
use tracing::trace;

use crate::builder::MokaBackendBuilder;

/// Value stored in the cache together with its expiry deadline.
#[derive(Clone, Debug)]
pub(crate) struct StoredValue {
    pub(crate) data: Bytes,
    pub(crate) deadline: Option<Instant>,
}

impl StoredValue {
    fn new(data: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            data,
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self) -> bool {
        self.deadline.is_none_or(|deadline| deadline > Instant::now())
    }
}

/// In-process key-value backend powered by Moka.
///
/// Atomic operations (conditional set, expire, compare-and-delete) run inside
/// Moka's per-key `and_compute_with`, so they cannot interleave with other
/// writers of the same key.
///
/// # Caveats
///
/// - Data is **not persisted** and **not shared** across processes; use
///   Redis when several processes must see the same locks
/// - Entries past their deadline are reported as absent even if Moka has not
///   evicted them yet
#[derive(Clone)]
pub struct MokaBackend {
    pub(crate) cache: Cache<String, StoredValue>,
    pub(crate) label: BackendLabel,
}

impl std::fmt::Debug for MokaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaBackend")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MokaBackend {
    /// Creates a new builder with the specified maximum number of entries.
    pub fn builder(max_capacity: u64) -> MokaBackendBuilder {
        MokaBackendBuilder::new(max_capacity)
    }

    /// Approximate number of entries, including expired ones not yet evicted.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs Moka's pending maintenance (evictions, expirations) now.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl KvBackend for MokaBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        Ok(self
            .cache
            .get(key)
            .await
            .filter(StoredValue::is_live)
            .map(|value| value.data))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        self.cache
            .insert(key.to_owned(), StoredValue::new(value, ttl))
            .await;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus> {
        let mut status = LockStatus::Locked;
        self.cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().is_live() => Op::Nop,
                    _ => {
                        status = LockStatus::Acquired;
                        Op::Put(StoredValue::new(value, Some(ttl)))
                    }
                };
                std::future::ready(op)
            })
            .await;
        trace!(key, ?status, "conditional set");
        Ok(status)
    }

    async fn del(&self, key: &str) -> BackendResult<DeleteStatus> {
        match self.cache.remove(key).await {
            Some(value) if value.is_live() => Ok(DeleteStatus::Deleted(1)),
            _ => Ok(DeleteStatus::Missing),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        let mut updated = false;
        self.cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().is_live() => {
                        updated = true;
                        let data = entry.into_value().data;
                        Op::Put(StoredValue::new(data, Some(ttl)))
                    }
                    Some(_) => Op::Remove,
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(updated)
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        let mut status = DeleteStatus::Missing;
        self.cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if !entry.value().is_live() => Op::Remove,
                    Some(entry) if entry.value().data.as_ref() == expected => {
                        status = DeleteStatus::Deleted(1);
                        Op::Remove
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        trace!(key, ?status, "compare and delete");
        Ok(status)
    }

    fn label(&self) -> BackendLabel {
        self.label.clone()
    }
}
