//! Command logging decorator.
//!
//! [`LoggingBackend`] wraps any [`KvBackend`] and records every command it
//! forwards: the command name, the key, how long it took, which connection
//! served it and whether it failed. Records go to a shared [`CommandLog`] and
//! to `tracing`. With the `metrics` feature enabled the same observations are
//! exported as metrics.
//!
//! ```
//! use lockbox_backend::{CommandLog, LoggingBackend};
//! # use lockbox_backend::KvBackend;
//! # fn wrap<B: KvBackend>(backend: B) {
//! let log = CommandLog::new(100);
//! let backend = LoggingBackend::with_log(backend, log.clone());
//! // ... later
//! for record in log.records() {
//!     println!("{} {} {:?}", record.command, record.key, record.duration);
//! }
//! # }
//! ```

use std::{
    collections::VecDeque,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error};

use crate::{BackendLabel, BackendResult, DeleteStatus, KvBackend, LockStatus, metrics};

const DEFAULT_CAPACITY: usize = 1000;

/// One command observed by [`LoggingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    /// Command name, e.g. `GET` or `SET NX`.
    pub command: &'static str,
    /// Key the command targeted.
    pub key: String,
    /// Wall-clock time spent in the backend.
    pub duration: Duration,
    /// Label of the backend that served the command.
    pub connection: BackendLabel,
    /// Error message when the command failed.
    pub error: Option<String>,
}

/// Bounded, shareable history of executed commands.
///
/// Cloning is cheap and clones observe the same history. Once `capacity`
/// records are stored, the oldest record is dropped for each new one.
#[derive(Debug, Clone)]
pub struct CommandLog {
    records: Arc<Mutex<VecDeque<CommandRecord>>>,
    capacity: usize,
}

impl CommandLog {
    /// Creates an empty log keeping at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)))),
            capacity,
        }
    }

    /// Appends a record, evicting the oldest one when full.
    pub fn record(&self, record: CommandRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot of the stored records, oldest first.
    pub fn records(&self) -> Vec<CommandRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when nothing has been recorded, or everything was cleared.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of stored records that carry an error.
    pub fn error_count(&self) -> usize {
        self.lock().iter().filter(|r| r.error.is_some()).count()
    }

    /// Total time spent in the stored commands.
    pub fn total_duration(&self) -> Duration {
        self.lock().iter().map(|r| r.duration).sum()
    }

    /// Drops every stored record.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CommandRecord>> {
        // A panic while holding the guard cannot leave the deque half-written.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Decorator that logs and times every command of the wrapped backend.
///
/// Results and errors are returned untouched.
#[derive(Debug, Clone)]
pub struct LoggingBackend<B> {
    inner: B,
    log: CommandLog,
}

impl<B> LoggingBackend<B>
where
    B: KvBackend,
{
    /// Wraps `inner` with a fresh [`CommandLog`] of default capacity.
    pub fn new(inner: B) -> Self {
        Self::with_log(inner, CommandLog::default())
    }

    /// Wraps `inner`, recording into an existing (possibly shared) log.
    pub fn with_log(inner: B, log: CommandLog) -> Self {
        Self { inner, log }
    }

    /// The log this decorator writes to.
    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Unwraps the decorator. The log stays shared with its other clones.
    pub fn into_inner(self) -> B {
        self.inner
    }

    async fn observe<T, F>(&self, command: &'static str, key: &str, fut: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        let connection = self.inner.label();
        let start = Instant::now();
        let result = fut.await;
        let duration = start.elapsed();

        metrics::record_command(connection.as_str(), command, duration);
        let error = match &result {
            Ok(_) => {
                debug!(
                    backend = %connection,
                    command,
                    key,
                    duration_ms = duration.as_secs_f64() * 1000.0,
                    "backend command"
                );
                None
            }
            Err(err) => {
                metrics::record_command_error(connection.as_str(), command);
                error!(
                    backend = %connection,
                    command,
                    key,
                    duration_ms = duration.as_secs_f64() * 1000.0,
                    error = %err,
                    "backend command failed"
                );
                Some(err.to_string())
            }
        };

        self.log.record(CommandRecord {
            command,
            key: key.to_owned(),
            duration,
            connection,
            error,
        });
        result
    }
}

#[async_trait]
impl<B> KvBackend for LoggingBackend<B>
where
    B: KvBackend,
{
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        self.observe("GET", key, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        let command = if ttl.is_some() { "SETEX" } else { "SET" };
        self.observe(command, key, self.inner.set(key, value, ttl))
            .await
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus> {
        self.observe("SET NX", key, self.inner.set_nx(key, value, ttl))
            .await
    }

    async fn del(&self, key: &str) -> BackendResult<DeleteStatus> {
        self.observe("DEL", key, self.inner.del(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        self.observe("EXPIRE", key, self.inner.expire(key, ttl))
            .await
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        self.observe(
            "EVAL",
            key,
            self.inner.compare_and_delete(key, expected),
        )
        .await
    }

    fn label(&self) -> BackendLabel {
        self.inner.label()
    }
}
