use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lockbox_backend::{BackendResult, KvBackend};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info_span, warn};

use crate::lock::{OwnerToken, SpinLock};
use crate::options::SessionOptions;

/// Result of reading a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Stored payload; empty when the session does not exist yet.
    Data(Bytes),
    /// The session lock is held by someone else and the wait budget ran out.
    ///
    /// No data is available. This is not the same as an empty session.
    Contended,
}

impl ReadOutcome {
    /// Payload of a successful read.
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            ReadOutcome::Data(data) => Some(data),
            ReadOutcome::Contended => None,
        }
    }

    /// Whether the read gave up on a held lock.
    pub fn is_contended(&self) -> bool {
        matches!(self, ReadOutcome::Contended)
    }
}

/// Lifecycle callbacks of a session storage.
///
/// A request opens the storage, reads its session, possibly writes or
/// destroys it, and closes the storage when done.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Prepares the storage. `save_path` and `name` are informational.
    async fn open(&self, save_path: &str, name: &str) -> BackendResult<bool>;

    /// Ends the request and releases whatever it holds. Idempotent.
    async fn close(&self) -> BackendResult<bool>;

    /// Reads a session, taking its lock first when locking is enabled.
    async fn read(&self, session_id: &str) -> BackendResult<ReadOutcome>;

    /// Stores a session. An empty payload destroys it.
    async fn write(&self, session_id: &str, data: Bytes) -> BackendResult<bool>;

    /// Deletes a session and releases its lock.
    async fn destroy(&self, session_id: &str) -> BackendResult<bool>;

    /// Removes stale sessions older than `max_lifetime`.
    async fn gc(&self, max_lifetime: Duration) -> BackendResult<bool>;

    /// Extends the lifetime of an unchanged session.
    async fn update_timestamp(&self, session_id: &str, data: &[u8]) -> BackendResult<bool>;

    /// Whether a session with this id has data.
    async fn validate_id(&self, session_id: &str) -> BackendResult<bool>;
}

/// Lock currently held by a handler.
struct HeldLock {
    resource: String,
    token: OwnerToken,
}

#[derive(Default)]
struct State {
    held: Option<HeldLock>,
    prefetched: Option<(String, ReadOutcome)>,
}

impl State {
    fn take_prefetched(&mut self, session_id: &str) -> Option<ReadOutcome> {
        match &self.prefetched {
            Some((id, _)) if id == session_id => self.prefetched.take().map(|(_, read)| read),
            _ => None,
        }
    }
}

/// Session handler storing sessions in a [`KvBackend`] under a lock.
///
/// Sessions live under `{prefix}{session_id}`. With locking enabled, the
/// first read of a session takes the lock `{prefix}{session_id}.lock` and
/// keeps it until [`close`](SessionHandler::close) or
/// [`destroy`](SessionHandler::destroy). Writes assume the lock was taken by
/// the preceding read and do not touch it.
///
/// One handler serves one request. If a handler is dropped while still
/// holding a lock, the release is spawned on the current tokio runtime; the
/// lock record also expires on its own after the configured wait budget.
pub struct LockingSessionHandler<B>
where
    B: KvBackend + Clone + 'static,
{
    lock: SpinLock<B>,
    prefix: String,
    ttl: Option<Duration>,
    locking: bool,
    state: Mutex<State>,
}

impl<B> fmt::Debug for LockingSessionHandler<B>
where
    B: KvBackend + Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockingSessionHandler")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("locking", &self.locking)
            .field("lock", &self.lock)
            .finish()
    }
}

impl<B> LockingSessionHandler<B>
where
    B: KvBackend + Clone + 'static,
{
    /// Creates a handler over `backend`.
    pub fn new(backend: B, options: SessionOptions) -> Self {
        let spin_interval = options.spin_interval();
        Self {
            lock: SpinLock::new(backend, options.lock_max_wait, spin_interval),
            ttl: options.ttl(),
            prefix: options.prefix,
            locking: options.locking,
            state: Mutex::new(State::default()),
        }
    }

    /// Backend sessions are stored in.
    pub fn backend(&self) -> &B {
        self.lock.backend()
    }

    /// Lifetime given to written sessions.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Key under which `session_id` is stored.
    pub fn session_key(&self, session_id: &str) -> String {
        format!("{}{}", self.prefix, session_id)
    }

    /// Whether this handler currently holds a session lock.
    pub async fn is_locked(&self) -> bool {
        self.state.lock().await.held.is_some()
    }

    /// Runs `body` and closes the handler afterwards, also when `body` fails.
    ///
    /// The error of `body` wins over an error raised while closing.
    pub async fn scoped<'a, F, Fut, T>(&'a self, body: F) -> BackendResult<T>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = BackendResult<T>> + 'a,
    {
        let result = body(self).await;
        let closed = self.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    async fn read_with(&self, state: &mut State, session_id: &str) -> BackendResult<ReadOutcome> {
        if let Some(read) = state.take_prefetched(session_id) {
            return Ok(read);
        }

        let key = self.session_key(session_id);
        if self.locking {
            if state.held.as_ref().is_some_and(|held| held.resource != key) {
                self.unlock(state).await?;
            }
            if state.held.is_none() {
                let token = OwnerToken::generate();
                if !self.lock.acquire(&key, &token).await? {
                    warn!(session_key = %key, "session is locked by another request");
                    return Ok(ReadOutcome::Contended);
                }
                state.held = Some(HeldLock {
                    resource: key.clone(),
                    token,
                });
            }
        }

        let data = self.backend().get(&key).await?.unwrap_or_default();
        Ok(ReadOutcome::Data(data))
    }

    async fn unlock(&self, state: &mut State) -> BackendResult<()> {
        if let Some(held) = state.held.take() {
            self.lock.release(&held.resource, &held.token).await?;
        }
        Ok(())
    }

    async fn destroy_with(&self, state: &mut State, session_id: &str) -> BackendResult<bool> {
        state.take_prefetched(session_id);
        self.backend().del(&self.session_key(session_id)).await?;
        self.unlock(state).await?;
        Ok(true)
    }
}

#[async_trait]
impl<B> SessionHandler for LockingSessionHandler<B>
where
    B: KvBackend + Clone + 'static,
{
    async fn open(&self, _save_path: &str, _name: &str) -> BackendResult<bool> {
        Ok(true)
    }

    #[tracing::instrument(name = "session.close", skip_all)]
    async fn close(&self) -> BackendResult<bool> {
        let mut state = self.state.lock().await;
        self.unlock(&mut state).await?;
        Ok(true)
    }

    #[tracing::instrument(name = "session.read", skip_all, fields(session_id = session_id))]
    async fn read(&self, session_id: &str) -> BackendResult<ReadOutcome> {
        let mut state = self.state.lock().await;
        self.read_with(&mut state, session_id).await
    }

    #[tracing::instrument(name = "session.write", skip_all, fields(session_id = session_id))]
    async fn write(&self, session_id: &str, data: Bytes) -> BackendResult<bool> {
        if data.is_empty() {
            debug!("empty payload, destroying session");
            let mut state = self.state.lock().await;
            return self.destroy_with(&mut state, session_id).await;
        }
        self.backend()
            .set(&self.session_key(session_id), data, self.ttl)
            .await?;
        Ok(true)
    }

    #[tracing::instrument(name = "session.destroy", skip_all, fields(session_id = session_id))]
    async fn destroy(&self, session_id: &str) -> BackendResult<bool> {
        let mut state = self.state.lock().await;
        self.destroy_with(&mut state, session_id).await
    }

    async fn gc(&self, _max_lifetime: Duration) -> BackendResult<bool> {
        // Records carry their own expiry.
        Ok(true)
    }

    async fn update_timestamp(&self, session_id: &str, _data: &[u8]) -> BackendResult<bool> {
        if let Some(ttl) = self.ttl {
            self.backend()
                .expire(&self.session_key(session_id), ttl)
                .await?;
        }
        Ok(true)
    }

    async fn validate_id(&self, session_id: &str) -> BackendResult<bool> {
        let mut state = self.state.lock().await;
        let read = self.read_with(&mut state, session_id).await?;
        let exists = read.data().is_some_and(|data| !data.is_empty());
        state.prefetched = Some((session_id.to_owned(), read));
        Ok(exists)
    }
}

impl<B> Drop for LockingSessionHandler<B>
where
    B: KvBackend + Clone + 'static,
{
    fn drop(&mut self) {
        let Some(held) = self.state.get_mut().held.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                resource = %held.resource,
                "handler dropped outside a runtime, lock left to expire"
            );
            return;
        };

        let lock = self.lock.clone();
        let span = info_span!("session.release_on_drop", resource = %held.resource);
        runtime.spawn(
            async move {
                if let Err(err) = lock.release(&held.resource, &held.token).await {
                    warn!(error = %err, "failed to release session lock");
                }
            }
            .instrument(span),
        );
    }
}
