//! Redis backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lockbox_backend::{
    BackendError, BackendLabel, BackendResult, DeleteStatus, KvBackend, LockStatus,
};
use redis::{Client, Script, Value, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::dsn::RedisDsn;
use crate::error::Error;

/// Deletes `KEYS[1]` only if it still holds `ARGV[1]`.
pub const UNLOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis key-value backend based on redis-rs crate.
///
/// It uses a [`ConnectionManager`] for asynchronous network interaction,
/// created lazily on the first command.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    dsn: RedisDsn,
    unlock: Script,
    label: BackendLabel,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("dsn", &self.dsn)
            .field("label", &self.label)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl RedisBackend {
    /// Create new backend instance with default settings.
    ///
    /// # Examples
    /// ```
    /// use lockbox_redis::RedisBackend;
    ///
    /// let backend = RedisBackend::new().unwrap();
    /// ```
    pub fn new() -> Result<Self, BackendError> {
        Ok(Self::builder().build()?)
    }

    /// Creates new RedisBackend builder with default settings.
    #[must_use]
    pub fn builder() -> RedisBackendBuilder {
        RedisBackendBuilder::default()
    }

    /// The parsed connection string this backend was built from.
    pub fn dsn(&self) -> &RedisDsn {
        &self.dsn
    }

    /// Create lazy connection to redis via [`ConnectionManager`]
    pub async fn connection(&self) -> Result<&ConnectionManager, BackendError> {
        trace!("Get connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!(dsn = %self.dsn, "Initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await
            .map_err(Error::from)?;
        Ok(manager)
    }
}

/// Part of builder pattern implementation for RedisBackend.
pub struct RedisBackendBuilder {
    connection_info: String,
    label: Option<BackendLabel>,
}

impl Default for RedisBackendBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1".to_owned(),
            label: None,
        }
    }
}

impl RedisBackendBuilder {
    /// Set the DSN (host, port, database, credentials, etc.) for RedisBackend.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Set a custom label for this backend.
    ///
    /// Without one, the DSN `alias` parameter is used, then `"redis"`.
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Create new instance of Redis backend with passed settings.
    pub fn build(self) -> Result<RedisBackend, Error> {
        let dsn = RedisDsn::parse(self.connection_info);
        let client = Client::open(dsn.to_connection_url()?)?;
        let label = self
            .label
            .or_else(|| dsn.alias().map(BackendLabel::from))
            .unwrap_or(BackendLabel::new_static("redis"));
        Ok(RedisBackend {
            client,
            connection: OnceCell::new(),
            dsn,
            unlock: Script::new(UNLOCK_SCRIPT),
            label,
        })
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        let mut con = self.connection().await?.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        let mut con = self.connection().await?.clone();
        let mut cmd = match ttl {
            Some(ttl) => {
                let mut cmd = redis::cmd("SETEX");
                cmd.arg(key).arg(seconds(ttl));
                cmd
            }
            None => {
                let mut cmd = redis::cmd("SET");
                cmd.arg(key);
                cmd
            }
        };
        cmd.arg(value.as_ref());
        cmd.query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> BackendResult<LockStatus> {
        let mut con = self.connection().await?.clone();
        let reply: Value = redis::cmd("SET")
            .arg(key)
            .arg(value.as_ref())
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;

        match reply {
            Value::Okay => Ok(LockStatus::Acquired),
            Value::SimpleString(ref s) if s == "OK" => Ok(LockStatus::Acquired),
            Value::Nil => Ok(LockStatus::Locked),
            other => Err(Error::UnexpectedReply {
                command: "SET NX",
                reply: format!("{other:?}"),
            }
            .into()),
        }
    }

    async fn del(&self, key: &str) -> BackendResult<DeleteStatus> {
        let mut con = self.connection().await?.clone();
        let deleted: u32 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        let mut con = self.connection().await?.clone();
        let updated: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds(ttl))
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(updated == 1)
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> BackendResult<DeleteStatus> {
        let mut con = self.connection().await?.clone();
        // EVALSHA first, EVAL with the source when the script cache misses.
        let deleted: u32 = self
            .unlock
            .key(key)
            .arg(expected)
            .invoke_async(&mut con)
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    fn label(&self) -> BackendLabel {
        self.label.clone()
    }
}
