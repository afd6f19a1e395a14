//! Client definitions.

use std::sync::Arc;

use lockbox_backend::{CommandLog, KvBackend, LoggingBackend, SharedBackend};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A named connection to a key/value store.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Client {
    Redis(Redis),
    Moka(Moka),
}

/// Redis server reached through a DSN such as `redis://secret@host:6379/1`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Redis {
    pub dsn: String,
    /// Label used in metrics and tracing. Defaults to the client name.
    #[serde(default)]
    pub label: Option<String>,
    /// Record every command in the shared [`CommandLog`].
    #[serde(default)]
    pub logging: bool,
}

/// In-process store, for tests and single-process deployments.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Moka {
    pub max_capacity: u64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub logging: bool,
}

impl Client {
    /// Whether commands of this client go through a [`LoggingBackend`].
    pub fn logging(&self) -> bool {
        match self {
            Client::Redis(config) => config.logging,
            Client::Moka(config) => config.logging,
        }
    }

    /// Builds the backend described by this client.
    ///
    /// `name` is the key of the client in the configuration. With logging
    /// enabled, commands are recorded into `log`.
    pub fn into_backend(self, name: &str, log: &CommandLog) -> Result<SharedBackend, ConfigError> {
        let logging = self.logging();
        let backend = match self {
            Client::Redis(config) => config.into_backend(name)?,
            Client::Moka(config) => config.into_backend(name)?,
        };
        Ok(if logging {
            wrap(backend, log)
        } else {
            backend
        })
    }
}

fn wrap<B>(backend: B, log: &CommandLog) -> SharedBackend
where
    B: KvBackend + Send + 'static,
{
    Arc::new(LoggingBackend::with_log(backend, log.clone()))
}

impl Redis {
    /// Label of the built backend: the explicit `label`, then the DSN
    /// `alias` parameter, then the client name.
    #[cfg(feature = "redis")]
    pub fn label(&self, name: &str) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        lockbox_redis::RedisDsn::parse(self.dsn.as_str())
            .alias()
            .unwrap_or(name)
            .to_owned()
    }

    #[cfg(feature = "redis")]
    pub fn into_backend(self, name: &str) -> Result<SharedBackend, ConfigError> {
        use lockbox_redis::{Error, RedisBackend};

        let label = self.label(name);
        let backend = RedisBackend::builder()
            .server(self.dsn)
            .label(label)
            .build()
            .map_err(|err| match err {
                Error::InvalidDsn { reason, .. } => ConfigError::InvalidDsn {
                    client: name.to_owned(),
                    reason,
                },
                other => ConfigError::BackendNotAvailable(format!("Redis: {}", other)),
            })?;

        Ok(Arc::new(backend))
    }

    #[cfg(not(feature = "redis"))]
    pub fn into_backend(self, _name: &str) -> Result<SharedBackend, ConfigError> {
        Err(ConfigError::BackendNotAvailable("Redis".to_string()))
    }
}

impl Moka {
    #[cfg(feature = "moka")]
    pub fn into_backend(self, name: &str) -> Result<SharedBackend, ConfigError> {
        use lockbox_moka::MokaBackend;

        let backend = MokaBackend::builder(self.max_capacity)
            .label(self.label.unwrap_or_else(|| name.to_owned()))
            .build();

        Ok(Arc::new(backend))
    }

    #[cfg(not(feature = "moka"))]
    pub fn into_backend(self, _name: &str) -> Result<SharedBackend, ConfigError> {
        Err(ConfigError::BackendNotAvailable("Moka".to_string()))
    }
}
