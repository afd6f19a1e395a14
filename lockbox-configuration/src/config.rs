use std::fmt;

use indexmap::IndexMap;
use lockbox::{LockingSessionHandler, SessionOptions};
use lockbox_backend::{CommandLog, SharedBackend};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Client;
use crate::error::ConfigError;

/// Root of a lockbox configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    /// Clients by name, in declaration order.
    #[serde(default)]
    pub clients: IndexMap<String, Client>,
    pub session: SessionConfig,
}

/// Session handler settings: the client to store sessions in, plus
/// [`SessionOptions`] inline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub client: String,
    #[serde(flatten)]
    pub options: SessionOptions,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds every client and resolves the session client.
    ///
    /// Clients with `logging` enabled share one [`CommandLog`], available
    /// through [`Stores::log`].
    pub fn into_stores(self) -> Result<Stores, ConfigError> {
        if !self.clients.contains_key(&self.session.client) {
            return Err(ConfigError::UnknownClient(self.session.client));
        }

        let log = CommandLog::default();
        let mut clients = IndexMap::with_capacity(self.clients.len());
        for (name, client) in self.clients {
            debug!(client = %name, logging = client.logging(), "building client");
            let backend = client.into_backend(&name, &log)?;
            clients.insert(name, backend);
        }

        let session = clients
            .get(&self.session.client)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownClient(self.session.client.clone()))?;

        Ok(Stores {
            clients,
            session,
            options: self.session.options,
            log,
        })
    }
}

/// Backends built from a [`Config`].
pub struct Stores {
    clients: IndexMap<String, SharedBackend>,
    session: SharedBackend,
    options: SessionOptions,
    log: CommandLog,
}

impl Stores {
    pub fn client(&self, name: &str) -> Option<&SharedBackend> {
        self.clients.get(name)
    }

    pub fn client_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Commands recorded by clients with logging enabled.
    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn session_options(&self) -> &SessionOptions {
        &self.options
    }

    /// A fresh handler for one request, over the session client.
    pub fn session_handler(&self) -> LockingSessionHandler<SharedBackend> {
        LockingSessionHandler::new(self.session.clone(), self.options.clone())
    }
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("log", &self.log)
            .finish()
    }
}
