#![warn(missing_docs)]
//! Redis backend for lockbox.
//!
//! [`RedisBackend`] implements [`KvBackend`](lockbox_backend::KvBackend) on top
//! of the [`redis`] crate, and [`RedisDsn`] parses the `redis://` /
//! `rediss://` connection strings it is configured with.

pub mod backend;
pub mod dsn;
pub mod error;

#[doc(inline)]
pub use crate::backend::{RedisBackend, RedisBackendBuilder, UNLOCK_SCRIPT};
#[doc(inline)]
pub use crate::dsn::RedisDsn;
#[doc(inline)]
pub use crate::error::Error;
