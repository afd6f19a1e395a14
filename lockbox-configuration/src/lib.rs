//! Declarative configuration for lockbox.
//!
//! A configuration names a set of clients and tells the session handler
//! which one to store sessions in:
//!
//! ```yaml
//! clients:
//!   default:
//!     type: Redis
//!     dsn: "redis://secret@localhost:6379/1"
//!     logging: true
//!   local:
//!     type: Moka
//!     max_capacity: 10000
//! session:
//!   client: default
//!   prefix: "session"
//!   lock_max_wait: 30s
//! ```
//!
//! Backends are compiled in through the `redis` and `moka` features.
//! Referencing a backend that was not compiled in is a configuration error.

pub mod client;
pub mod config;
pub mod error;

pub use client::{Client, Moka, Redis};
pub use config::{Config, SessionConfig, Stores};
pub use error::ConfigError;
