#![warn(missing_docs)]
//! Session storage with distributed locking.
//!
//! Concurrent requests of the same user would otherwise read a session,
//! modify it independently and overwrite each other's changes. The
//! [`LockingSessionHandler`] takes a per-session [`SpinLock`] when a session
//! is read and keeps it until the session is closed, so requests touching
//! the same session are serialized across every process sharing the store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use lockbox::{LockingSessionHandler, ReadOutcome, SessionHandler, SessionOptions};
//! use lockbox_backend::SharedBackend;
//!
//! # async fn request(backend: SharedBackend) -> Result<(), lockbox::BackendError> {
//! let handler = LockingSessionHandler::new(backend, SessionOptions::default());
//! handler
//!     .scoped(|session| async move {
//!         match session.read("abc").await? {
//!             ReadOutcome::Data(data) => {
//!                 // ... update the payload
//!                 session.write("abc", data).await?;
//!             }
//!             ReadOutcome::Contended => {
//!                 // another request holds the session
//!             }
//!         }
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

/// Distributed spin lock on top of a [`KvBackend`](lockbox_backend::KvBackend).
pub mod lock;

/// Session handler options as found in configuration files.
pub mod options;

/// Session lifecycle trait and the locking handler implementing it.
pub mod session;

pub use lock::{OwnerToken, SpinLock};
pub use lockbox_backend::{BackendError, BackendResult, KvBackend, SharedBackend};
pub use options::SessionOptions;
pub use session::{LockingSessionHandler, ReadOutcome, SessionHandler};
