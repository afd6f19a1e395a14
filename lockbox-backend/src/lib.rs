#![warn(missing_docs)]
//! Traits and structs for lockbox backend interaction.
//!
//! The session handler and the spin lock only ever talk to a [`KvBackend`].
//! If you want to plug in your own store, implement that trait.
mod backend;
mod error;
mod label;
pub mod logging;
pub mod metrics;

pub use backend::{BackendResult, KvBackend, SharedBackend};
pub use error::BackendError;
pub use label::BackendLabel;
pub use logging::{CommandLog, CommandRecord, LoggingBackend};

/// Status of deleting result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}

impl DeleteStatus {
    /// Returns `true` if at least one record was removed.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteStatus::Deleted(n) if *n > 0)
    }
}

/// Enum for representing status of Lock object in backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// Lock successfully created and acquired.
    Acquired,
    /// Lock object already acquired (locked).
    Locked,
}
