//! Error types for backend operations.

use thiserror::Error;

/// Error type for backend operations.
///
/// Lock contention and missing keys are never reported through this type.
/// Anything that ends up here comes from the store itself and is propagated
/// unchanged by the lock and the session handler.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal backend error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote backends (e.g., Redis).
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),
}

impl BackendError {
    /// Returns `true` for transport failures.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, BackendError::ConnectionError(_))
    }
}
