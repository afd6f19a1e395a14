//! Error types for Redis backend operations.
//!
//! All errors can be converted to [`BackendError`] for uniform error handling
//! across backends.
//!
//! [`BackendError`]: lockbox_backend::BackendError

use lockbox_backend::BackendError;
use redis::RedisError;

/// Error type for Redis backend operations.
///
/// # When You'll Encounter This
///
/// - Using [`RedisBackendBuilder::build`] with a DSN that does not describe a
///   reachable endpoint (missing scheme, no host or socket)
/// - Performing the first command when Redis is unreachable
///   (connection is established lazily)
/// - Performing commands when the Redis server returns an error
///
/// [`RedisBackendBuilder::build`]: crate::RedisBackendBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    ///
    /// This includes connection failures, protocol errors, authentication
    /// failures, and command execution errors.
    #[error("Redis backend error: {0}")]
    Redis(#[from] RedisError),

    /// The connection string could not be turned into a Redis endpoint.
    #[error("Invalid Redis DSN `{dsn}`: {reason}")]
    InvalidDsn {
        /// The offending connection string.
        dsn: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The server replied with something the command never returns.
    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        /// Command that received the reply.
        command: &'static str,
        /// Debug rendering of the reply.
        reply: String,
    },
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        match error {
            Error::Redis(ref err)
                if err.is_io_error()
                    || err.is_connection_refusal()
                    || err.is_connection_dropped()
                    || err.is_timeout() =>
            {
                Self::ConnectionError(Box::new(error))
            }
            _ => Self::InternalError(Box::new(error)),
        }
    }
}
