//! Builder for configuring [`MokaBackend`].

use std::time::{Duration, Instant};

use lockbox_backend::BackendLabel;
use moka::Expiry;
use moka::future::Cache;

use crate::backend::{MokaBackend, StoredValue};

/// Expiration policy that derives entry lifetime from [`StoredValue::deadline`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl Expiry<String, StoredValue> for Expiration {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        created_at: Instant,
    ) -> Option<Duration> {
        Self::remaining(value, created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Always use the new value's deadline. The default keeps the old
        // expiry, which would break EXPIRE and SET without TTL.
        Self::remaining(value, updated_at)
    }
}

impl Expiration {
    fn remaining(value: &StoredValue, now: Instant) -> Option<Duration> {
        value
            .deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

/// Builder for creating and configuring a [`MokaBackend`].
///
/// Use [`MokaBackend::builder`] to create a new builder instance.
///
/// ```
/// use lockbox_moka::MokaBackend;
///
/// let backend = MokaBackend::builder(10_000)
///     .label("sessions")
///     .build();
/// ```
pub struct MokaBackendBuilder {
    max_capacity: u64,
    label: BackendLabel,
}

impl MokaBackendBuilder {
    pub(crate) fn new(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            label: BackendLabel::new_static("moka"),
        }
    }

    /// Sets a custom label for this backend.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Builds the backend.
    pub fn build(self) -> MokaBackend {
        let cache = Cache::builder()
            .max_capacity(self.max_capacity)
            .expire_after(Expiration)
            .build();
        MokaBackend {
            cache,
            label: self.label,
        }
    }
}
