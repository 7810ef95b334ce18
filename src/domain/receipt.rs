//! Opaque subscription receipt.
//!
//! [`ObserverReceipt`] is a newtype wrapper around [`uuid::Uuid`] (v4)
//! returned on registration. It is the only handle to a registration and
//! the sole argument needed to retire it.

use std::fmt;

/// Unique token identifying one observer registration.
///
/// Generated at registration time and immutable thereafter. Distinguishes a
/// registration from every other, including other registrations for the
/// same key and execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverReceipt(uuid::Uuid);

impl ObserverReceipt {
    /// Creates a new random receipt (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ObserverReceipt {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
