//! Domain layer: key descriptors, receipts, and change records.
//!
//! This module contains the value-level vocabulary of the store: the typed
//! key descriptor ([`Elastomer`]), the opaque subscription token
//! ([`ObserverReceipt`]), and the per-delivery change record
//! ([`Mutation`]).

pub mod elastomer;
pub mod mutation;
pub(crate) mod observer;
pub mod receipt;

pub use elastomer::{Elastomer, ErasedValue, erase};
pub use mutation::Mutation;
pub use receipt::ObserverReceipt;
