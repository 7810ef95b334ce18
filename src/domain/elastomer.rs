//! Typed key descriptor addressing one slot in the archive.
//!
//! [`Elastomer`] is an immutable, hashable capability token: a stable name
//! plus two closures compiled in at construction time against a concrete
//! value type `T`, one for type membership and one for `T`-specialized
//! equality. The archive itself never inspects concrete value types; it
//! only ever calls these closures.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased value as stored in the archive model.
///
/// Values are reference-counted so a committed value can be shared between
/// the model, in-flight [`Mutation`](super::Mutation) records, and readers
/// without copying.
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Erases a concrete value for APIs that take pre-erased entries, such as
/// [`Archive::stage_many`](crate::Archive::stage_many).
pub fn erase(value: impl Any + Send + Sync) -> ErasedValue {
    Arc::new(value)
}

/// Type-membership test bound to the elastomer's associated type.
type TypeGuardFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>;

/// Equality test specialized for the associated type. Either side may be
/// absent; two absent (or non-conforming) sides compare equal.
type EqualityFn = Arc<dyn Fn(Option<&ErasedValue>, Option<&ErasedValue>) -> bool + Send + Sync>;

/// Named, typed key descriptor for one archive slot.
///
/// An elastomer is a pure value: it carries no archive state and is freely
/// cloned and shared. Its associated type is fixed at construction and never
/// re-derived from a value.
///
/// # Identity
///
/// Two elastomers are equal iff both their name and their associated type
/// match. A descriptor named `"flag"` bound to `bool` and one named `"flag"`
/// bound to `i64` address two distinct slots.
#[derive(Clone)]
pub struct Elastomer {
    name: Arc<str>,
    type_id: TypeId,
    type_name: &'static str,
    admits: TypeGuardFn,
    values_equal: EqualityFn,
}

impl Elastomer {
    /// Binds the value type `T` to `name`, producing a new key descriptor.
    ///
    /// Construction is pure and cannot fail. `T` must support equality so
    /// redundant writes can be detected.
    #[must_use]
    pub fn new<T>(name: &str) -> Self
    where
        T: Any + PartialEq + Send + Sync,
    {
        Self {
            name: Arc::from(name),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            admits: Arc::new(|value: &(dyn Any + Send + Sync)| value.is::<T>()),
            values_equal: Arc::new(|lhs: Option<&ErasedValue>, rhs: Option<&ErasedValue>| {
                let lhs = lhs.and_then(|value| value.downcast_ref::<T>());
                let rhs = rhs.and_then(|value| value.downcast_ref::<T>());
                lhs == rhs
            }),
        }
    }

    /// Returns the slot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the associated type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if `value` is an instance of the associated type.
    ///
    /// Staging a value for which this returns `false` is a silent no-op, so
    /// callers that need to detect rejection should check here first.
    #[must_use]
    pub fn admits(&self, value: &(dyn Any + Send + Sync)) -> bool {
        (*self.admits)(value)
    }

    /// Compares two erased values under the associated type's equality.
    ///
    /// Absent values (and values of a foreign type) compare as "no value";
    /// two absent sides are equal, an absent side never equals a present
    /// conforming one.
    #[must_use]
    pub fn values_equal(&self, lhs: Option<&ErasedValue>, rhs: Option<&ErasedValue>) -> bool {
        (*self.values_equal)(lhs, rhs)
    }
}

impl PartialEq for Elastomer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.type_id == other.type_id
    }
}

impl Eq for Elastomer {}

impl Hash for Elastomer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.type_id.hash(state);
    }
}

impl fmt::Debug for Elastomer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elastomer")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

impl fmt::Display for Elastomer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
