//! Error types for the memoizing cache
//!
//! Provides unified error handling using thiserror.

use std::borrow::Cow;

use thiserror::Error;

// == Unhashable Argument Error ==
/// An argument could not be turned into a cache key.
///
/// Key derivation is fallible: most implementations of
/// [`KeyPart`](crate::key::KeyPart) always succeed, but some values have no
/// canonical form (a NaN float compares unequal to itself) and user
/// implementations may report their own failures. When this error is
/// returned, the wrapped callable was not invoked and the store was not
/// touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("argument of type `{type_name}` cannot be used for cache key derivation: {reason}")]
pub struct UnhashableArgumentError {
    type_name: &'static str,
    reason: Cow<'static, str>,
}

impl UnhashableArgumentError {
    // == Constructor ==
    /// Creates an error describing the offending value's type. The value is
    /// used only to capture its type name.
    pub fn new<T: ?Sized>(_value: &T, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Name of the argument type that failed key derivation.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Why the argument could not be canonicalized.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

// == Result Type Alias ==
/// Convenience Result type for key derivation and wrapper calls.
pub type Result<T> = std::result::Result<T, UnhashableArgumentError>;
