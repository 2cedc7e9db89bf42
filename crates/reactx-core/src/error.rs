#![forbid(unsafe_code)]

//! Error taxonomy for proxy traps and actions.
//!
//! Every failure is returned to the code performing the offending read or
//! write. The engine never catches, retries or logs these errors itself.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Container flavor of a raw target, used in error messages and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Array,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by reactive proxies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// A write, delete or mutating array method was attempted through a
    /// readonly view. The underlying data is untouched and nobody is notified.
    #[error("Cannot mutate a readonly {kind}")]
    ReadonlyMutation { kind: TargetKind },

    /// An array-only operation was invoked on an object proxy.
    #[error("expected an array target, found an object")]
    NotAnArray,

    /// The value stored under `key` cannot be invoked.
    #[error("property `{key}` is not callable")]
    NotCallable { key: String },

    /// `length` was assigned something that is not a non-negative integer.
    #[error("Invalid array length: {value}")]
    InvalidArrayLength { value: String },

    /// A collection item is not a container with a string `id`.
    #[error("collection items need a string `id` property")]
    MissingId,

    /// Error raised by user code (a method, a function value or a callback).
    #[error("{0}")]
    Custom(String),
}

impl ReactiveError {
    #[must_use]
    pub fn readonly(kind: TargetKind) -> Self {
        Self::ReadonlyMutation { kind }
    }

    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Whether this error came from writing through a readonly view.
    #[must_use]
    pub fn is_readonly_mutation(&self) -> bool {
        matches!(self, Self::ReadonlyMutation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_messages_name_the_container() {
        assert_eq!(
            ReactiveError::readonly(TargetKind::Object).to_string(),
            "Cannot mutate a readonly object"
        );
        assert_eq!(
            ReactiveError::readonly(TargetKind::Array).to_string(),
            "Cannot mutate a readonly array"
        );
    }

    #[test]
    fn custom_error_displays_message_verbatim() {
        let err = ReactiveError::custom("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_readonly_mutation());
    }
}
