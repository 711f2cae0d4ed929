//! Error types for the array engine

use thiserror::Error;

/// Main error type for the engine.
///
/// Array operations never catch or wrap: failures from user callbacks,
/// comparators and property access propagate through `?` untouched.
#[derive(Debug, Error)]
pub enum JsError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("ReferenceError: {name} is not defined")]
    ReferenceError { name: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn reference_error(name: impl Into<String>) -> Self {
        JsError::ReferenceError { name: name.into() }
    }

    /// Create an internal error for states that cannot be reached through the
    /// public API. Surfacing a value beats panicking inside an embedder.
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    /// Message for a `length` write or `Array(n)` call where the number is not
    /// its own uint32.
    pub fn bad_array_length() -> Self {
        JsError::range_error("invalid array length")
    }

    /// Message for operations that would build a string from more than
    /// 2^31 - 1 elements.
    pub fn array_length_too_big(length: u64) -> Self {
        JsError::range_error(format!("array length {length} exceeds supported capacity"))
    }

    /// Message for iterative methods handed a non-callable callback.
    pub fn not_a_function(what: impl core::fmt::Display) -> Self {
        JsError::type_error(format!("{what} is not a function"))
    }
}
