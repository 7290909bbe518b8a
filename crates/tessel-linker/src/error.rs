//! Linkage and initialization errors

use std::fmt;
use thiserror::Error;

/// An exception raised by code running inside the interpreter
///
/// The engine never inspects a throwable beyond its class name and message;
/// it only carries it as the cause of an initialization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    /// Name of the exception class
    pub class_name: String,
    /// Optional detail message
    pub message: Option<String>,
}

impl Throwable {
    /// Create a throwable without a message
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: None,
        }
    }

    /// Create a throwable with a detail message
    pub fn with_message(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => write!(f, "{}", self.class_name),
        }
    }
}

/// Errors raised while defining, linking or initializing a type
///
/// Definition errors are recorded on the type descriptor and returned again,
/// unchanged, on every later attempt to use the type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The name is unknown and dynamic type creation is disabled
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// The type (or member) has no usable definition
    #[error("No definition found: {0}")]
    NoDefinitionFound(String),

    /// A method overrides a final or native method
    #[error("Illegal override of {method} in {ty}: overridden method is final or native")]
    IllegalOverride {
        /// Overriding type
        ty: String,
        /// Method name and signature
        method: String,
    },

    /// Instance size or a field offset does not fit in 16 bits
    #[error("Fields overflow in {0}")]
    FieldsOverflow(String),

    /// Static storage size does not fit in 16 bits
    #[error("Statics overflow in {0}")]
    StaticsOverflow(String),

    /// A type with global statics declares a static initializer
    #[error("Type {0} has global statics and may not declare a static initializer")]
    GlobalStaticsInitializer(String),

    /// The hierarchy is inconsistent (final supertype, non-interface implemented, ...)
    #[error("Incompatible class change in {ty}: {reason}")]
    IncompatibleClassChange {
        /// Offending type
        ty: String,
        /// What was wrong
        reason: String,
    },

    /// A member definition is malformed
    #[error("Class format error in {ty}: {reason}")]
    ClassFormat {
        /// Offending type
        ty: String,
        /// What was wrong
        reason: String,
    },

    /// A type is its own supertype, directly or indirectly
    #[error("Class circularity: {0}")]
    ClassCircularity(String),

    /// A reserved id was requested outside bootstrap or is already taken
    #[error("Reserved type id {id} unavailable for {name}")]
    ReservedId {
        /// Requested id
        id: i32,
        /// Requested name
        name: String,
    },

    /// A static initializer threw
    #[error("Exception in initializer of {ty}: {cause}")]
    InitializerFailed {
        /// Type whose initializer threw
        ty: String,
        /// The exception raised by the initializer
        cause: Throwable,
    },

    /// An exception escaped an entry point
    #[error("Uncaught exception: {0}")]
    Uncaught(Throwable),
}

impl LinkError {
    pub(crate) fn class_format(ty: &str, reason: impl Into<String>) -> Self {
        LinkError::ClassFormat {
            ty: ty.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn incompatible(ty: &str, reason: impl Into<String>) -> Self {
        LinkError::IncompatibleClassChange {
            ty: ty.to_string(),
            reason: reason.into(),
        }
    }
}

/// Linking result
pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throwable_display() {
        let plain = Throwable::new("RuntimeException");
        assert_eq!(plain.to_string(), "RuntimeException");

        let detailed = Throwable::with_message("IllegalStateException", "boom");
        assert_eq!(detailed.to_string(), "IllegalStateException: boom");
    }

    #[test]
    fn test_initializer_failed_message() {
        let err = LinkError::InitializerFailed {
            ty: "app.Config".to_string(),
            cause: Throwable::with_message("ArithmeticException", "/ by zero"),
        };
        assert_eq!(
            err.to_string(),
            "Exception in initializer of app.Config: ArithmeticException: / by zero"
        );
    }
}
