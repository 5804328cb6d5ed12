//! Runtime error types shared by the object model and the scope chain.

use crate::types::JsValue;
use thiserror::Error;

/// Errors returned by object and environment operations.
///
/// None of these are fatal: the evaluator maps each one onto a user-visible
/// exception via [`JsError::category`] and `Realm::create_error`.
#[derive(Debug, Clone, Error)]
pub enum JsError {
    /// Duplicate lexical declaration in one scope
    #[error("SyntaxError: Identifier '{0}' has already been declared")]
    AlreadyDeclared(String),

    /// Read or write of a `let`/`const` binding inside its temporal dead zone
    #[error("ReferenceError: Cannot access '{0}' before initialization")]
    Uninitialized(String),

    /// Reference to a name no scope declares
    #[error("ReferenceError: {0} is not defined")]
    NotDefined(String),

    /// Assignment to a `const` binding
    #[error("TypeError: Assignment to constant variable '{0}'")]
    ConstAssignment(String),

    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("RangeError: {0}")]
    RangeError(String),

    /// A value thrown by a user callable (getter, setter, iterator producer)
    #[error("Uncaught {0}")]
    Thrown(JsValue),
}

/// Native error constructors an error can be surfaced as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    SyntaxError,
    ReferenceError,
    TypeError,
    RangeError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
        }
    }
}

impl JsError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// The constructor the evaluator should use when rethrowing this error,
    /// or `None` for user-thrown values that must be rethrown unchanged.
    pub fn category(&self) -> Option<ErrorKind> {
        match self {
            JsError::AlreadyDeclared(_) => Some(ErrorKind::SyntaxError),
            JsError::Uninitialized(_) | JsError::NotDefined(_) => Some(ErrorKind::ReferenceError),
            JsError::ConstAssignment(_) | JsError::TypeError(_) => Some(ErrorKind::TypeError),
            JsError::RangeError(_) => Some(ErrorKind::RangeError),
            JsError::Thrown(_) => None,
        }
    }

    /// Message without the category prefix, as stored in the error object's
    /// `message` property.
    pub fn message(&self) -> String {
        match self {
            JsError::AlreadyDeclared(name) => format!("Identifier '{name}' has already been declared"),
            JsError::Uninitialized(name) => format!("Cannot access '{name}' before initialization"),
            JsError::NotDefined(name) => format!("{name} is not defined"),
            JsError::ConstAssignment(_) => "Assignment to constant variable.".to_string(),
            JsError::TypeError(msg) | JsError::RangeError(msg) => msg.clone(),
            JsError::Thrown(value) => value.to_string(),
        }
    }
}
