//! Expression error types

use thiserror::Error;

/// Errors raised while turning source text into an operation tree.
///
/// Every variant aborts the current parse; no partial tree is ever
/// returned to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Malformed literal, unterminated string, invalid character.
    #[error("Lexical error: {message}")]
    Lexical { message: String },

    /// The grammar could not continue. `rest` is the unconsumed
    /// remainder of the input, embedded for user-facing diagnostics.
    #[error("A syntax error in expression, near `{rest}`.")]
    Syntax { rest: String },

    /// A construct that is lexically and grammatically fine but
    /// meaningless, e.g. `void` as a non-sole parameter type.
    #[error("{message}")]
    Semantic { message: String },

    /// An integer literal that does not fit the widest supported width.
    #[error("Numeric constant too large.")]
    NumericOverflow,

    /// A parser invariant was violated. Indicates a bug in this crate,
    /// not in the user's expression.
    #[error("Internal parser error: {0}")]
    Internal(String),
}

impl ParseError {
    pub fn lexical(message: impl Into<String>) -> Self {
        ParseError::Lexical {
            message: message.into(),
        }
    }

    pub fn syntax(rest: impl Into<String>) -> Self {
        ParseError::Syntax { rest: rest.into() }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        ParseError::Semantic {
            message: message.into(),
        }
    }
}

/// Errors raised while evaluating an operation tree against a target.
///
/// These are user-facing: the expression was well-formed but could not
/// be computed. The provider's state is never left corrupted and the
/// caller may retry with a different expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("No symbol \"{name}\" in current context.")]
    UnknownSymbol { name: String },

    #[error("Argument to arithmetic operation not a number or boolean.")]
    NotArithmetic,

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Cannot perform operation '{op}' on types {left} and {right}")]
    NoMatchingOperator {
        op: String,
        left: String,
        right: String,
    },

    #[error("Invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric constant too large.")]
    ConstantTooLarge,

    #[error("Cannot subscript something of type {type_name}")]
    NotSubscriptable { type_name: String },

    #[error("There is no member named {field} in {type_name}")]
    NoSuchField { field: String, type_name: String },

    /// Internal invariant violation in the vector evaluator. Should not
    /// occur for valid types, but is reported rather than crashing.
    #[error("Could not determine the vector bounds of type {type_name}")]
    VectorBounds { type_name: String },

    #[error("Cannot access memory at address 0x{address:x}")]
    MemoryAccess { address: u64 },

    #[error("Attempt to assign to a value that is not an lvalue")]
    NotAnLvalue,

    #[error("{what} is not supported")]
    NotSupported { what: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EvalError {
    pub fn unknown_symbol(name: impl Into<String>) -> Self {
        EvalError::UnknownSymbol { name: name.into() }
    }

    pub fn no_matching_operator(
        op: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        EvalError::NoMatchingOperator {
            op: op.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn invalid_cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        EvalError::InvalidCast {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn no_such_field(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        EvalError::NoSuchField {
            field: field.into(),
            type_name: type_name.into(),
        }
    }

    pub fn not_supported(what: impl Into<String>) -> Self {
        EvalError::NotSupported { what: what.into() }
    }
}
