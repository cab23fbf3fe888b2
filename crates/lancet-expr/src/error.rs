//! Error types for formula parsing and rule-condition evaluation

use thiserror::Error;

/// Structured validation outcome of a failed parse.
///
/// These are ordinary values handed back to the caller; parsing a malformed
/// formula is an expected event, not a process failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Unbalanced delimiters, dangling operators, empty operands, trailing
    /// text after a group
    #[error("Expression is not well formed: {reason}")]
    NotWellFormed { reason: String },

    /// An identifier with the wrong length or character set where a UID is
    /// required
    #[error("Invalid identifier: {token:?}")]
    InvalidIdentifier { token: String },

    /// A brace group with an unrecognized sigil; carries the offending text
    #[error("Unknown variable reference: {text:?}")]
    UnknownVariable { text: String },

    /// A call to a function name the grammar does not know
    #[error("Unknown function: {name:?}")]
    UnknownFunction { name: String },
}

/// Result type alias for parse operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Why one rule's condition could not produce a boolean.
///
/// Failures are per rule: the engine logs them and skips the rule without
/// aborting the pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    /// The condition text failed to parse
    #[error("condition failed to parse: {0}")]
    Parse(#[from] ParseError),

    /// The condition references a variable name missing from the variable
    /// table
    #[error("variable is not defined: {name:?}")]
    UnknownVariable { name: String },

    /// The condition references an environment variable that is not set
    #[error("environment variable is not defined: {name:?}")]
    UnknownEnvironment { name: String },
}
