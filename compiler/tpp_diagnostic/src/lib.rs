//! Diagnostics for the T++ compiler.
//!
//! Every failure is an [`Error`]: a source location plus one of the
//! [`ErrorKind`] variants. There is no recovery; an error aborts
//! processing of the current compilation unit and propagates to the
//! top-level boundary, which renders it with file, row, and column before
//! the message.

use std::fmt;

use tpp_ir::SourceLocation;

/// The closed set of failure kinds.
///
/// All are fatal to the current compilation unit. The builder never
/// substitutes a default value for an operation it cannot perform;
/// operations with no defined semantics fail with one of these.
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("failed to open file: {path}")]
    FileOpen { path: String },

    /// Unterminated literal or invalid escape sequence.
    #[error("{message}")]
    Lex { message: String },

    #[error("unexpected token: {found}")]
    Syntax { found: String },

    #[error("reached end of file")]
    UnexpectedEof,

    #[error("unknown type: {name}")]
    UnknownType { name: String },

    /// A non-opaque struct (or other completed type) was redefined.
    #[error("non-opaque type {name} cannot be redefined")]
    RedefinedType { name: String },

    /// A function body was supplied for a symbol that already has one.
    #[error("function {name} cannot be redefined")]
    RedefinedFunction { name: String },

    #[error("undeclared function: {name}")]
    UndeclaredFunction { name: String },

    /// The callee was declared without a body or native linkage name.
    #[error("cannot call incomplete function: {name}")]
    IncompleteFunctionCall { name: String },

    #[error("undeclared variable: {name}")]
    UndeclaredVariable { name: String },

    #[error("illegal cast from {from} to {to}")]
    IllegalCast { from: String, to: String },

    /// No common type exists to promote the operand pair to.
    #[error("no higher order type for {lhs} and {rhs}")]
    NoHigherOrder { lhs: String, rhs: String },

    #[error("type {ty} has no member {member}")]
    UnknownMember { ty: String, member: String },

    #[error("cannot index into non-array type {ty}")]
    NotAnArray { ty: String },

    #[error("cannot assign to an r-value")]
    AssignToRValue,

    /// The generated function failed structural verification.
    #[error("verification of function {function} failed: {reason}")]
    VerificationFailed { function: String, reason: String },

    #[error("no lowering for {what}")]
    UnsupportedNode { what: &'static str },

    #[error("cannot allocate local variable in global space")]
    GlobalAlloca,
}

/// A located, fatal compiler error.
#[derive(Clone, PartialEq, Debug)]
#[must_use = "errors abort the compilation unit and must be propagated"]
pub struct Error {
    pub location: SourceLocation,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(location: SourceLocation, kind: ErrorKind) -> Self {
        Error { location, kind }
    }

    /// An error with no usable source position.
    pub fn unlocated(kind: ErrorKind) -> Self {
        Error {
            location: SourceLocation::unknown(),
            kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "At {}: {}", self.location, self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_renders_location_before_message() {
        let err = Error::new(
            SourceLocation {
                file: "main.tpp".into(),
                row: 3,
                column: 7,
            },
            ErrorKind::UndeclaredVariable {
                name: "x".to_string(),
            },
        );
        assert_eq!(err.to_string(), "At main.tpp(3,7): undeclared variable: x");
    }

    #[test]
    fn unlocated_error_renders_placeholder() {
        let err = Error::unlocated(ErrorKind::AssignToRValue);
        assert_eq!(err.to_string(), "At <unknown>: cannot assign to an r-value");
    }

    #[test]
    fn illegal_cast_names_both_types() {
        let kind = ErrorKind::IllegalCast {
            from: "[i8]".to_string(),
            to: "i8".to_string(),
        };
        assert_eq!(kind.to_string(), "illegal cast from [i8] to i8");
    }
}
