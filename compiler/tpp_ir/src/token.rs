//! Tokens produced by the lexer.

use std::fmt;

use crate::SourceLocation;

/// Classification of a token.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TokenKind {
    /// Run of alphanumerics/underscore starting with a non-digit.
    Identifier,
    /// Run of digits with at most one embedded `.`.
    Number,
    /// Character literal between `'` delimiters, escapes decoded.
    Char,
    /// String literal between `"` delimiters, escapes decoded.
    String,
    /// Maximal run of characters from the operator set.
    BinaryOperator,
    /// Any other single character (`(`, `{`, `,`, …).
    Other,
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::Char => "char literal",
            TokenKind::String => "string literal",
            TokenKind::BinaryOperator => "operator",
            TokenKind::Other => "punctuation",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A classified token with its source position and decoded text.
///
/// For string and char literals `text` holds the decoded content (escape
/// sequences already resolved); for everything else it is the raw lexeme.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Token {
    pub location: SourceLocation,
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    /// The end-of-input marker.
    pub fn eof(location: SourceLocation) -> Self {
        Token {
            location,
            kind: TokenKind::Eof,
            text: String::new(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// `true` if this token is the given punctuation/keyword text.
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}
