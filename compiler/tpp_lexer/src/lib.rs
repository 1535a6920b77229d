//! Tokenizer for T++ source text.
//!
//! [`Tokenizer::next_token`] returns the next classified token or an
//! end-of-input marker, skipping whitespace (every byte `<= 0x20`, with
//! row/column bookkeeping) and `#`-delimited comments. Classification:
//!
//! - a run of digits with at most one embedded `.` is a [`TokenKind::Number`];
//! - a run of alphanumerics/underscore starting with a non-digit is an
//!   [`TokenKind::Identifier`];
//! - text between `"` / `'` delimiters is a [`TokenKind::String`] /
//!   [`TokenKind::Char`], with escapes decoded;
//! - a maximal run over the operator character set is a
//!   [`TokenKind::BinaryOperator`];
//! - any other single character is [`TokenKind::Other`].
//!
//! The stream ending inside a literal or escape is a lex error.

use std::sync::Arc;

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{SourceLocation, Token, TokenKind};

use cursor::Cursor;

mod cursor;
mod escape;

/// Characters that form binary operator tokens (maximal munch).
#[inline]
fn is_operator_byte(byte: u8) -> bool {
    matches!(
        byte,
        b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'=' | b'<' | b'>' | b'?'
    )
}

#[inline]
fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Lazy token producer for one source file.
pub struct Tokenizer {
    cursor: Cursor,
    file: Arc<str>,
}

impl Tokenizer {
    pub fn new(source: impl Into<String>, file: impl Into<Arc<str>>) -> Self {
        Tokenizer {
            cursor: Cursor::new(source),
            file: file.into(),
        }
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    /// Location of the next unconsumed character.
    fn location(&self) -> SourceLocation {
        SourceLocation {
            file: self.file.clone(),
            row: self.cursor.row(),
            column: self.cursor.column(),
        }
    }

    /// Produce the next token, or the end-of-input marker.
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            while matches!(self.cursor.current(), Some(b) if b <= 0x20) {
                self.cursor.bump();
            }
            let Some(byte) = self.cursor.current() else {
                return Ok(Token::eof(self.location()));
            };
            match byte {
                b'#' => {
                    self.cursor.bump();
                    self.cursor.skip_past(b'#');
                }
                b'"' => return self.quoted(TokenKind::String, b'"', "string"),
                b'\'' => return self.quoted(TokenKind::Char, b'\'', "char"),
                b if b.is_ascii_digit() => return Ok(self.number()),
                b if is_ident_byte(b) => return Ok(self.identifier()),
                b if is_operator_byte(b) => return Ok(self.operator()),
                _ => return Ok(self.other()),
            }
        }
    }

    fn number(&mut self) -> Token {
        let location = self.location();
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(byte) = self.cursor.current() {
            if byte.is_ascii_digit() {
                text.push(char::from(byte));
            } else if byte == b'.' && !seen_dot {
                seen_dot = true;
                text.push('.');
            } else {
                break;
            }
            self.cursor.bump();
        }
        Token {
            location,
            kind: TokenKind::Number,
            text,
        }
    }

    fn identifier(&mut self) -> Token {
        let location = self.location();
        let mut text = String::new();
        while matches!(self.cursor.current(), Some(b) if is_ident_byte(b)) {
            if let Some(byte) = self.cursor.bump() {
                text.push(char::from(byte));
            }
        }
        Token {
            location,
            kind: TokenKind::Identifier,
            text,
        }
    }

    fn operator(&mut self) -> Token {
        let location = self.location();
        let mut text = String::new();
        while matches!(self.cursor.current(), Some(b) if is_operator_byte(b)) {
            if let Some(byte) = self.cursor.bump() {
                text.push(char::from(byte));
            }
        }
        Token {
            location,
            kind: TokenKind::BinaryOperator,
            text,
        }
    }

    fn other(&mut self) -> Token {
        let location = self.location();
        let mut text = String::new();
        if let Some(ch) = self.cursor.bump_char() {
            text.push(ch);
        }
        Token {
            location,
            kind: TokenKind::Other,
            text,
        }
    }

    /// Lex a string or char literal between `delim` delimiters.
    fn quoted(&mut self, kind: TokenKind, delim: u8, what: &str) -> Result<Token> {
        let location = self.location();
        self.cursor.bump();
        let mut text = String::new();
        loop {
            match self.cursor.current() {
                None => {
                    return Err(Error::new(
                        location,
                        ErrorKind::Lex {
                            message: format!("unterminated {what} literal"),
                        },
                    ));
                }
                Some(b) if b == delim => {
                    self.cursor.bump();
                    break;
                }
                Some(b'\\') => {
                    let escape_location = self.location();
                    self.cursor.bump();
                    let decoded = escape::decode(&mut self.cursor).map_err(|e| {
                        Error::new(
                            escape_location,
                            ErrorKind::Lex {
                                message: e.message(),
                            },
                        )
                    })?;
                    text.push(decoded);
                }
                Some(_) => {
                    if let Some(ch) = self.cursor.bump_char() {
                        text.push(ch);
                    }
                }
            }
        }
        Ok(Token {
            location,
            kind,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(source, "test.tpp");
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.next_token().expect("lex failure");
            if token.is_eof() {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex_all(source).into_iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        lex_all(source).into_iter().map(|t| t.text).collect()
    }

    // === Classification ===

    #[test]
    fn classifies_identifiers() {
        assert_eq!(kinds("foo _bar x1"), vec![TokenKind::Identifier; 3]);
    }

    #[test]
    fn identifier_must_not_start_with_digit() {
        assert_eq!(
            kinds("1abc"),
            vec![TokenKind::Number, TokenKind::Identifier]
        );
    }

    #[test]
    fn classifies_numbers_with_one_embedded_dot() {
        assert_eq!(texts("3.14"), vec!["3.14"]);
        // A second dot terminates the number.
        assert_eq!(texts("1.2.3"), vec!["1.2", ".", "3"]);
    }

    #[test]
    fn operators_are_maximal_runs() {
        assert_eq!(texts("a >>>= b"), vec!["a", ">>>=", "b"]);
        assert_eq!(texts("x<=y"), vec!["x", "<=", "y"]);
    }

    #[test]
    fn question_mark_is_an_operator_character() {
        let tokens = lex_all("?");
        assert_eq!(tokens[0].kind, TokenKind::BinaryOperator);
        assert_eq!(tokens[0].text, "?");
    }

    #[test]
    fn other_tokens_are_single_characters() {
        assert_eq!(texts("({,})"), vec!["(", "{", ",", "}", ")"]);
        assert_eq!(kinds("(".repeat(3).as_str()), vec![TokenKind::Other; 3]);
    }

    // === Literals ===

    #[test]
    fn string_literal_is_decoded() {
        let tokens = lex_all(r#""hello\nworld""#);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "hello\nworld");
    }

    #[test]
    fn string_hex_and_unicode_escapes() {
        assert_eq!(texts(r#""\x41B""#), vec!["AB"]);
    }

    #[test]
    fn char_literal_is_decoded() {
        let tokens = lex_all(r"'\t'");
        assert_eq!(tokens[0].kind, TokenKind::Char);
        assert_eq!(tokens[0].text, "\t");
    }

    #[test]
    fn string_keeps_multibyte_characters() {
        assert_eq!(texts("\"héllo\""), vec!["héllo"]);
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let mut tokenizer = Tokenizer::new("\"abc", "test.tpp");
        let err = tokenizer.next_token().expect_err("should fail");
        assert!(matches!(err.kind, ErrorKind::Lex { .. }));
        assert_eq!(err.location.row, 1);
    }

    #[test]
    fn invalid_escape_is_a_lex_error() {
        let mut tokenizer = Tokenizer::new(r#""\xzz""#, "test.tpp");
        let err = tokenizer.next_token().expect_err("should fail");
        assert!(matches!(err.kind, ErrorKind::Lex { .. }));
    }

    // === Comments and whitespace ===

    #[test]
    fn comments_run_between_markers() {
        assert_eq!(texts("a # comment # b"), vec!["a", "b"]);
    }

    #[test]
    fn unclosed_comment_swallows_the_rest() {
        assert_eq!(texts("a # trailing"), vec!["a"]);
    }

    #[test]
    fn consecutive_comments() {
        assert_eq!(texts("#one# x #two# y"), vec!["x", "y"]);
    }

    // === Positions ===

    #[test]
    fn rows_and_columns_are_tracked() {
        let tokens = lex_all("one\n  two");
        assert_eq!((tokens[0].location.row, tokens[0].location.column), (1, 1));
        assert_eq!((tokens[1].location.row, tokens[1].location.column), (2, 3));
    }

    #[test]
    fn rows_are_tracked_across_comments() {
        let tokens = lex_all("# line\none # two\nthree # x");
        assert_eq!(tokens[0].location.row, 2);
        assert_eq!(tokens[1].location.row, 3);
    }

    #[test]
    fn eof_token_is_marked() {
        let mut tokenizer = Tokenizer::new("  ", "test.tpp");
        let token = tokenizer.next_token().expect("lex failure");
        assert!(token.is_eof());
    }

    // === Property tests ===

    mod proptest_lexer {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The tokenizer never panics and always makes progress:
            /// every input is fully consumed within len+1 tokens or
            /// aborts with a lex error.
            #[test]
            fn terminates_on_arbitrary_input(source in ".{0,200}") {
                let mut tokenizer = Tokenizer::new(source.as_str(), "fuzz.tpp");
                for _ in 0..=source.len() {
                    match tokenizer.next_token() {
                        Ok(token) if token.is_eof() => return Ok(()),
                        Ok(_) => {}
                        Err(_) => return Ok(()),
                    }
                }
                prop_assert!(false, "tokenizer failed to terminate");
            }

            /// Identifier tokens never start with a digit.
            #[test]
            fn identifiers_never_start_with_digit(source in "[a-z0-9_ ]{0,80}") {
                let mut tokenizer = Tokenizer::new(source.as_str(), "fuzz.tpp");
                while let Ok(token) = tokenizer.next_token() {
                    if token.is_eof() {
                        break;
                    }
                    if token.kind == TokenKind::Identifier {
                        let first = token.text.chars().next();
                        prop_assert!(!first.is_some_and(|c| c.is_ascii_digit()));
                    }
                }
            }
        }
    }
}
