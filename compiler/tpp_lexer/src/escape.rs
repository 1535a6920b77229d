//! Escape sequence decoding for string and char literals.
//!
//! Recognized escapes: `\a \b \e \f \n \r \t \v`, `\xHH` (hex byte) and
//! `\uHHHH` (hex code point). Any other escaped character stands for
//! itself (`\\`, `\"`, `\'`).

use crate::cursor::Cursor;

/// Why an escape sequence failed to decode.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EscapeError {
    /// Input ended in the middle of an escape sequence.
    UnexpectedEof,
    /// A `\x`/`\u` digit was not a hex digit.
    InvalidHexDigit(char),
    /// A `\u` value is not a valid Unicode code point.
    InvalidCodePoint(u32),
}

impl EscapeError {
    pub(crate) fn message(&self) -> String {
        match self {
            EscapeError::UnexpectedEof => "unterminated escape sequence".to_string(),
            EscapeError::InvalidHexDigit(c) => {
                format!("invalid hex digit in escape sequence: {c:?}")
            }
            EscapeError::InvalidCodePoint(v) => {
                format!("escape value {v:#x} is not a valid code point")
            }
        }
    }
}

/// Decode one escape sequence. The cursor must be positioned just past
/// the backslash; on success it is left past the sequence.
pub(crate) fn decode(cursor: &mut Cursor) -> Result<char, EscapeError> {
    let Some(selector) = cursor.current() else {
        return Err(EscapeError::UnexpectedEof);
    };
    let decoded = match selector {
        b'a' => '\x07',
        b'b' => '\x08',
        b'e' => '\x1b',
        b'f' => '\x0c',
        b'n' => '\n',
        b'r' => '\r',
        b't' => '\t',
        b'v' => '\x0b',
        b'x' => {
            cursor.bump();
            return hex_escape(cursor, 2);
        }
        b'u' => {
            cursor.bump();
            return hex_escape(cursor, 4);
        }
        // Anything else stands for itself: \\, \", \' and unknown escapes.
        _ => return Ok(cursor.bump_char().unwrap_or('\\')),
    };
    cursor.bump();
    Ok(decoded)
}

/// Read exactly `digits` hex digits and convert the value to a char.
fn hex_escape(cursor: &mut Cursor, digits: u32) -> Result<char, EscapeError> {
    let mut value: u32 = 0;
    for _ in 0..digits {
        let Some(byte) = cursor.bump() else {
            return Err(EscapeError::UnexpectedEof);
        };
        let digit = (byte as char)
            .to_digit(16)
            .ok_or(EscapeError::InvalidHexDigit(byte as char))?;
        value = value * 16 + digit;
    }
    char::from_u32(value).ok_or(EscapeError::InvalidCodePoint(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_str(s: &str) -> Result<char, EscapeError> {
        let mut cursor = Cursor::new(s);
        decode(&mut cursor)
    }

    #[test]
    fn named_escapes() {
        assert_eq!(decode_str("n"), Ok('\n'));
        assert_eq!(decode_str("r"), Ok('\r'));
        assert_eq!(decode_str("t"), Ok('\t'));
        assert_eq!(decode_str("a"), Ok('\x07'));
        assert_eq!(decode_str("b"), Ok('\x08'));
        assert_eq!(decode_str("f"), Ok('\x0c'));
        assert_eq!(decode_str("v"), Ok('\x0b'));
    }

    #[test]
    fn hex_byte_escape() {
        assert_eq!(decode_str("x41"), Ok('A'));
        assert_eq!(decode_str("x0a"), Ok('\n'));
    }

    #[test]
    fn unicode_escape() {
        assert_eq!(decode_str("u0041"), Ok('A'));
        assert_eq!(decode_str("u00e9"), Ok('é'));
    }

    #[test]
    fn passthrough_escapes() {
        assert_eq!(decode_str("\\"), Ok('\\'));
        assert_eq!(decode_str("\""), Ok('"'));
        assert_eq!(decode_str("'"), Ok('\''));
        assert_eq!(decode_str("q"), Ok('q'));
    }

    #[test]
    fn invalid_hex_digit_is_an_error() {
        assert_eq!(decode_str("xg1"), Err(EscapeError::InvalidHexDigit('g')));
    }

    #[test]
    fn truncated_hex_escape_is_an_error() {
        assert_eq!(decode_str("x4"), Err(EscapeError::UnexpectedEof));
        assert_eq!(decode_str("u00"), Err(EscapeError::UnexpectedEof));
    }

    #[test]
    fn surrogate_code_point_is_an_error() {
        assert_eq!(decode_str("ud800"), Err(EscapeError::InvalidCodePoint(0xd800)));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(decode_str(""), Err(EscapeError::UnexpectedEof));
    }
}
