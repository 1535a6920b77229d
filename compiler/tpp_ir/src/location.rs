//! Source locations.
//!
//! A location is a file path plus a row/column pair. It is attached to
//! every token and AST node and is used only for diagnostics, never for
//! semantics.

use std::fmt;
use std::sync::Arc;

/// A position in a source file.
///
/// Rows are 1-based, columns count consumed characters from the start of
/// the row. The file path is shared (`Arc<str>`) because one path is
/// stamped onto every token and node produced from that file.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub row: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Create a location at the start of a file (row 1, column 0).
    pub fn start_of(file: impl Into<Arc<str>>) -> Self {
        SourceLocation {
            file: file.into(),
            row: 1,
            column: 0,
        }
    }

    /// Location for generated constructs with no source position.
    pub fn unknown() -> Self {
        SourceLocation {
            file: Arc::from(""),
            row: 0,
            column: 0,
        }
    }

    /// `true` if this is the [`unknown`](Self::unknown) location.
    pub fn is_unknown(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}({},{})", self.file, self.row, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn start_of_is_row_one_column_zero() {
        let loc = SourceLocation::start_of("main.tpp");
        assert_eq!(loc.row, 1);
        assert_eq!(loc.column, 0);
        assert_eq!(&*loc.file, "main.tpp");
    }

    #[test]
    fn display_shows_file_row_column() {
        let loc = SourceLocation {
            file: "lib/util.tpp".into(),
            row: 12,
            column: 4,
        };
        assert_eq!(loc.to_string(), "lib/util.tpp(12,4)");
    }

    #[test]
    fn unknown_displays_placeholder() {
        assert!(SourceLocation::unknown().is_unknown());
        assert_eq!(SourceLocation::unknown().to_string(), "<unknown>");
    }
}
