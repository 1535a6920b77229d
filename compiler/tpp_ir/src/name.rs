//! Namespace-qualified identifiers.
//!
//! A [`Name`] is an ordered sequence of path segments (`a:b:c`). Two names
//! are equal iff their segment sequences are equal component-wise, in
//! order. Names are the canonical key for type lookup, function lookup,
//! and variable binding.

use std::fmt;

use smallvec::SmallVec;

/// Most names are a bare identifier or a single namespace plus an
/// identifier, so two inline segments cover the common case.
type Segments = SmallVec<[Box<str>; 2]>;

/// A namespace-qualified identifier.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Name {
    segments: Segments,
}

impl Name {
    /// A single-segment name.
    pub fn single(segment: impl Into<Box<str>>) -> Self {
        let mut segments = Segments::new();
        segments.push(segment.into());
        Name { segments }
    }

    /// Build a name from an ordered list of segments.
    pub fn from_segments<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Box<str>>,
    {
        Name {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a `:`-separated name, ignoring empty segments.
    ///
    /// `"a:b"` becomes `[a, b]`; `"x"` becomes `[x]`.
    pub fn parse(text: &str) -> Self {
        Name {
            segments: text
                .split(':')
                .filter(|s| !s.is_empty())
                .map(Box::from)
                .collect(),
        }
    }

    /// This name prefixed with the given namespace segments.
    pub fn qualified_with(&self, prefix: &[Box<str>]) -> Self {
        let mut segments: Segments = prefix.iter().cloned().collect();
        segments.extend(self.segments.iter().cloned());
        Name { segments }
    }

    /// Append a trailing segment, as when a field or member extends a path.
    pub fn child(&self, segment: impl Into<Box<str>>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Name { segments }
    }

    pub fn segments(&self) -> &[Box<str>] {
        &self.segments
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(AsRef::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `true` for a bare, unqualified identifier.
    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_splits_on_colon() {
        let name = Name::parse("std:io:print");
        assert_eq!(name.segments().len(), 3);
        assert_eq!(name.to_string(), "std:io:print");
    }

    #[test]
    fn parse_single_segment() {
        let name = Name::parse("main");
        assert!(name.is_single());
        assert_eq!(name.last(), Some("main"));
    }

    #[test]
    fn equality_is_component_wise() {
        assert_eq!(Name::parse("a:b"), Name::from_segments(["a", "b"]));
        assert_ne!(Name::parse("a:b"), Name::parse("b:a"));
        assert_ne!(Name::parse("a"), Name::parse("a:a"));
    }

    #[test]
    fn qualified_with_prepends_prefix() {
        let prefix: Vec<Box<str>> = vec!["math".into()];
        let name = Name::single("sqrt").qualified_with(&prefix);
        assert_eq!(name.to_string(), "math:sqrt");
    }

    #[test]
    fn qualified_with_empty_prefix_is_identity() {
        let name = Name::single("x");
        assert_eq!(name.qualified_with(&[]), name);
    }

    #[test]
    fn child_appends_segment() {
        let name = Name::parse("geo:point").child("x");
        assert_eq!(name.to_string(), "geo:point:x");
    }
}
