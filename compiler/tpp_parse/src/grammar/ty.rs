//! Type annotations and qualified names.

use tpp_diagnostic::{Error, Result};
use tpp_ir::{Name, TokenKind, TypeId};

use crate::Parser;

impl Parser<'_> {
    /// `[` type `]` for arrays, otherwise a type name.
    ///
    /// Unknown names resolve to an opaque placeholder in the registry;
    /// they may be forward-referenced structs.
    pub(crate) fn parse_type(&mut self) -> Result<TypeId> {
        if self.next_if_at("[")? {
            let base = self.parse_type()?;
            self.expect("]")?;
            return Ok(self.session.types.array_of(base));
        }

        let token = self.expect_kind(TokenKind::Identifier)?;
        self.session
            .types
            .get(&Name::single(token.text.as_str()), true)
            .map_err(|kind| Error::new(token.location, kind))
    }

    /// A `:`-separated qualified name: `a`, `a:b`, `a:b:c`.
    pub(crate) fn parse_name(&mut self) -> Result<Name> {
        let first = self.expect_kind(TokenKind::Identifier)?;
        let mut name = Name::single(first.text);

        while self.at(":") {
            self.advance()?;
            let segment = self.expect_kind(TokenKind::Identifier)?;
            name = name.child(segment.text);
        }
        Ok(name)
    }
}
