//! Declarations and directives: `def`, `struct`, `include`, namespaces.

use std::path::PathBuf;

use tpp_diagnostic::{Error, Result};
use tpp_ir::{Expr, ExprKind, Name, Param, StructField, TokenKind};

use crate::parser::{parse_file_inner, Callback};
use crate::Parser;

impl Parser<'_> {
    /// `include "path"`: recursively parse the named file. Relative
    /// paths resolve against the including file's directory.
    pub(crate) fn parse_include(
        &mut self,
        visited: &mut Vec<PathBuf>,
        callback: &mut Callback<'_>,
    ) -> Result<()> {
        self.expect("include")?;
        let filename = self.expect_kind(TokenKind::String)?.text;

        let mut path = PathBuf::from(&filename);
        if !path.is_absolute() {
            path = self.dir.join(&filename);
        }
        parse_file_inner(&path, self.session, visited, callback)
    }

    /// A namespace toggle: `:` followed by an identifier. Pushes the
    /// segment unless it is already the innermost active one, in which
    /// case it pops. Directives are paired enter/leave markers keyed by
    /// matching names, not a brace-scoped block.
    pub(crate) fn parse_namespace(&mut self) -> Result<()> {
        self.expect(":")?;
        let name = self.expect_kind(TokenKind::Identifier)?.text;

        if self.namespace.last().is_none_or(|last| **last != *name) {
            self.namespace.push(name.into());
        } else {
            self.namespace.pop();
        }
        Ok(())
    }

    /// `struct Name { Type field [= init], ... }` or a bare `struct Name`
    /// forward declaration.
    ///
    /// The struct is registered with the type registry immediately, not
    /// deferred to lowering; redefining a completed struct fails here.
    pub(crate) fn parse_struct(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("struct")?;
        let name_token = self.expect_kind(TokenKind::Identifier)?;
        let name = Name::single(name_token.text);

        if !self.next_if_at("{")? {
            self.session.types.declare_struct(&name);
            return Ok(Expr::new(
                location,
                ExprKind::DefStruct {
                    name,
                    fields: Vec::new(),
                },
            ));
        }

        let mut fields = Vec::new();
        while !self.next_if_at("}")? {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            let ty = self.parse_type()?;
            let field_name = self.parse_name()?;
            let init = if self.next_if_at("=")? {
                Some(self.parse()?)
            } else {
                None
            };
            fields.push(StructField {
                ty,
                name: field_name,
                init,
            });
            if !self.at("}") {
                self.expect(",")?;
            }
        }

        self.session
            .types
            .create_struct(&name, fields.clone())
            .map_err(|kind| Error::new(location.clone(), kind))?;

        Ok(Expr::new(location, ExprKind::DefStruct { name, fields }))
    }

    /// `def [native("sym")] Type? name ...`: a function, sized array
    /// variable, or scalar variable, told apart by what follows the name.
    pub(crate) fn parse_def(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("def")?;

        let native = if self.at("native") {
            self.advance()?;
            self.expect("(")?;
            let symbol = self.expect_kind(TokenKind::String)?.text;
            self.expect(")")?;
            Some(symbol.into())
        } else {
            None
        };

        let mut ty = Some(self.parse_type()?);
        let mut name = Name::default();

        if !(self.at("=") || self.at("(") || self.at("[")) {
            name = self.parse_name()?;
        } else {
            // No type annotation: what parsed as a type was the name.
            match ty.and_then(|id| self.session.types.name_of(id)) {
                Some(type_name) => name = type_name,
                None => return Err(self.unexpected()),
            }
            ty = None;
        }

        if !self.in_function {
            name = name.qualified_with(&self.namespace);
        }

        if self.next_if_at("(")? {
            return self.parse_def_function(location, ty, name, native);
        }

        if native.is_some() {
            // native("sym") only makes sense on functions.
            return Err(self.unexpected());
        }

        let size = if self.next_if_at("[")? {
            let size = self.parse()?;
            self.expect("]")?;
            Some(Box::new(size))
        } else {
            None
        };

        let init = if self.next_if_at("=")? {
            Some(Box::new(self.parse()?))
        } else {
            None
        };

        Ok(Expr::new(
            location,
            ExprKind::DefVariable {
                ty,
                name,
                size,
                init,
            },
        ))
    }

    /// Parameter list and optional body, after the opening `(`.
    fn parse_def_function(
        &mut self,
        location: tpp_ir::SourceLocation,
        result: Option<tpp_ir::TypeId>,
        name: Name,
        native: Option<Box<str>>,
    ) -> Result<Expr> {
        let mut params = Vec::new();
        let mut variadic = false;

        while !self.next_if_at(")")? {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            if self.next_if_at("?")? {
                // The variadic marker must close the parameter list.
                variadic = true;
                self.expect(")")?;
                break;
            }
            let param_ty = self.parse_type()?;
            let param_name = self.expect_kind(TokenKind::Identifier)?.text;
            params.push(Param {
                ty: param_ty,
                name: param_name.into(),
            });
            if !self.at(")") {
                self.expect(",")?;
            }
        }

        let was_in_function = self.in_function;
        self.in_function = true;
        let body = if self.next_if_at("=")? {
            Some(Box::new(self.parse()?))
        } else {
            None
        };
        self.in_function = was_in_function;

        Ok(Expr::new(
            location,
            ExprKind::DefFunction {
                result,
                name,
                params,
                variadic,
                native,
                body,
            },
        ))
    }
}
