//! Expression grammar: precedence climbing, postfix chains, primaries.

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{Expr, ExprKind, NumberLit, TokenKind};

use crate::Parser;

/// The fixed operator precedence table.
///
/// Assignment and compound assignment bind loosest, multiplicative
/// operators tightest. Operators missing from the table never start a
/// binary fold.
fn precedence(op: &str) -> Option<u32> {
    let level = match op {
        "=" | "<<=" | ">>=" | ">>>=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" => 0,
        "&&" | "||" => 1,
        "<" | ">" | "<=" | ">=" | "==" => 2,
        "&" | "|" | "^" => 3,
        "<<" | ">>" | ">>>" => 4,
        "+" | "-" => 5,
        "*" | "/" | "%" => 6,
        _ => return None,
    };
    Some(level)
}

impl Parser<'_> {
    /// One statement-level expression.
    pub(crate) fn parse(&mut self) -> Result<Expr> {
        if self.at("def") {
            return self.parse_def();
        }
        if self.at("->") {
            return self.parse_return();
        }
        self.parse_binary()
    }

    fn parse_return(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("->")?;
        let value = self.parse()?;
        Ok(Expr::new(
            location,
            ExprKind::Return {
                value: Box::new(value),
            },
        ))
    }

    fn parse_for(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("for")?;
        self.expect("[")?;
        let from = self.parse()?;
        self.expect(",")?;
        let to = self.parse()?;

        let step = if self.next_if_at("]")? {
            None
        } else {
            self.expect(",")?;
            let step = self.parse()?;
            self.expect("]")?;
            Some(Box::new(step))
        };

        let binding = if self.next_if_at("->")? {
            Some(self.expect_kind(TokenKind::Identifier)?.text.into())
        } else {
            None
        };

        let body = self.parse()?;
        Ok(Expr::new(
            location,
            ExprKind::For {
                from: Box::new(from),
                to: Box::new(to),
                step,
                binding,
                body: Box::new(body),
            },
        ))
    }

    fn parse_while(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("while")?;
        self.expect("[")?;
        let condition = self.parse()?;
        self.expect("]")?;
        let body = self.parse()?;
        Ok(Expr::new(
            location,
            ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
        ))
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("if")?;
        self.expect("[")?;
        let condition = self.parse()?;
        self.expect("]")?;
        let then_branch = self.parse()?;

        let else_branch = if self.next_if_at("else")? {
            Some(Box::new(self.parse()?))
        } else {
            None
        };

        Ok(Expr::new(
            location,
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
        ))
    }

    /// `( expr expr ... )`: a sequence yielding its last value.
    fn parse_group(&mut self) -> Result<Expr> {
        let location = self.location();
        self.expect("(")?;
        let mut body = Vec::new();
        while !self.next_if_at(")")? {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse()?);
        }
        Ok(Expr::new(location, ExprKind::Group { body }))
    }

    fn parse_binary(&mut self) -> Result<Expr> {
        let lhs = self.parse_call()?;
        self.parse_binary_rhs(lhs, 0)
    }

    /// Precedence climbing: fold operators binding at least as tightly as
    /// `min_prec`, absorbing tighter-binding look-ahead runs into the
    /// right operand first.
    fn parse_binary_rhs(&mut self, mut lhs: Expr, min_prec: u32) -> Result<Expr> {
        while self.at_kind(TokenKind::BinaryOperator)
            && precedence(&self.token.text).is_some_and(|p| p >= min_prec)
        {
            let op = self.skip()?.text;
            let op_prec = precedence(&op).unwrap_or(0);

            let mut rhs = self.parse_call()?;
            while self.at_kind(TokenKind::BinaryOperator)
                && precedence(&self.token.text).is_some_and(|p| p > op_prec)
            {
                rhs = self.parse_binary_rhs(rhs, op_prec + 1)?;
            }

            let location = lhs.location.clone();
            lhs = Expr::new(
                location,
                ExprKind::Binary {
                    op: op.into(),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    /// A call if `(` directly follows a (possibly indexed) identifier.
    fn parse_call(&mut self) -> Result<Expr> {
        let callee = self.parse_index()?;
        if self.next_if_at("(")? {
            let mut args = Vec::new();
            while !self.next_if_at(")")? {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                args.push(self.parse()?);
                if !self.at(")") {
                    self.expect(",")?;
                }
            }

            let ExprKind::Ident { name } = callee.kind else {
                return Err(Error::new(
                    callee.location,
                    ErrorKind::Syntax {
                        found: "(".to_string(),
                    },
                ));
            };
            return Ok(Expr::new(callee.location, ExprKind::Call { callee: name, args }));
        }
        Ok(callee)
    }

    fn parse_index(&mut self) -> Result<Expr> {
        let mut base = self.parse_member()?;
        while self.next_if_at("[")? {
            let index = self.parse()?;
            self.expect("]")?;
            let location = base.location.clone();
            base = Expr::new(
                location,
                ExprKind::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                },
            );
        }
        Ok(base)
    }

    fn parse_member(&mut self) -> Result<Expr> {
        let mut object = self.parse_primary()?;
        while self.next_if_at(".")? {
            let member = self.expect_kind(TokenKind::Identifier)?.text;
            let location = object.location.clone();
            object = Expr::new(
                location,
                ExprKind::Member {
                    base: Box::new(object),
                    member: member.into(),
                },
            );
        }
        Ok(object)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        if self.at_eof() {
            return Err(self.unexpected());
        }
        let location = self.location();

        if self.at("for") {
            return self.parse_for();
        }
        if self.at("while") {
            return self.parse_while();
        }
        if self.at("if") {
            return self.parse_if();
        }

        if self.at_kind(TokenKind::Identifier) {
            let name = self.parse_name()?;
            return Ok(Expr::new(location, ExprKind::Ident { name }));
        }

        if self.at_kind(TokenKind::Number) {
            let token = self.skip()?;
            let value = parse_number(&token.text)
                .ok_or_else(|| Error::new(token.location, ErrorKind::Syntax { found: token.text.clone() }))?;
            return Ok(Expr::new(location, ExprKind::Number { value }));
        }

        if self.at_kind(TokenKind::Char) {
            let token = self.skip()?;
            let value = token.text.chars().next().unwrap_or('\0');
            return Ok(Expr::new(location, ExprKind::Char { value }));
        }

        if self.at_kind(TokenKind::String) {
            let token = self.skip()?;
            return Ok(Expr::new(
                location,
                ExprKind::Str {
                    value: token.text.into(),
                },
            ));
        }

        if self.at("(") {
            return self.parse_group();
        }

        if self.next_if_at("?")? {
            return Ok(Expr::new(location, ExprKind::VarArgs));
        }

        if self.next_if_at("!")? {
            let operand = self.parse()?;
            return Ok(Expr::new(
                location,
                ExprKind::Unary {
                    op: "!".into(),
                    operand: Box::new(operand),
                },
            ));
        }

        if self.next_if_at("-")? {
            let operand = self.parse()?;
            return Ok(Expr::new(
                location,
                ExprKind::Unary {
                    op: "-".into(),
                    operand: Box::new(operand),
                },
            ));
        }

        if self.next_if_at("{")? {
            let mut fields = Vec::new();
            while !self.next_if_at("}")? {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                fields.push(self.parse()?);
                if !self.at("}") {
                    self.expect(",")?;
                }
            }
            return Ok(Expr::new(location, ExprKind::Object { fields }));
        }

        if self.next_if_at("[")? {
            let size = self.parse()?;
            let init = if self.next_if_at(",")? {
                Some(Box::new(self.parse()?))
            } else {
                None
            };
            self.expect("]")?;
            return Ok(Expr::new(
                location,
                ExprKind::ArrayLit {
                    size: Box::new(size),
                    init,
                },
            ));
        }

        Err(self.unexpected())
    }
}

/// Digits with an embedded `.` parse as a float; plain digit runs as an
/// integer, falling back to a float on overflow.
fn parse_number(text: &str) -> Option<NumberLit> {
    if text.contains('.') {
        return text.parse::<f64>().ok().map(NumberLit::Float);
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(NumberLit::Int(value));
    }
    text.parse::<f64>().ok().map(NumberLit::Float)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tpp_diagnostic::ErrorKind;
    use tpp_ir::{Expr, ExprKind, Name, NumberLit, TypeId};
    use tpp_types::CompilationSession;

    fn parse_all(session: &CompilationSession, source: &str) -> Vec<Expr> {
        let mut nodes = Vec::new();
        crate::parse_str(source, "test.tpp", session, &mut |expr| {
            nodes.push(expr);
            Ok(())
        })
        .expect("parse failure");
        nodes
    }

    fn parse_one(session: &CompilationSession, source: &str) -> Expr {
        let mut nodes = parse_all(session, source);
        assert_eq!(nodes.len(), 1, "expected exactly one node");
        nodes.remove(0)
    }

    /// Render expression shape as a compact s-expression for precedence
    /// assertions.
    fn shape(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({op} {} {})", shape(lhs), shape(rhs))
            }
            ExprKind::Unary { op, operand } => format!("({op} {})", shape(operand)),
            ExprKind::Number {
                value: NumberLit::Int(v),
            } => v.to_string(),
            ExprKind::Number {
                value: NumberLit::Float(v),
            } => format!("{v:?}"),
            ExprKind::Ident { name } => name.to_string(),
            ExprKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(shape).collect();
                format!("{callee}[{}]", args.join(" "))
            }
            other => format!("<{}>", other.describe()),
        }
    }

    fn expr_shape(source: &str) -> String {
        let session = CompilationSession::new();
        shape(&parse_one(&session, source))
    }

    // === Precedence climbing ===

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(expr_shape("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(expr_shape("1 * 2 + 3"), "(+ (* 1 2) 3)");
    }

    #[test]
    fn same_level_operators_fold_left() {
        assert_eq!(expr_shape("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(expr_shape("8 / 4 / 2"), "(/ (/ 8 4) 2)");
    }

    #[test]
    fn lookahead_absorbs_tighter_runs() {
        assert_eq!(expr_shape("a + b * c + d"), "(+ (+ a (* b c)) d)");
        assert_eq!(expr_shape("a < b + c"), "(< a (+ b c))");
    }

    #[test]
    fn assignment_binds_loosest() {
        assert_eq!(expr_shape("x = 1 + 2"), "(= x (+ 1 2))");
        assert_eq!(expr_shape("x += y * 2"), "(+= x (* y 2))");
    }

    #[test]
    fn shifts_sit_between_bitwise_and_additive() {
        assert_eq!(expr_shape("a & b << c + d"), "(& a (<< b (+ c d)))");
    }

    // === Literals and primaries ===

    #[test]
    fn numbers_with_dot_are_floats() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "2.5");
        assert_eq!(
            expr.kind,
            ExprKind::Number {
                value: NumberLit::Float(2.5)
            }
        );
    }

    #[test]
    fn unary_operators_take_full_expressions() {
        // The reference grammar parses the unary operand as a whole
        // expression, so `-a + b` is `-(a + b)`.
        assert_eq!(expr_shape("-a + b"), "(- (+ a b))");
        assert_eq!(expr_shape("!a"), "(! a)");
    }

    #[test]
    fn qualified_identifiers() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "std:io:x");
        assert_eq!(
            expr.kind,
            ExprKind::Ident {
                name: Name::parse("std:io:x")
            }
        );
    }

    #[test]
    fn member_and_index_chains() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "p.pos[3]");
        let ExprKind::Index { base, .. } = expr.kind else {
            panic!("expected index node");
        };
        assert!(matches!(base.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn calls_require_identifier_callees() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "f(1, 2)");
        assert!(matches!(expr.kind, ExprKind::Call { ref args, .. } if args.len() == 2));
    }

    #[test]
    fn var_args_reference() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "?");
        assert_eq!(expr.kind, ExprKind::VarArgs);
    }

    #[test]
    fn object_and_array_literals() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "{ 1, 2 }");
        assert!(matches!(expr.kind, ExprKind::Object { ref fields } if fields.len() == 2));

        let expr = parse_one(&session, "[ 4, 0 ]");
        assert!(matches!(expr.kind, ExprKind::ArrayLit { init: Some(_), .. }));
    }

    // === Control forms ===

    #[test]
    fn for_loop_with_binding() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "for [0, 5] -> i i");
        let ExprKind::For { step, binding, .. } = expr.kind else {
            panic!("expected for node");
        };
        assert_eq!(step, None);
        assert_eq!(binding.as_deref(), Some("i"));
    }

    #[test]
    fn for_loop_with_step() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "for [0, 10, 2] x");
        let ExprKind::For { step, binding, .. } = expr.kind else {
            panic!("expected for node");
        };
        assert!(step.is_some());
        assert_eq!(binding, None);
    }

    #[test]
    fn if_with_else() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "if [x] 1 else 2");
        assert!(matches!(expr.kind, ExprKind::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn group_yields_sequence() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "( 1 2 3 )");
        assert!(matches!(expr.kind, ExprKind::Group { ref body } if body.len() == 3));
    }

    #[test]
    fn return_form() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "-> 42");
        assert!(matches!(expr.kind, ExprKind::Return { .. }));
    }

    // === Declarations ===

    #[test]
    fn function_definition() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "def i32 add(i32 a, i32 b) = a + b");
        let ExprKind::DefFunction {
            result,
            name,
            params,
            variadic,
            body,
            ..
        } = expr.kind
        else {
            panic!("expected function node");
        };
        assert_eq!(result, Some(TypeId::I32));
        assert_eq!(name, Name::single("add"));
        assert_eq!(params.len(), 2);
        assert!(!variadic);
        assert!(body.is_some());
    }

    #[test]
    fn variadic_marker_must_be_last() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "def i32 f(i32 a, ?)");
        assert!(matches!(
            expr.kind,
            ExprKind::DefFunction { variadic: true, ref params, .. } if params.len() == 1
        ));

        let session = CompilationSession::new();
        let result = crate::parse_str("def i32 f(?, i32 a)", "test.tpp", &session, &mut |_| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn native_linkage_name() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "def native(\"puts\") i32 puts([i8] s)");
        assert!(matches!(
            expr.kind,
            ExprKind::DefFunction { native: Some(ref s), body: None, .. } if &**s == "puts"
        ));
    }

    #[test]
    fn variable_without_type_annotation() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "def x = 5");
        let ExprKind::DefVariable { ty, name, .. } = expr.kind else {
            panic!("expected variable node");
        };
        assert_eq!(ty, None);
        assert_eq!(name, Name::single("x"));
    }

    #[test]
    fn sized_array_variable() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "def i32 buf[16]");
        let ExprKind::DefVariable { ty, size, .. } = expr.kind else {
            panic!("expected variable node");
        };
        assert_eq!(ty, Some(TypeId::I32));
        assert!(size.is_some());
    }

    #[test]
    fn array_type_annotation() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "def [i8] s = \"hi\"");
        let ExprKind::DefVariable { ty, .. } = expr.kind else {
            panic!("expected variable node");
        };
        assert_eq!(ty, Some(session.types.array_of(TypeId::I8)));
    }

    // === Namespaces ===

    #[test]
    fn namespace_toggle_qualifies_top_level_names() {
        let session = CompilationSession::new();
        let nodes = parse_all(&session, ": math def i32 x = 1 : math def i32 y = 2");
        let names: Vec<String> = nodes
            .iter()
            .map(|n| match &n.kind {
                ExprKind::DefVariable { name, .. } => name.to_string(),
                _ => panic!("expected variables"),
            })
            .collect();
        assert_eq!(names, vec!["math:x", "y"]);
    }

    #[test]
    fn nested_namespaces() {
        let session = CompilationSession::new();
        let nodes = parse_all(&session, ": a : b def i32 x = 1 : b : a");
        assert!(matches!(
            &nodes[0].kind,
            ExprKind::DefVariable { name, .. } if name.to_string() == "a:b:x"
        ));
    }

    #[test]
    fn function_body_names_are_not_qualified() {
        let session = CompilationSession::new();
        let nodes = parse_all(&session, ": ns def i32 f() = (def i32 local = 1 local) : ns");
        let ExprKind::DefFunction { name, body, .. } = &nodes[0].kind else {
            panic!("expected function");
        };
        assert_eq!(name.to_string(), "ns:f");
        // The local definition inside the body stays unqualified.
        let ExprKind::Group { body: group } = &body.as_ref().expect("body").kind else {
            panic!("expected group body");
        };
        assert!(matches!(
            &group[0].kind,
            ExprKind::DefVariable { name, .. } if name.to_string() == "local"
        ));
    }

    // === Structs ===

    #[test]
    fn struct_definition_registers_type() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "struct Point { i32 x, i32 y }");
        assert!(matches!(
            expr.kind,
            ExprKind::DefStruct { ref fields, .. } if fields.len() == 2
        ));
        let id = session
            .types
            .get(&Name::single("Point"), false)
            .expect("registered");
        assert_eq!(session.types.struct_fields(id).map(|f| f.len()), Some(2));
    }

    #[test]
    fn struct_redefinition_fails_at_parse_time() {
        let session = CompilationSession::new();
        let source = "struct Point { i32 x, i32 y } struct Point { i32 x }";
        let err = crate::parse_str(source, "test.tpp", &session, &mut |_| Ok(()))
            .expect_err("redefinition must fail");
        assert!(matches!(err.kind, ErrorKind::RedefinedType { .. }));
    }

    #[test]
    fn forward_declaration_then_definition() {
        let session = CompilationSession::new();
        let nodes = parse_all(&session, "struct Node struct Node { i32 value }");
        assert_eq!(nodes.len(), 2);
        let id = session
            .types
            .get(&Name::single("Node"), false)
            .expect("registered");
        assert!(!session.types.is_opaque_struct(id));
    }

    #[test]
    fn struct_field_defaults() {
        let session = CompilationSession::new();
        let expr = parse_one(&session, "struct Config { i32 retries = 3 }");
        let ExprKind::DefStruct { fields, .. } = expr.kind else {
            panic!("expected struct");
        };
        assert!(fields[0].init.is_some());
    }

    // === Failure policy ===

    #[test]
    fn unexpected_token_aborts() {
        let session = CompilationSession::new();
        let err = crate::parse_str("def i32 x = }", "test.tpp", &session, &mut |_| Ok(()))
            .expect_err("should fail");
        assert!(matches!(err.kind, ErrorKind::Syntax { .. }));
        assert_eq!(err.location.row, 1);
    }

    #[test]
    fn eof_inside_group_aborts() {
        let session = CompilationSession::new();
        let err = crate::parse_str("( 1 2", "test.tpp", &session, &mut |_| Ok(()))
            .expect_err("should fail");
        assert!(matches!(err.kind, ErrorKind::UnexpectedEof));
    }
}
