//! The abstract syntax tree.
//!
//! A closed set of expression variants; everything in a T++ source file is
//! an expression. Nodes are immutable after construction and carry only
//! parsed syntax (plus resolved [`TypeId`]s for type annotations) and a
//! source location.

use crate::{Name, SourceLocation, TypeId};

/// A parsed numeric literal.
///
/// A run of digits with an embedded `.` is a float; otherwise an integer.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum NumberLit {
    Int(i64),
    Float(f64),
}

/// A declared function parameter.
#[derive(Clone, PartialEq, Debug)]
pub struct Param {
    pub ty: TypeId,
    pub name: Box<str>,
}

/// A struct field: type, name, optional default initializer.
#[derive(Clone, PartialEq, Debug)]
pub struct StructField {
    pub ty: TypeId,
    pub name: Name,
    pub init: Option<Expr>,
}

/// An AST node: a location plus one of the closed [`ExprKind`] variants.
#[derive(Clone, PartialEq, Debug)]
pub struct Expr {
    pub location: SourceLocation,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(location: SourceLocation, kind: ExprKind) -> Self {
        Expr { location, kind }
    }
}

/// The closed set of expression variants.
#[derive(Clone, PartialEq, Debug)]
pub enum ExprKind {
    /// `struct Name { Type field [= init], ... }` or a bare forward
    /// declaration with no fields.
    DefStruct { name: Name, fields: Vec<StructField> },

    /// `def [native("sym")] Type? name(args...) [= body]`.
    DefFunction {
        result: Option<TypeId>,
        name: Name,
        params: Vec<Param>,
        variadic: bool,
        native: Option<Box<str>>,
        body: Option<Box<Expr>>,
    },

    /// `def Type? name [ [size] ] [= init]`.
    DefVariable {
        ty: Option<TypeId>,
        name: Name,
        size: Option<Box<Expr>>,
        init: Option<Box<Expr>>,
    },

    /// `-> value`.
    Return { value: Box<Expr> },

    /// `for [from, to[, step]] [-> id] body`.
    For {
        from: Box<Expr>,
        to: Box<Expr>,
        step: Option<Box<Expr>>,
        binding: Option<Box<str>>,
        body: Box<Expr>,
    },

    /// `while [condition] body`.
    While { condition: Box<Expr>, body: Box<Expr> },

    /// `if [condition] then [else other]`.
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },

    /// `( expr expr ... )`: a sequence yielding its last value.
    Group { body: Vec<Expr> },

    /// `lhs op rhs`, including assignment and compound assignment.
    Binary {
        op: Box<str>,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// `callee(args...)`.
    Call { callee: Name, args: Vec<Expr> },

    /// `base[index]`.
    Index { base: Box<Expr>, index: Box<Expr> },

    /// `base.member`.
    Member { base: Box<Expr>, member: Box<str> },

    /// A (possibly qualified) identifier reference.
    Ident { name: Name },

    Number { value: NumberLit },
    Char { value: char },
    Str { value: Box<str> },

    /// `?`: the enclosing function's variadic argument tail.
    VarArgs,

    /// `!operand` or `-operand`.
    Unary { op: Box<str>, operand: Box<Expr> },

    /// `{ init, init, ... }`: ordered field initializers.
    Object { fields: Vec<Expr> },

    /// `[ size ]` or `[ size, fill ]`.
    ArrayLit {
        size: Box<Expr>,
        init: Option<Box<Expr>>,
    },
}

impl ExprKind {
    /// Short variant name for tracing and unsupported-node diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::DefStruct { .. } => "struct definition",
            ExprKind::DefFunction { .. } => "function definition",
            ExprKind::DefVariable { .. } => "variable definition",
            ExprKind::Return { .. } => "return",
            ExprKind::For { .. } => "for loop",
            ExprKind::While { .. } => "while loop",
            ExprKind::If { .. } => "if",
            ExprKind::Group { .. } => "group",
            ExprKind::Binary { .. } => "binary operation",
            ExprKind::Call { .. } => "call",
            ExprKind::Index { .. } => "index",
            ExprKind::Member { .. } => "member access",
            ExprKind::Ident { .. } => "identifier",
            ExprKind::Number { .. } => "number literal",
            ExprKind::Char { .. } => "char literal",
            ExprKind::Str { .. } => "string literal",
            ExprKind::VarArgs => "var-args reference",
            ExprKind::Unary { .. } => "unary operation",
            ExprKind::Object { .. } => "object literal",
            ExprKind::ArrayLit { .. } => "array literal",
        }
    }
}
