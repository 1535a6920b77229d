//! Structural type data.

use tpp_ir::{Name, StructField, TypeId};

/// The underlying kind of a primitive type.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PrimitiveKind {
    Int { bits: u32 },
    Float { bits: u32 },
    Void,
}

/// Structural data for one interned type.
#[derive(Clone, Debug)]
pub enum TypeData {
    /// Named scalar from the fixed startup set (`i1..i128`, `f16..f64`,
    /// `void`).
    Primitive {
        name: Box<str>,
        kind: PrimitiveKind,
    },
    /// Array wrapping a base type. Canonical key: the base handle.
    Array { base: TypeId },
    /// Function signature. Canonical key: result + params + variadic flag.
    Function {
        result: TypeId,
        params: Box<[TypeId]>,
        variadic: bool,
    },
    /// Named struct. `fields` is `None` while the struct is opaque.
    Struct {
        name: Name,
        fields: Option<Vec<StructField>>,
    },
}

/// Coarse classification used by the cast and promotion rules.
///
/// Arrays classify as pointers: an array value is a pointer to its
/// element storage.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TypeClass {
    Int { bits: u32 },
    Float { bits: u32 },
    Pointer,
    Void,
    Struct,
    Function,
}
