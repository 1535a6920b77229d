//! The interning type registry.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use tpp_diagnostic::ErrorKind;
use tpp_ir::{Name, StructField, TypeId};

use crate::data::{PrimitiveKind, TypeClass, TypeData};

/// Structural key for function signatures.
type FunctionKey = (TypeId, Box<[TypeId]>, bool);

struct RegistryInner {
    /// All interned types, indexed by `TypeId`.
    types: Vec<TypeData>,
    /// Named types: primitives and structs.
    by_name: FxHashMap<Name, TypeId>,
    /// Memoized array types, keyed by base.
    arrays: FxHashMap<TypeId, TypeId>,
    /// Memoized function types, keyed by signature.
    functions: FxHashMap<FunctionKey, TypeId>,
}

impl RegistryInner {
    fn push(&mut self, data: TypeData) -> TypeId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "a compilation unit never interns anywhere near u32::MAX types"
        )]
        let id = TypeId::from_index(self.types.len() as u32);
        self.types.push(data);
        id
    }
}

/// Interns and canonicalizes types by structural key.
///
/// All methods take `&self`; compilation is single-threaded, so a
/// `RefCell` inside lets the parser and builder share one instance
/// through the session.
pub struct TypeRegistry {
    inner: RefCell<RegistryInner>,
}

/// The fixed primitive set, in `TypeId` constant order.
const PRIMITIVES: [(&str, PrimitiveKind); 10] = [
    ("i1", PrimitiveKind::Int { bits: 1 }),
    ("i8", PrimitiveKind::Int { bits: 8 }),
    ("i16", PrimitiveKind::Int { bits: 16 }),
    ("i32", PrimitiveKind::Int { bits: 32 }),
    ("i64", PrimitiveKind::Int { bits: 64 }),
    ("i128", PrimitiveKind::Int { bits: 128 }),
    ("f16", PrimitiveKind::Float { bits: 16 }),
    ("f32", PrimitiveKind::Float { bits: 32 }),
    ("f64", PrimitiveKind::Float { bits: 64 }),
    ("void", PrimitiveKind::Void),
];

impl TypeRegistry {
    /// A registry with the primitive set pre-interned at the fixed
    /// [`TypeId`] indices.
    pub fn new() -> Self {
        let mut inner = RegistryInner {
            types: Vec::with_capacity(64),
            by_name: FxHashMap::default(),
            arrays: FxHashMap::default(),
            functions: FxHashMap::default(),
        };
        for (name, kind) in PRIMITIVES {
            let id = inner.push(TypeData::Primitive {
                name: name.into(),
                kind,
            });
            inner.by_name.insert(Name::single(name), id);
        }
        debug_assert_eq!(inner.types.len() as u32, TypeId::PRIMITIVE_COUNT);
        TypeRegistry {
            inner: RefCell::new(inner),
        }
    }

    /// Look up a named type.
    ///
    /// With `allow_unknown`, an unknown name fabricates an opaque struct
    /// placeholder registered under that name; a later struct definition
    /// completes it in place, so handles obtained here stay valid.
    /// Without it, an unknown name is an [`ErrorKind::UnknownType`].
    pub fn get(&self, name: &Name, allow_unknown: bool) -> Result<TypeId, ErrorKind> {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.by_name.get(name) {
            return Ok(id);
        }
        if !allow_unknown {
            return Err(ErrorKind::UnknownType {
                name: name.to_string(),
            });
        }
        let id = inner.push(TypeData::Struct {
            name: name.clone(),
            fields: None,
        });
        inner.by_name.insert(name.clone(), id);
        Ok(id)
    }

    /// The array type over `base`. Memoized: repeated requests return the
    /// identical handle.
    pub fn array_of(&self, base: TypeId) -> TypeId {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.arrays.get(&base) {
            return id;
        }
        let id = inner.push(TypeData::Array { base });
        inner.arrays.insert(base, id);
        id
    }

    /// The function type with the given signature. Memoized by
    /// (result, params, variadic).
    pub fn function_of(&self, result: TypeId, params: &[TypeId], variadic: bool) -> TypeId {
        let key: FunctionKey = (result, params.into(), variadic);
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.functions.get(&key) {
            return id;
        }
        let id = inner.push(TypeData::Function {
            result,
            params: params.into(),
            variadic,
        });
        inner.functions.insert(key, id);
        id
    }

    /// Reserve a struct name without a body (forward declaration).
    ///
    /// Returns the existing entry whatever its state; a fresh name creates
    /// an opaque entry.
    pub fn declare_struct(&self, name: &Name) -> TypeId {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.by_name.get(name) {
            return id;
        }
        let id = inner.push(TypeData::Struct {
            name: name.clone(),
            fields: None,
        });
        inner.by_name.insert(name.clone(), id);
        id
    }

    /// Complete (or newly create) a struct with a body.
    ///
    /// An opaque entry is filled in place, preserving identity for anyone
    /// holding the earlier placeholder handle. Completing a non-opaque
    /// entry, struct or any other named type, is
    /// [`ErrorKind::RedefinedType`].
    pub fn create_struct(
        &self,
        name: &Name,
        fields: Vec<StructField>,
    ) -> Result<TypeId, ErrorKind> {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.by_name.get(name) {
            match &mut inner.types[id.index()] {
                TypeData::Struct {
                    fields: body @ None,
                    ..
                } => {
                    *body = Some(fields);
                    return Ok(id);
                }
                _ => {
                    return Err(ErrorKind::RedefinedType {
                        name: name.to_string(),
                    });
                }
            }
        }
        let id = inner.push(TypeData::Struct {
            name: name.clone(),
            fields: Some(fields),
        });
        inner.by_name.insert(name.clone(), id);
        Ok(id)
    }

    /// Coarse classification for cast/promotion decisions.
    pub fn classify(&self, id: TypeId) -> TypeClass {
        match &self.inner.borrow().types[id.index()] {
            TypeData::Primitive { kind, .. } => match *kind {
                PrimitiveKind::Int { bits } => TypeClass::Int { bits },
                PrimitiveKind::Float { bits } => TypeClass::Float { bits },
                PrimitiveKind::Void => TypeClass::Void,
            },
            TypeData::Array { .. } => TypeClass::Pointer,
            TypeData::Function { .. } => TypeClass::Function,
            TypeData::Struct { .. } => TypeClass::Struct,
        }
    }

    /// Element type of an array, or `None` for non-arrays.
    pub fn element_of(&self, id: TypeId) -> Option<TypeId> {
        match &self.inner.borrow().types[id.index()] {
            TypeData::Array { base } => Some(*base),
            _ => None,
        }
    }

    /// Fields of a completed struct; `None` for opaque structs and
    /// non-structs.
    pub fn struct_fields(&self, id: TypeId) -> Option<Vec<StructField>> {
        match &self.inner.borrow().types[id.index()] {
            TypeData::Struct {
                fields: Some(fields),
                ..
            } => Some(fields.clone()),
            _ => None,
        }
    }

    /// `true` for a struct entry whose body has not been filled yet.
    pub fn is_opaque_struct(&self, id: TypeId) -> bool {
        matches!(
            &self.inner.borrow().types[id.index()],
            TypeData::Struct { fields: None, .. }
        )
    }

    /// The declared name of a primitive or struct.
    pub fn name_of(&self, id: TypeId) -> Option<Name> {
        match &self.inner.borrow().types[id.index()] {
            TypeData::Primitive { name, .. } => Some(Name::single(name.clone())),
            TypeData::Struct { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Full structural data (cloned) for one handle.
    pub fn data(&self, id: TypeId) -> TypeData {
        self.inner.borrow().types[id.index()].clone()
    }

    /// Render a type for diagnostics: `i32`, `[i8]`, `i32(i64,...)`,
    /// struct name.
    pub fn display(&self, id: TypeId) -> String {
        match self.data(id) {
            TypeData::Primitive { name, .. } => name.into(),
            TypeData::Array { base } => format!("[{}]", self.display(base)),
            TypeData::Function {
                result,
                params,
                variadic,
            } => {
                let mut text = format!("{}(", self.display(result));
                for (i, &param) in params.iter().enumerate() {
                    if i > 0 {
                        text.push(',');
                    }
                    text.push_str(&self.display(param));
                }
                if variadic {
                    if !params.is_empty() {
                        text.push(',');
                    }
                    text.push('?');
                }
                text.push(')');
                text
            }
            TypeData::Struct { name, .. } => name.to_string(),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
