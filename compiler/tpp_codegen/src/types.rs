//! Semantic-to-IR type lowering.
//!
//! Primitive names map 1:1 to fixed-width IR types, arrays lower to a
//! pointer to the element's lowered type, functions to a callable
//! signature, and structs to a named aggregate, created opaque on first
//! reference and given a body as soon as the registry knows the fields.

use tpp_ir::TypeId;
use tpp_types::{PrimitiveKind, TypeData};

use crate::ir::IrType;
use crate::Builder;

impl Builder<'_> {
    pub(crate) fn lower_type(&mut self, id: TypeId) -> IrType {
        match self.session.types.data(id) {
            TypeData::Primitive { kind, .. } => match kind {
                PrimitiveKind::Int { bits } => IrType::Int { bits },
                PrimitiveKind::Float { bits } => IrType::Float { bits },
                PrimitiveKind::Void => IrType::Void,
            },
            TypeData::Array { base } => IrType::ptr_to(self.lower_type(base)),
            TypeData::Function {
                result,
                params,
                variadic,
            } => IrType::Func {
                result: Box::new(self.lower_type(result)),
                params: params.iter().map(|&p| self.lower_type(p)).collect(),
                variadic,
            },
            TypeData::Struct { name, fields } => {
                let symbol: Box<str> = name.to_string().into();
                self.module.declare_aggregate(&symbol);
                if let Some(fields) = fields {
                    let opaque = self
                        .module
                        .aggregate(&symbol)
                        .is_some_and(|a| a.body.is_none());
                    // The `filling` set breaks the cycle for structs that
                    // mention themselves in their own body.
                    if opaque && !self.filling.contains(&symbol) {
                        self.filling.insert(symbol.clone());
                        let body: Vec<IrType> =
                            fields.iter().map(|f| self.lower_type(f.ty)).collect();
                        self.module.complete_aggregate(&symbol, body);
                        self.filling.remove(&symbol);
                    }
                }
                IrType::Aggregate(symbol)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tpp_ir::Name;
    use tpp_types::CompilationSession;

    #[test]
    fn primitives_lower_one_to_one() {
        let session = CompilationSession::new();
        let mut builder = Builder::new(&session, "test");
        assert_eq!(builder.lower_type(TypeId::I32), IrType::Int { bits: 32 });
        assert_eq!(builder.lower_type(TypeId::F16), IrType::Float { bits: 16 });
        assert_eq!(builder.lower_type(TypeId::VOID), IrType::Void);
    }

    #[test]
    fn arrays_lower_to_element_pointers() {
        let session = CompilationSession::new();
        let mut builder = Builder::new(&session, "test");
        let array = session.types.array_of(TypeId::I64);
        assert_eq!(
            builder.lower_type(array),
            IrType::ptr_to(IrType::Int { bits: 64 })
        );
    }

    #[test]
    fn opaque_struct_lowers_to_bodiless_aggregate() {
        let session = CompilationSession::new();
        let mut builder = Builder::new(&session, "test");
        let id = session.types.declare_struct(&Name::single("Node"));
        let lowered = builder.lower_type(id);
        assert_eq!(lowered, IrType::Aggregate("Node".into()));
        assert!(builder
            .module()
            .aggregate("Node")
            .is_some_and(|a| a.body.is_none()));
    }

    #[test]
    fn completed_struct_gets_a_body_once() {
        let session = CompilationSession::new();
        let mut builder = Builder::new(&session, "test");
        let fields = vec![
            tpp_ir::StructField {
                ty: TypeId::I32,
                name: Name::single("x"),
                init: None,
            },
            tpp_ir::StructField {
                ty: TypeId::F64,
                name: Name::single("y"),
                init: None,
            },
        ];
        let id = session
            .types
            .create_struct(&Name::single("Point"), fields)
            .expect("create");
        builder.lower_type(id);
        let body = builder
            .module()
            .aggregate("Point")
            .and_then(|a| a.body.clone());
        assert_eq!(
            body,
            Some(vec![IrType::Int { bits: 32 }, IrType::Float { bits: 64 }])
        );
    }

    #[test]
    fn self_referential_struct_terminates() {
        let session = CompilationSession::new();
        let mut builder = Builder::new(&session, "test");
        let name = Name::single("List");
        let id = session.types.declare_struct(&name);
        let fields = vec![tpp_ir::StructField {
            ty: id,
            name: Name::single("next"),
            init: None,
        }];
        session.types.create_struct(&name, fields).expect("create");
        let lowered = builder.lower_type(id);
        assert_eq!(lowered, IrType::Aggregate("List".into()));
    }
}
