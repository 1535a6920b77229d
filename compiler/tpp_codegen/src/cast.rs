//! Casting, numeric promotion, and truthiness.

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{SourceLocation, TypeId};
use tpp_types::TypeClass;

use crate::ir::{CastKind, CmpOp, Const, Instr, IrType, Operand};
use crate::value::Value;
use crate::Builder;

impl Builder<'_> {
    /// The common type a pair of operands promotes to before a binary
    /// operation, or [`ErrorKind::NoHigherOrder`] for unordered pairs.
    ///
    /// Identical canonical types promote to themselves; otherwise floats
    /// beat integers and pointers, pointers beat integers, and within a
    /// kind the wider bit width wins.
    pub fn higher_order(&self, a: TypeId, b: TypeId) -> std::result::Result<TypeId, ErrorKind> {
        if a == b {
            return Ok(a);
        }
        let types = &self.session.types;
        match (types.classify(a), types.classify(b)) {
            (TypeClass::Float { bits: x }, TypeClass::Float { bits: y }) => {
                Ok(if x >= y { a } else { b })
            }
            (TypeClass::Float { .. }, TypeClass::Int { .. } | TypeClass::Pointer) => Ok(a),
            (TypeClass::Int { .. } | TypeClass::Pointer, TypeClass::Float { .. }) => Ok(b),
            (TypeClass::Int { bits: x }, TypeClass::Int { bits: y }) => {
                Ok(if x >= y { a } else { b })
            }
            (TypeClass::Int { .. }, TypeClass::Pointer) => Ok(b),
            (TypeClass::Pointer, TypeClass::Int { .. }) => Ok(a),
            _ => Err(ErrorKind::NoHigherOrder {
                lhs: types.display(a),
                rhs: types.display(b),
            }),
        }
    }

    /// Convert `value` to semantic type `to`.
    ///
    /// No-op when the lowered types already match. Legal conversions:
    /// integer/float widenings, narrowings and crossings (integers
    /// signed), pointer to integer, and integer to pointer. Array values
    /// do not convert to anything else; any remaining pairing is an
    /// [`ErrorKind::IllegalCast`].
    pub fn cast(&mut self, value: Value, to: TypeId, location: &SourceLocation) -> Result<Value> {
        let from = value.ty();
        if from == to {
            return Ok(value);
        }
        let from_ir = self.lower_type(from);
        let to_ir = self.lower_type(to);
        if from_ir == to_ir {
            let operand = self.read(&value)?;
            return Ok(Value::rvalue(to, operand));
        }

        let types = &self.session.types;
        let illegal = || {
            Error::new(
                location.clone(),
                ErrorKind::IllegalCast {
                    from: self.session.types.display(from),
                    to: self.session.types.display(to),
                },
            )
        };

        // An array value is its element storage; it has no scalar
        // conversions.
        if types.element_of(from).is_some() {
            return Err(illegal());
        }

        let kind = match (types.classify(from), types.classify(to)) {
            (TypeClass::Int { .. }, TypeClass::Int { .. }) => CastKind::IntToInt,
            (TypeClass::Int { .. }, TypeClass::Float { .. }) => CastKind::IntToFloat,
            (TypeClass::Float { .. }, TypeClass::Int { .. }) => CastKind::FloatToInt,
            (TypeClass::Float { .. }, TypeClass::Float { .. }) => CastKind::FloatToFloat,
            (TypeClass::Pointer, TypeClass::Int { .. }) => CastKind::PtrToInt,
            (TypeClass::Int { .. }, TypeClass::Pointer) => CastKind::IntToPtr,
            _ => return Err(illegal()),
        };

        let operand = self.read(&value)?;
        let dest = self.new_value(to_ir.clone());
        self.emit(Instr::Cast {
            dest,
            kind,
            to: to_ir,
            value: operand,
        });
        Ok(Value::rvalue(to, Operand::Value(dest)))
    }

    /// Promote both operands to their common type and materialize them.
    pub(crate) fn promote_pair(
        &mut self,
        lhs: Value,
        rhs: Value,
        location: &SourceLocation,
    ) -> Result<(Operand, Operand, TypeId)> {
        let common = self
            .higher_order(lhs.ty(), rhs.ty())
            .map_err(|kind| Error::new(location.clone(), kind))?;
        let lhs = self.cast(lhs, common, location)?;
        let lhs = self.read(&lhs)?;
        let rhs = self.cast(rhs, common, location)?;
        let rhs = self.read(&rhs)?;
        Ok((lhs, rhs, common))
    }

    /// Reduce a value to an `i1` truth operand: nonzero is true.
    pub(crate) fn truthy(&mut self, value: Value, location: &SourceLocation) -> Result<Operand> {
        let ty = value.ty();
        match self.session.types.classify(ty) {
            TypeClass::Int { bits: 1 } => self.read(&value),
            TypeClass::Int { bits } => {
                let operand = self.read(&value)?;
                let dest = self.new_value(IrType::I1);
                self.emit(Instr::Cmp {
                    dest,
                    op: CmpOp::Ne,
                    ty: IrType::Int { bits },
                    lhs: operand,
                    rhs: Operand::Const(Const::Int { bits, value: 0 }),
                });
                Ok(Operand::Value(dest))
            }
            TypeClass::Float { bits } => {
                let operand = self.read(&value)?;
                let dest = self.new_value(IrType::I1);
                self.emit(Instr::Cmp {
                    dest,
                    op: CmpOp::Ne,
                    ty: IrType::Float { bits },
                    lhs: operand,
                    rhs: Operand::Const(Const::Float { bits, value: 0.0 }),
                });
                Ok(Operand::Value(dest))
            }
            TypeClass::Pointer => {
                let operand = self.read(&value)?;
                let int = self.new_value(IrType::I64);
                self.emit(Instr::Cast {
                    dest: int,
                    kind: CastKind::PtrToInt,
                    to: IrType::I64,
                    value: operand,
                });
                let dest = self.new_value(IrType::I1);
                self.emit(Instr::Cmp {
                    dest,
                    op: CmpOp::Ne,
                    ty: IrType::I64,
                    lhs: Operand::Value(int),
                    rhs: Self::const_i64(0),
                });
                Ok(Operand::Value(dest))
            }
            TypeClass::Void | TypeClass::Struct | TypeClass::Function => Err(Error::new(
                location.clone(),
                ErrorKind::IllegalCast {
                    from: self.session.types.display(ty),
                    to: "i1".to_string(),
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tpp_types::CompilationSession;

    fn builder(session: &CompilationSession) -> Builder<'_> {
        Builder::new(session, "test")
    }

    // === Promotion table ===

    #[test]
    fn identical_types_promote_to_themselves() {
        let session = CompilationSession::new();
        let b = builder(&session);
        assert_eq!(b.higher_order(TypeId::I32, TypeId::I32), Ok(TypeId::I32));
    }

    #[test]
    fn int_and_float_promote_to_float() {
        let session = CompilationSession::new();
        let b = builder(&session);
        assert_eq!(b.higher_order(TypeId::I32, TypeId::F32), Ok(TypeId::F32));
        assert_eq!(b.higher_order(TypeId::F32, TypeId::I64), Ok(TypeId::F32));
    }

    #[test]
    fn wider_float_wins() {
        let session = CompilationSession::new();
        let b = builder(&session);
        assert_eq!(b.higher_order(TypeId::F32, TypeId::F64), Ok(TypeId::F64));
        assert_eq!(b.higher_order(TypeId::F64, TypeId::F16), Ok(TypeId::F64));
    }

    #[test]
    fn wider_int_wins() {
        let session = CompilationSession::new();
        let b = builder(&session);
        assert_eq!(b.higher_order(TypeId::I32, TypeId::I64), Ok(TypeId::I64));
        assert_eq!(b.higher_order(TypeId::I128, TypeId::I8), Ok(TypeId::I128));
    }

    #[test]
    fn pointer_beats_int_and_loses_to_float() {
        let session = CompilationSession::new();
        let b = builder(&session);
        let ptr = session.types.array_of(TypeId::I8);
        assert_eq!(b.higher_order(ptr, TypeId::I32), Ok(ptr));
        assert_eq!(b.higher_order(TypeId::I32, ptr), Ok(ptr));
        assert_eq!(b.higher_order(ptr, TypeId::F32), Ok(TypeId::F32));
    }

    #[test]
    fn unordered_pairs_have_no_higher_order() {
        let session = CompilationSession::new();
        let b = builder(&session);
        let err = b
            .higher_order(TypeId::VOID, TypeId::I32)
            .expect_err("void is unordered");
        assert!(matches!(err, ErrorKind::NoHigherOrder { .. }));

        let p = session.types.array_of(TypeId::I8);
        let q = session.types.array_of(TypeId::I32);
        assert!(b.higher_order(p, q).is_err());
    }

    // === Cast legality ===

    #[test]
    fn int_to_float_cast_succeeds() {
        let session = CompilationSession::new();
        let mut b = builder(&session);
        let value = Value::rvalue(TypeId::I32, Operand::Const(Const::Int { bits: 32, value: 7 }));
        let cast = b
            .cast(value, TypeId::F64, &SourceLocation::unknown())
            .expect("legal cast");
        assert_eq!(cast.ty(), TypeId::F64);
    }

    #[test]
    fn same_type_cast_is_a_no_op() {
        let session = CompilationSession::new();
        let mut b = builder(&session);
        let operand = Operand::Const(Const::Int { bits: 32, value: 7 });
        let value = Value::rvalue(TypeId::I32, operand.clone());
        let cast = b
            .cast(value, TypeId::I32, &SourceLocation::unknown())
            .expect("no-op cast");
        assert_eq!(cast, Value::rvalue(TypeId::I32, operand));
    }

    #[test]
    fn array_to_int_cast_is_illegal() {
        let session = CompilationSession::new();
        let mut b = builder(&session);
        let array = session.types.array_of(TypeId::I8);
        let value = Value::rvalue(array, Operand::Const(Const::Zero(IrType::ptr_to(IrType::I8))));
        let err = b
            .cast(value, TypeId::I8, &SourceLocation::unknown())
            .expect_err("array casts are illegal");
        assert!(matches!(err.kind, ErrorKind::IllegalCast { .. }));
    }

    #[test]
    fn void_casts_are_illegal() {
        let session = CompilationSession::new();
        let mut b = builder(&session);
        let value = Value::rvalue(TypeId::VOID, Operand::Const(Const::Zero(IrType::Void)));
        let err = b
            .cast(value, TypeId::I32, &SourceLocation::unknown())
            .expect_err("void casts are illegal");
        assert!(matches!(err.kind, ErrorKind::IllegalCast { .. }));
    }

    #[test]
    fn int_to_pointer_cast_succeeds() {
        // Needed by promotion: the int operand of `ptr + int` is promoted
        // to the pointer type.
        let session = CompilationSession::new();
        let mut b = builder(&session);
        let array = session.types.array_of(TypeId::I8);
        let value = Value::rvalue(TypeId::I64, Operand::Const(Const::Int { bits: 64, value: 1 }));
        let cast = b
            .cast(value, array, &SourceLocation::unknown())
            .expect("int to pointer is legal");
        assert_eq!(cast.ty(), array);
    }
}
