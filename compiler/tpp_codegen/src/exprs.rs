//! Lowering of operators, indexing, member access, and composite
//! literals.

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{Expr, ExprKind, SourceLocation, TypeId};
use tpp_types::TypeClass;

use crate::ir::{BinOp, CmpOp, Const, Instr, IrType, Operand};
use crate::value::Value;
use crate::Builder;

impl Builder<'_> {
    pub(crate) fn lower_binary(
        &mut self,
        expr: &Expr,
        op: &str,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Value> {
        match op {
            "=" => self.lower_assign(expr, lhs, rhs),
            "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" | ">>>=" => {
                let base = op.strip_suffix('=').unwrap_or(op);
                self.lower_compound_assign(expr, base, lhs, rhs)
            }
            _ => {
                let lhs_v = self.lower_value(lhs)?;
                let rhs_v = self.lower_value(rhs)?;
                self.apply_binary(&expr.location, op, lhs_v, rhs_v)
            }
        }
    }

    /// `target = value`: the target must be an l-value; the incoming
    /// value is cast to the storage type before the store.
    fn lower_assign(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let target = self.lower_value(lhs)?;
        let Value::LValue { ty, ptr } = target else {
            return Err(Error::new(expr.location.clone(), ErrorKind::AssignToRValue));
        };
        let value = self.lower_value(rhs)?;
        self.store_into(ty, ptr.clone(), value, &expr.location)?;
        Ok(Value::lvalue(ty, ptr))
    }

    /// `target op= value` applies the base operator and stores back.
    /// The target is lowered once.
    fn lower_compound_assign(
        &mut self,
        expr: &Expr,
        base_op: &str,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Value> {
        let target = self.lower_value(lhs)?;
        let Value::LValue { ty, ptr } = target.clone() else {
            return Err(Error::new(expr.location.clone(), ErrorKind::AssignToRValue));
        };
        let rhs_v = self.lower_value(rhs)?;
        let result = self.apply_binary(&expr.location, base_op, target, rhs_v)?;
        self.store_into(ty, ptr.clone(), result, &expr.location)?;
        Ok(Value::lvalue(ty, ptr))
    }

    /// Binary operator on two computed values. Both operands are promoted
    /// to their common type first.
    pub(crate) fn apply_binary(
        &mut self,
        location: &SourceLocation,
        op: &str,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        match op {
            "&&" | "||" => {
                let lhs = self.truthy(lhs, location)?;
                let rhs = self.truthy(rhs, location)?;
                let bin = if op == "&&" { BinOp::And } else { BinOp::Or };
                let dest = self.new_value(IrType::I1);
                self.emit(Instr::Bin {
                    dest,
                    op: bin,
                    ty: IrType::I1,
                    lhs,
                    rhs,
                });
                Ok(Value::rvalue(TypeId::I1, Operand::Value(dest)))
            }
            "<" | ">" | "<=" | ">=" | "==" => {
                let (lhs, rhs, common) = self.promote_pair(lhs, rhs, location)?;
                let cmp = match op {
                    "<" => CmpOp::Lt,
                    ">" => CmpOp::Gt,
                    "<=" => CmpOp::Le,
                    ">=" => CmpOp::Ge,
                    _ => CmpOp::Eq,
                };
                let ty = self.lower_type(common);
                let dest = self.new_value(IrType::I1);
                self.emit(Instr::Cmp {
                    dest,
                    op: cmp,
                    ty,
                    lhs,
                    rhs,
                });
                Ok(Value::rvalue(TypeId::I1, Operand::Value(dest)))
            }
            "+" | "-" | "*" | "/" | "%" => {
                let (lhs, rhs, common) = self.promote_pair(lhs, rhs, location)?;
                let bin = match op {
                    "+" => BinOp::Add,
                    "-" => BinOp::Sub,
                    "*" => BinOp::Mul,
                    "/" => BinOp::Div,
                    _ => BinOp::Rem,
                };
                let ty = self.lower_type(common);
                let dest = self.new_value(ty.clone());
                self.emit(Instr::Bin {
                    dest,
                    op: bin,
                    ty,
                    lhs,
                    rhs,
                });
                Ok(Value::rvalue(common, Operand::Value(dest)))
            }
            "&" | "|" | "^" | "<<" | ">>" | ">>>" => {
                let (lhs, rhs, common) = self.promote_pair(lhs, rhs, location)?;
                if !matches!(self.session.types.classify(common), TypeClass::Int { .. }) {
                    return Err(Error::new(
                        location.clone(),
                        ErrorKind::UnsupportedNode {
                            what: "bitwise operation on non-integer operands",
                        },
                    ));
                }
                let bin = match op {
                    "&" => BinOp::And,
                    "|" => BinOp::Or,
                    "^" => BinOp::Xor,
                    "<<" => BinOp::Shl,
                    ">>" => BinOp::Shr,
                    _ => BinOp::LShr,
                };
                let ty = self.lower_type(common);
                let dest = self.new_value(ty.clone());
                self.emit(Instr::Bin {
                    dest,
                    op: bin,
                    ty,
                    lhs,
                    rhs,
                });
                Ok(Value::rvalue(common, Operand::Value(dest)))
            }
            _ => Err(Error::new(
                location.clone(),
                ErrorKind::Syntax {
                    found: op.to_string(),
                },
            )),
        }
    }

    pub(crate) fn lower_unary(&mut self, expr: &Expr, op: &str, operand: &Expr) -> Result<Value> {
        let value = self.lower_value(operand)?;
        match op {
            // `!x` is `x == 0`: truthiness, inverted.
            "!" => {
                let truth = self.truthy(value, &expr.location)?;
                let dest = self.new_value(IrType::I1);
                self.emit(Instr::Bin {
                    dest,
                    op: BinOp::Xor,
                    ty: IrType::I1,
                    lhs: truth,
                    rhs: Self::const_i1(true),
                });
                Ok(Value::rvalue(TypeId::I1, Operand::Value(dest)))
            }
            "-" => {
                let ty = value.ty();
                let class = self.session.types.classify(ty);
                if !matches!(class, TypeClass::Int { .. } | TypeClass::Float { .. }) {
                    return Err(Error::new(
                        expr.location.clone(),
                        ErrorKind::UnsupportedNode {
                            what: "negation of a non-numeric value",
                        },
                    ));
                }
                let operand = self.read(&value)?;
                let ir = self.lower_type(ty);
                let dest = self.new_value(ir.clone());
                self.emit(Instr::Bin {
                    dest,
                    op: BinOp::Sub,
                    ty: ir.clone(),
                    lhs: Operand::Const(Const::Zero(ir)),
                    rhs: operand,
                });
                Ok(Value::rvalue(ty, Operand::Value(dest)))
            }
            _ => Err(Error::new(
                expr.location.clone(),
                ErrorKind::Syntax {
                    found: op.to_string(),
                },
            )),
        }
    }

    /// `base[index]`: the base must have an array type. Yields an
    /// l-value of the element type.
    pub(crate) fn lower_index(&mut self, expr: &Expr, base: &Expr, index: &Expr) -> Result<Value> {
        let base_v = self.lower_value(base)?;
        let Some(elem) = self.session.types.element_of(base_v.ty()) else {
            return Err(Error::new(
                expr.location.clone(),
                ErrorKind::NotAnArray {
                    ty: self.session.types.display(base_v.ty()),
                },
            ));
        };
        let base_op = self.read(&base_v)?;

        let index_v = self.lower_value(index)?;
        let index_v = self.cast(index_v, TypeId::I64, &index.location)?;
        let index_op = self.read(&index_v)?;

        let elem_ir = self.lower_type(elem);
        let dest = self.new_value(IrType::ptr_to(elem_ir.clone()));
        self.emit(Instr::Gep {
            dest,
            elem: elem_ir,
            base: base_op,
            index: index_op,
        });
        Ok(Value::lvalue(elem, Operand::Value(dest)))
    }

    /// `base.member`: resolved against the base's struct field list by
    /// name. Yields an l-value of the field type.
    pub(crate) fn lower_member(&mut self, expr: &Expr, base: &Expr, member: &str) -> Result<Value> {
        let base_v = self.lower_value(base)?;
        let ty = base_v.ty();
        let unknown = |builder: &Builder<'_>| {
            Error::new(
                expr.location.clone(),
                ErrorKind::UnknownMember {
                    ty: builder.session.types.display(ty),
                    member: member.to_string(),
                },
            )
        };
        let Some(fields) = self.session.types.struct_fields(ty) else {
            return Err(unknown(self));
        };
        let Some(index) = fields.iter().position(|f| f.name.last() == Some(member)) else {
            return Err(unknown(self));
        };
        let field_ty = fields[index].ty;

        let aggregate: Box<str> = match self.session.types.name_of(ty) {
            Some(name) => name.to_string().into(),
            None => return Err(unknown(self)),
        };
        // Materialize the aggregate (and its body) in the module.
        let agg_ir = self.lower_type(ty);

        let base_ptr = match &base_v {
            Value::LValue { ptr, .. } => ptr.clone(),
            // A computed struct value gets spilled to a temporary slot so
            // its field has an address.
            Value::RValue { operand, .. } => {
                let slot = self.emit_alloca(agg_ir, Self::const_i64(1));
                self.emit(Instr::Store {
                    ptr: Operand::Value(slot),
                    value: operand.clone(),
                });
                Operand::Value(slot)
            }
        };

        let field_ir = self.lower_type(field_ty);
        let dest = self.new_value(IrType::ptr_to(field_ir));
        #[allow(
            clippy::cast_possible_truncation,
            reason = "struct field count fits in u32"
        )]
        self.emit(Instr::FieldPtr {
            dest,
            aggregate,
            base: base_ptr,
            field: index as u32,
        });
        Ok(Value::lvalue(field_ty, Operand::Value(dest)))
    }

    /// Lower an object literal's field initializers into the storage at
    /// `ptr`.
    ///
    /// Initializers are ordered; a `field = expr` entry targets the named
    /// field and moves the position cursor past it. Unspecified fields
    /// fall back to the field's declared default, then to zero.
    pub(crate) fn lower_object_into(
        &mut self,
        ptr: Operand,
        struct_ty: TypeId,
        inits: &[Expr],
        location: &SourceLocation,
    ) -> Result<()> {
        let Some(fields) = self.session.types.struct_fields(struct_ty) else {
            return Err(Error::new(
                location.clone(),
                ErrorKind::UnknownType {
                    name: self.session.types.display(struct_ty),
                },
            ));
        };
        let aggregate: Box<str> = self
            .session
            .types
            .name_of(struct_ty)
            .map(|n| n.to_string())
            .unwrap_or_default()
            .into();
        self.lower_type(struct_ty);

        // Pair each initializer with its target field.
        let mut provided: Vec<Option<&Expr>> = vec![None; fields.len()];
        let mut cursor = 0usize;
        for init in inits {
            let named = match &init.kind {
                ExprKind::Binary { op, lhs, rhs } if &**op == "=" => match &lhs.kind {
                    ExprKind::Ident { name } if name.is_single() => fields
                        .iter()
                        .position(|f| f.name.last() == name.last())
                        .map(|index| (index, &**rhs)),
                    _ => None,
                },
                _ => None,
            };
            match named {
                Some((index, value)) => {
                    provided[index] = Some(value);
                    cursor = index + 1;
                }
                None => {
                    if cursor >= fields.len() {
                        return Err(Error::new(
                            init.location.clone(),
                            ErrorKind::UnsupportedNode {
                                what: "object literal with more initializers than fields",
                            },
                        ));
                    }
                    provided[cursor] = Some(init);
                    cursor += 1;
                }
            }
        }

        for (index, field) in fields.iter().enumerate() {
            let value = match provided[index] {
                Some(init) => self.lower_field_init(field.ty, init)?,
                None => match &field.init {
                    Some(default) => self.lower_field_init(field.ty, default)?,
                    None => {
                        let zero = self.zero_of(field.ty);
                        Value::rvalue(field.ty, zero)
                    }
                },
            };
            let field_ir = self.lower_type(field.ty);
            let dest = self.new_value(IrType::ptr_to(field_ir));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "struct field count fits in u32"
            )]
            self.emit(Instr::FieldPtr {
                dest,
                aggregate: aggregate.clone(),
                base: ptr.clone(),
                field: index as u32,
            });
            self.store_into(field.ty, Operand::Value(dest), value, location)?;
        }
        Ok(())
    }

    /// A field initializer, lowered against the field's declared type so
    /// composite literals nest.
    fn lower_field_init(&mut self, field_ty: TypeId, init: &Expr) -> Result<Value> {
        match (&init.kind, self.session.types.classify(field_ty)) {
            (ExprKind::ArrayLit { size, init: fill }, TypeClass::Pointer) => {
                if let Some(elem) = self.session.types.element_of(field_ty) {
                    return self.lower_array_lit(elem, size, fill.as_deref(), &init.location);
                }
                self.lower_value(init)
            }
            (ExprKind::Object { fields }, TypeClass::Struct) => {
                let ir = self.lower_type(field_ty);
                let slot = self.emit_alloca(ir, Self::const_i64(1));
                self.lower_object_into(
                    Operand::Value(slot),
                    field_ty,
                    fields,
                    &init.location,
                )?;
                Ok(Value::lvalue(field_ty, Operand::Value(slot)))
            }
            _ => self.lower_value(init),
        }
    }

    /// `[size]` / `[size, fill]` with a known element type: allocate
    /// storage and optionally fill every element.
    pub(crate) fn lower_array_lit(
        &mut self,
        elem: TypeId,
        size: &Expr,
        fill: Option<&Expr>,
        location: &SourceLocation,
    ) -> Result<Value> {
        let size_v = self.lower_value(size)?;
        let size_v = self.cast(size_v, TypeId::I64, &size.location)?;
        let size_op = self.read(&size_v)?;

        let elem_ir = self.lower_type(elem);
        let ptr = self.emit_alloca(elem_ir.clone(), size_op.clone());

        if let Some(fill) = fill {
            let fill_v = self.lower_value(fill)?;
            let fill_v = self.cast(fill_v, elem, &fill.location)?;
            let fill_op = self.read(&fill_v)?;
            self.emit_fill(Operand::Value(ptr), size_op, fill_op, &elem_ir);
        }

        let array_ty = self.session.types.array_of(elem);
        Ok(Value::rvalue(array_ty, Operand::Value(ptr)))
    }

    /// Store `fill` into each of `count` elements behind `dest`.
    pub(crate) fn emit_fill(
        &mut self,
        dest: Operand,
        count: Operand,
        fill: Operand,
        elem: &IrType,
    ) {
        let counter = self.emit_alloca(IrType::I64, Self::const_i64(1));
        self.emit(Instr::Store {
            ptr: Operand::Value(counter),
            value: Self::const_i64(0),
        });

        let header = self.new_block("fill.cond");
        self.terminate(crate::ir::Terminator::Br(header));
        self.switch_to(header);

        let current = self.new_value(IrType::I64);
        self.emit(Instr::Load {
            dest: current,
            ty: IrType::I64,
            ptr: Operand::Value(counter),
        });
        let more = self.new_value(IrType::I1);
        self.emit(Instr::Cmp {
            dest: more,
            op: CmpOp::Lt,
            ty: IrType::I64,
            lhs: Operand::Value(current),
            rhs: count,
        });

        let body = self.new_block("fill.body");
        let done = self.new_block("fill.end");
        self.terminate(crate::ir::Terminator::CondBr {
            cond: Operand::Value(more),
            then_block: body,
            else_block: done,
        });

        self.switch_to(body);
        let slot = self.new_value(IrType::ptr_to(elem.clone()));
        self.emit(Instr::Gep {
            dest: slot,
            elem: elem.clone(),
            base: dest,
            index: Operand::Value(current),
        });
        self.emit(Instr::Store {
            ptr: Operand::Value(slot),
            value: fill,
        });
        let next = self.new_value(IrType::I64);
        self.emit(Instr::Bin {
            dest: next,
            op: BinOp::Add,
            ty: IrType::I64,
            lhs: Operand::Value(current),
            rhs: Self::const_i64(1),
        });
        self.emit(Instr::Store {
            ptr: Operand::Value(counter),
            value: Operand::Value(next),
        });
        self.terminate(crate::ir::Terminator::Br(header));

        self.switch_to(done);
    }
}
