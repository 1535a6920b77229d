//! Struct and variable declaration lowering.

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{Expr, ExprKind, Name, StructField, TypeId};
use tpp_types::TypeClass;

use crate::ir::{Const, Global, GlobalInit, Instr, Operand};
use crate::value::Value;
use crate::Builder;

impl Builder<'_> {
    /// Lower a struct definition into the module's named aggregates.
    ///
    /// An empty field list is a forward declaration: the aggregate is
    /// created opaque. A body is given exactly once; redefining a
    /// completed aggregate is [`ErrorKind::RedefinedType`].
    pub(crate) fn lower_def_struct(
        &mut self,
        expr: &Expr,
        name: &Name,
        fields: &[StructField],
    ) -> Result<Option<Value>> {
        let symbol = name.to_string();
        if fields.is_empty() {
            self.module.declare_aggregate(&symbol);
            return Ok(None);
        }

        if self
            .module
            .aggregate(&symbol)
            .is_some_and(|a| a.body.is_some())
        {
            if let Some(origin) = self.struct_origins.get(symbol.as_str()) {
                tracing::debug!(%origin, name = %symbol, "struct previously defined here");
            }
            return Err(Error::new(
                expr.location.clone(),
                ErrorKind::RedefinedType { name: symbol },
            ));
        }

        let id = self
            .session
            .types
            .get(name, false)
            .map_err(|kind| Error::new(expr.location.clone(), kind))?;
        // Materializing the type fills the aggregate body from the
        // registry's field list.
        self.lower_type(id);
        self.struct_origins
            .insert(symbol.into(), expr.location.clone());
        Ok(None)
    }

    /// Lower a variable definition.
    ///
    /// At module scope this declares a named global storage slot and
    /// stores the initializer; inside a function it allocates a stack
    /// slot in the prologue and stores the initial value.
    pub(crate) fn lower_def_variable(
        &mut self,
        expr: &Expr,
        ty: Option<TypeId>,
        name: &Name,
        size: Option<&Expr>,
        init: Option<&Expr>,
    ) -> Result<Option<Value>> {
        if let Some(size) = size {
            return self.lower_sized_array(expr, ty, name, size, init).map(Some);
        }

        // Composite literals lower against the declared type.
        if let (Some(declared), Some(init_expr)) = (ty, init) {
            match (&init_expr.kind, self.session.types.classify(declared)) {
                (ExprKind::Object { fields }, TypeClass::Struct) => {
                    return self
                        .lower_struct_variable(expr, declared, name, Some(fields.as_slice()))
                        .map(Some);
                }
                (ExprKind::ArrayLit { size, init: fill }, TypeClass::Pointer) => {
                    // `def [T] x = [n, v]` is storage for n elements of T,
                    // like the sized-array form.
                    let elem = self.session.types.element_of(declared).ok_or_else(|| {
                        Error::new(
                            expr.location.clone(),
                            ErrorKind::NotAnArray {
                                ty: self.session.types.display(declared),
                            },
                        )
                    })?;
                    return self
                        .lower_sized_array(expr, Some(elem), name, size, fill.as_deref())
                        .map(Some);
                }
                _ => {}
            }
        }

        // A struct variable without an initializer still gets its field
        // defaults applied.
        if init.is_none() {
            if let Some(declared) = ty {
                if self.session.types.classify(declared) == TypeClass::Struct {
                    return self
                        .lower_struct_variable(expr, declared, name, None)
                        .map(Some);
                }
            }
        }

        let init_value = match init {
            Some(init) => Some(self.lower_value(init)?),
            None => None,
        };
        let sem_ty = match (ty, &init_value) {
            (Some(declared), _) => declared,
            (None, Some(value)) => value.ty(),
            (None, None) => {
                return Err(Error::new(
                    expr.location.clone(),
                    ErrorKind::UnknownType {
                        name: name.to_string(),
                    },
                ));
            }
        };

        let value = if self.is_global() {
            self.declare_global_scalar(expr, sem_ty, name, init_value)?
        } else {
            let ir = self.lower_type(sem_ty);
            let slot = self.emit_alloca(ir, Self::const_i64(1));
            let stored = match init_value {
                Some(value) => value,
                // Default-initialize to the type's zero value.
                None => {
                    let zero = self.zero_of(sem_ty);
                    Value::rvalue(sem_ty, zero)
                }
            };
            self.store_into(sem_ty, Operand::Value(slot), stored, &expr.location)?;
            Value::lvalue(sem_ty, Operand::Value(slot))
        };

        self.define(name, value.clone());
        Ok(Some(value))
    }

    /// A scalar global: named storage, zero- or constant-initialized;
    /// non-constant initializers are stored from the module initializer.
    fn declare_global_scalar(
        &mut self,
        expr: &Expr,
        sem_ty: TypeId,
        name: &Name,
        init_value: Option<Value>,
    ) -> Result<Value> {
        let symbol: Box<str> = name.to_string().into();
        let ir = self.lower_type(sem_ty);

        let mut global_init = GlobalInit::Zero;
        let mut deferred = None;
        if let Some(value) = init_value {
            let value = self.cast(value, sem_ty, &expr.location)?;
            let operand = self.read(&value)?;
            match operand {
                Operand::Const(c) => global_init = GlobalInit::Const(c),
                other => deferred = Some(other),
            }
        }

        self.module.add_global(Global {
            name: symbol.clone(),
            ty: ir,
            count: 1,
            init: global_init,
        });
        if let Some(operand) = deferred {
            self.emit(Instr::Store {
                ptr: Operand::Const(Const::GlobalAddr(symbol.clone())),
                value: operand,
            });
        }
        Ok(Value::lvalue(
            sem_ty,
            Operand::Const(Const::GlobalAddr(symbol)),
        ))
    }

    /// `def Type name[size] [= fill]`: storage for `size` elements; the
    /// variable's semantic type is the array over the declared element
    /// type.
    fn lower_sized_array(
        &mut self,
        expr: &Expr,
        ty: Option<TypeId>,
        name: &Name,
        size: &Expr,
        init: Option<&Expr>,
    ) -> Result<Value> {
        let Some(elem) = ty else {
            return Err(Error::new(
                expr.location.clone(),
                ErrorKind::UnknownType {
                    name: name.to_string(),
                },
            ));
        };
        let array_ty = self.session.types.array_of(elem);
        let elem_ir = self.lower_type(elem);

        let size_v = self.lower_value(size)?;
        let size_v = self.cast(size_v, TypeId::I64, &size.location)?;
        let size_op = self.read(&size_v)?;

        let storage = if self.is_global() {
            // A runtime-sized array would need stack storage, which does
            // not exist at module scope.
            let Operand::Const(Const::Int { value, .. }) = size_op else {
                return Err(Error::new(size.location.clone(), ErrorKind::GlobalAlloca));
            };
            let symbol: Box<str> = name.to_string().into();
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "global element counts are small positive constants"
            )]
            self.module.add_global(Global {
                name: symbol.clone(),
                ty: elem_ir.clone(),
                count: value as u64,
                init: GlobalInit::Zero,
            });
            Operand::Const(Const::GlobalAddr(symbol))
        } else {
            Operand::Value(self.emit_alloca(elem_ir.clone(), size_op.clone()))
        };

        if let Some(fill) = init {
            let fill_v = self.lower_value(fill)?;
            let fill_v = self.cast(fill_v, elem, &fill.location)?;
            let fill_op = self.read(&fill_v)?;
            self.emit_fill(storage.clone(), size_op, fill_op, &elem_ir);
        }

        let value = Value::rvalue(array_ty, storage);
        self.define(name, value.clone());
        Ok(value)
    }

    /// A struct-typed variable: storage plus ordered field
    /// initialization (explicit initializers, then declared defaults,
    /// then zero).
    fn lower_struct_variable(
        &mut self,
        expr: &Expr,
        declared: TypeId,
        name: &Name,
        inits: Option<&[Expr]>,
    ) -> Result<Value> {
        let ir = self.lower_type(declared);
        let ptr = if self.is_global() {
            let symbol: Box<str> = name.to_string().into();
            self.module.add_global(Global {
                name: symbol.clone(),
                ty: ir,
                count: 1,
                init: GlobalInit::Zero,
            });
            Operand::Const(Const::GlobalAddr(symbol))
        } else {
            Operand::Value(self.emit_alloca(ir, Self::const_i64(1)))
        };

        self.lower_object_into(ptr.clone(), declared, inits.unwrap_or(&[]), &expr.location)?;
        let value = Value::lvalue(declared, ptr);
        self.define(name, value.clone());
        Ok(value)
    }
}
