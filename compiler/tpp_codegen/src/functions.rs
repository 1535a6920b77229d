//! Function declaration, definition, and call lowering.

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{Expr, ExprKind, Name, Param, TypeId};

use crate::builder::FunctionInfo;
use crate::ir::{Block, Function, Instr, Operand, Signature, Terminator, ValueId};
use crate::value::Value;
use crate::{verify, Builder};

impl Builder<'_> {
    /// Declare (and, with a body, define) a function.
    ///
    /// Redeclaration with the same signature is idempotent. Overloads of
    /// one name differ by arity; a second definition of a symbol that
    /// already has a body is [`ErrorKind::RedefinedFunction`].
    #[allow(clippy::too_many_arguments, reason = "mirrors the AST node's fields")]
    pub(crate) fn lower_def_function(
        &mut self,
        expr: &Expr,
        result: Option<TypeId>,
        name: &Name,
        params: &[Param],
        variadic: bool,
        native: Option<&str>,
        body: Option<&Expr>,
    ) -> Result<Option<Value>> {
        let result_ty = result.unwrap_or(TypeId::VOID);
        let param_tys: Vec<TypeId> = params.iter().map(|p| p.ty).collect();
        // Intern the signature so repeated declarations share one type.
        self.session
            .types
            .function_of(result_ty, &param_tys, variadic);

        let symbol = self.resolve_symbol(expr, name, native, result_ty, &param_tys, variadic)?;

        if !self.functions.contains_key(&symbol) {
            let sig = Signature {
                result: self.lower_type(result_ty),
                params: param_tys.iter().map(|&t| self.lower_type(t)).collect(),
                variadic,
            };
            let mut function = Function::declaration(symbol.clone(), sig);
            function.param_names = params.iter().map(|p| p.name.clone()).collect();
            let func = self.module.add_function(function);
            self.functions.insert(
                symbol.clone(),
                FunctionInfo {
                    symbol: symbol.clone(),
                    func,
                    result: result_ty,
                    params: param_tys,
                    variadic,
                    has_body: false,
                    native: native.is_some(),
                },
            );
            self.overloads
                .entry(name.to_string())
                .or_default()
                .push(symbol.clone());
        }

        if let Some(body) = body {
            self.lower_function_body(expr, &symbol, params, body)?;
        }
        Ok(None)
    }

    /// Pick the generated symbol for a declaration: the native linkage
    /// name if given, else the qualified source name, with an arity
    /// suffix for overloads declared after the first.
    fn resolve_symbol(
        &self,
        expr: &Expr,
        name: &Name,
        native: Option<&str>,
        result: TypeId,
        params: &[TypeId],
        variadic: bool,
    ) -> Result<Box<str>> {
        let base: Box<str> = match native {
            Some(symbol) => symbol.into(),
            None => name.to_string().into(),
        };
        let matches = |info: &FunctionInfo| {
            info.result == result && info.params == params && info.variadic == variadic
        };
        match self.functions.get(&base) {
            None => Ok(base),
            Some(info) if matches(info) => Ok(base),
            Some(_) => {
                let suffix = if variadic { "v" } else { "" };
                let alternate: Box<str> = format!("{base}.{}{suffix}", params.len()).into();
                match self.functions.get(&alternate) {
                    None => Ok(alternate),
                    Some(info) if matches(info) => Ok(alternate),
                    Some(_) => Err(Error::new(
                        expr.location.clone(),
                        ErrorKind::RedefinedFunction {
                            name: name.to_string(),
                        },
                    )),
                }
            }
        }
    }

    /// Emit the entry block, bind parameters to stack slots, lower the
    /// body, synthesize the return, and verify the generated function.
    fn lower_function_body(
        &mut self,
        expr: &Expr,
        symbol: &str,
        params: &[Param],
        body: &Expr,
    ) -> Result<()> {
        let info = self.functions[symbol].clone();
        if info.has_body {
            return Err(Error::new(
                expr.location.clone(),
                ErrorKind::RedefinedFunction {
                    name: symbol.to_string(),
                },
            ));
        }

        let saved = (
            self.func,
            self.block,
            self.current_result,
            self.current_variadic,
        );
        self.func = info.func;
        self.current_result = info.result;
        self.current_variadic = info.variadic;
        self.module
            .function_mut(info.func)
            .blocks
            .push(Block::new("entry"));
        self.block = crate::ir::BlockId(0);

        self.push_scope();
        for (index, param) in params.iter().enumerate() {
            let ir = self.lower_type(param.ty);
            let slot = self.emit_alloca(ir, Self::const_i64(1));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "parameter count fits in u32"
            )]
            self.emit(Instr::Store {
                ptr: Operand::Value(slot),
                value: Operand::Value(ValueId(index as u32)),
            });
            self.define(
                &Name::single(&*param.name),
                Value::lvalue(param.ty, Operand::Value(slot)),
            );
        }

        let body_value = self.lower(body)?;

        if !self.block_terminated() {
            if info.result == TypeId::VOID {
                self.terminate(Terminator::Ret(None));
            } else {
                match body_value {
                    Some(value) => {
                        let value = self.cast(value, info.result, &expr.location)?;
                        let operand = self.read(&value)?;
                        self.terminate(Terminator::Ret(Some(operand)));
                    }
                    // An unreachable trailing block (every path already
                    // returned) still needs a structural terminator.
                    None if self.is_unreachable_block(self.block) => {
                        let zero = self.zero_of(info.result);
                        self.terminate(Terminator::Ret(Some(zero)));
                    }
                    None => {
                        return Err(Error::new(
                            expr.location.clone(),
                            ErrorKind::IllegalCast {
                                from: "void".to_string(),
                                to: self.session.types.display(info.result),
                            },
                        ));
                    }
                }
            }
        }
        self.pop_scope();

        verify::verify_function(self.module.function(info.func)).map_err(|reason| {
            Error::new(
                expr.location.clone(),
                ErrorKind::VerificationFailed {
                    function: symbol.to_string(),
                    reason,
                },
            )
        })?;

        if let Some(info) = self.functions.get_mut(symbol) {
            info.has_body = true;
        }
        (
            self.func,
            self.block,
            self.current_result,
            self.current_variadic,
        ) = saved;
        tracing::debug!(function = symbol, "lowered function body");
        Ok(())
    }

    /// Lower a call.
    ///
    /// The callee is resolved against the overload set for its name: an
    /// exact (non-variadic) arity match wins, otherwise the narrowest
    /// variadic overload whose fixed-parameter count fits. Arguments are
    /// lowered left to right; fixed arguments are cast to the declared
    /// parameter types, excess variadic arguments are passed uncast.
    pub(crate) fn lower_call(
        &mut self,
        expr: &Expr,
        callee: &Name,
        args: &[Expr],
    ) -> Result<Option<Value>> {
        let key = callee.to_string();
        let undeclared = || {
            Error::new(
                expr.location.clone(),
                ErrorKind::UndeclaredFunction { name: key.clone() },
            )
        };
        let candidates: Vec<FunctionInfo> = self
            .overloads
            .get(&key)
            .ok_or_else(undeclared)?
            .iter()
            .filter_map(|symbol| self.functions.get(symbol).cloned())
            .collect();

        let chosen = candidates
            .iter()
            .find(|info| !info.variadic && info.params.len() == args.len())
            .or_else(|| {
                candidates
                    .iter()
                    .filter(|info| info.variadic && info.params.len() <= args.len())
                    .max_by_key(|info| info.params.len())
            })
            .ok_or_else(undeclared)?
            .clone();

        if !chosen.has_body && !chosen.native {
            return Err(Error::new(
                expr.location.clone(),
                ErrorKind::IncompleteFunctionCall { name: key },
            ));
        }

        let mut operands = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            if matches!(arg.kind, ExprKind::VarArgs) {
                if !self.current_variadic {
                    return Err(Error::new(
                        arg.location.clone(),
                        ErrorKind::UnsupportedNode {
                            what: "var-args forwarding outside a variadic function",
                        },
                    ));
                }
                operands.push(Operand::VaArgs);
                continue;
            }
            let value = self.lower_value(arg)?;
            if index < chosen.params.len() {
                let value = self.cast(value, chosen.params[index], &arg.location)?;
                operands.push(self.read(&value)?);
            } else {
                operands.push(self.read(&value)?);
            }
        }

        let dest = if chosen.result == TypeId::VOID {
            None
        } else {
            let ir = self.lower_type(chosen.result);
            Some(self.new_value(ir))
        };
        self.emit(Instr::Call {
            dest,
            callee: chosen.symbol.clone(),
            args: operands,
        });
        Ok(dest.map(|d| Value::rvalue(chosen.result, Operand::Value(d))))
    }
}
