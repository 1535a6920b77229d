//! Control-flow lowering: `if`, `while`, `for`, and groups.

use tpp_diagnostic::Result;
use tpp_ir::{Expr, TypeId};

use crate::ir::{CmpOp, Instr, IrType, Operand, Terminator};
use crate::value::Value;
use crate::Builder;

impl Builder<'_> {
    /// `if [cond] then [else other]`.
    ///
    /// Both branches rejoin at a continuation block. When both branches
    /// are present, fall through, and yield values with a common promoted
    /// type, the `if` yields that value (merged through a stack slot);
    /// otherwise it yields nothing.
    pub(crate) fn lower_if(
        &mut self,
        expr: &Expr,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
    ) -> Result<Option<Value>> {
        let cond_v = self.lower_value(condition)?;
        let cond = self.truthy(cond_v, &condition.location)?;

        let then_block = self.new_block("if.then");
        let else_block = else_branch.map(|_| self.new_block("if.else"));
        let cont = self.new_block("if.end");
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block: else_block.unwrap_or(cont),
        });

        self.switch_to(then_block);
        let then_value = self.lower(then_branch)?;
        let then_end = self.block;
        let then_open = !self.block_terminated();

        let mut else_value = None;
        let mut else_end = None;
        let mut else_open = false;
        if let Some(else_expr) = else_branch {
            self.switch_to(else_block.unwrap_or(cont));
            else_value = self.lower(else_expr)?;
            else_end = Some(self.block);
            else_open = !self.block_terminated();
        }

        // Merge the branch values through a slot when both paths deliver
        // one.
        let mut merged: Option<(crate::ir::ValueId, TypeId, IrType)> = None;
        if then_open && else_open {
            if let (Some(tv), Some(ev)) = (&then_value, &else_value) {
                if let Ok(common) = self.higher_order(tv.ty(), ev.ty()) {
                    let common_ir = self.lower_type(common);
                    let slot = self.emit_alloca(common_ir.clone(), Self::const_i64(1));

                    let tv = tv.clone();
                    self.switch_to(then_end);
                    self.store_into(common, Operand::Value(slot), tv, &expr.location)?;

                    if let Some(block) = else_end {
                        let ev = ev.clone();
                        self.switch_to(block);
                        self.store_into(common, Operand::Value(slot), ev, &expr.location)?;
                    }
                    merged = Some((slot, common, common_ir));
                }
            }
        }

        self.switch_to(then_end);
        self.terminate(Terminator::Br(cont));
        if let Some(block) = else_end {
            self.switch_to(block);
            self.terminate(Terminator::Br(cont));
        }
        self.switch_to(cont);

        Ok(merged.map(|(slot, common, common_ir)| {
            let dest = self.new_value(common_ir.clone());
            self.emit(Instr::Load {
                dest,
                ty: common_ir,
                ptr: Operand::Value(slot),
            });
            Value::rvalue(common, Operand::Value(dest))
        }))
    }

    /// `while [cond] body`: the header re-evaluates the condition on
    /// every iteration.
    pub(crate) fn lower_while(&mut self, condition: &Expr, body: &Expr) -> Result<Option<Value>> {
        let header = self.new_block("while.cond");
        self.terminate(Terminator::Br(header));
        self.switch_to(header);

        let cond_v = self.lower_value(condition)?;
        let cond = self.truthy(cond_v, &condition.location)?;

        let body_block = self.new_block("while.body");
        let cont = self.new_block("while.end");
        self.terminate(Terminator::CondBr {
            cond,
            then_block: body_block,
            else_block: cont,
        });

        self.switch_to(body_block);
        self.push_scope();
        self.lower(body)?;
        self.pop_scope();
        self.terminate(Terminator::Br(header));

        self.switch_to(cont);
        Ok(None)
    }

    /// `for [from, to, step] [-> id] body`.
    ///
    /// A mutable counter starts at `from` and the loop runs while
    /// `counter < to` (strict, in the promoted common type of from, to,
    /// and step), incrementing by `step` before re-testing. The optional
    /// binding names the counter inside the body's scope. The loop yields
    /// the last body value.
    pub(crate) fn lower_for(
        &mut self,
        expr: &Expr,
        from: &Expr,
        to: &Expr,
        step: Option<&Expr>,
        binding: Option<&str>,
        body: &Expr,
    ) -> Result<Option<Value>> {
        let from_v = self.lower_value(from)?;
        let to_v = self.lower_value(to)?;
        let step_v = match step {
            Some(step) => self.lower_value(step)?,
            // The unit step.
            None => Value::rvalue(TypeId::I64, Self::const_i64(1)),
        };

        let common = self
            .higher_order(from_v.ty(), to_v.ty())
            .and_then(|c| self.higher_order(c, step_v.ty()))
            .map_err(|kind| tpp_diagnostic::Error::new(expr.location.clone(), kind))?;
        let common_ir = self.lower_type(common);

        let counter = self.emit_alloca(common_ir.clone(), Self::const_i64(1));
        self.store_into(common, Operand::Value(counter), from_v, &expr.location)?;

        // Bounds and step are evaluated once, before the loop.
        let to_v = self.cast(to_v, common, &to.location)?;
        let to_op = self.read(&to_v)?;
        let step_v = self.cast(step_v, common, &expr.location)?;
        let step_op = self.read(&step_v)?;

        let header = self.new_block("for.cond");
        self.terminate(Terminator::Br(header));
        self.switch_to(header);

        let current = self.new_value(common_ir.clone());
        self.emit(Instr::Load {
            dest: current,
            ty: common_ir.clone(),
            ptr: Operand::Value(counter),
        });
        let more = self.new_value(IrType::I1);
        self.emit(Instr::Cmp {
            dest: more,
            op: CmpOp::Lt,
            ty: common_ir.clone(),
            lhs: Operand::Value(current),
            rhs: to_op,
        });

        let body_block = self.new_block("for.body");
        let cont = self.new_block("for.end");
        self.terminate(Terminator::CondBr {
            cond: Operand::Value(more),
            then_block: body_block,
            else_block: cont,
        });

        self.switch_to(body_block);
        self.push_scope();
        if let Some(id) = binding {
            self.define(
                &tpp_ir::Name::single(id),
                Value::lvalue(common, Operand::Value(counter)),
            );
        }
        let body_value = self.lower(body)?;

        // The loop yields its last body value through a slot.
        let mut result = None;
        if !self.block_terminated() {
            if let Some(value) = body_value {
                let value_ty = value.ty();
                let value_ir = self.lower_type(value_ty);
                let slot = self.emit_alloca(value_ir.clone(), Self::const_i64(1));
                self.store_into(value_ty, Operand::Value(slot), value, &expr.location)?;
                result = Some((slot, value_ty, value_ir));
            }
        }
        self.pop_scope();

        // Increment and back-edge.
        if !self.block_terminated() {
            let current = self.new_value(common_ir.clone());
            self.emit(Instr::Load {
                dest: current,
                ty: common_ir.clone(),
                ptr: Operand::Value(counter),
            });
            let next = self.new_value(common_ir.clone());
            self.emit(Instr::Bin {
                dest: next,
                op: crate::ir::BinOp::Add,
                ty: common_ir,
                lhs: Operand::Value(current),
                rhs: step_op,
            });
            self.emit(Instr::Store {
                ptr: Operand::Value(counter),
                value: Operand::Value(next),
            });
            self.terminate(Terminator::Br(header));
        }

        self.switch_to(cont);
        Ok(result.map(|(slot, ty, ir)| {
            let dest = self.new_value(ir.clone());
            self.emit(Instr::Load {
                dest,
                ty: ir,
                ptr: Operand::Value(slot),
            });
            Value::rvalue(ty, Operand::Value(dest))
        }))
    }

    /// `( expr expr ... )`: a scope, lowered in order, yielding the last
    /// child's value.
    pub(crate) fn lower_group(&mut self, body: &[Expr]) -> Result<Option<Value>> {
        self.push_scope();
        let mut last = None;
        for child in body {
            last = self.lower(child)?;
        }
        self.pop_scope();
        Ok(last)
    }

    pub(crate) fn lower_return(&mut self, expr: &Expr, value: &Expr) -> Result<Option<Value>> {
        if self.is_global() {
            return Err(tpp_diagnostic::Error::new(
                expr.location.clone(),
                tpp_diagnostic::ErrorKind::UnsupportedNode {
                    what: "return outside a function",
                },
            ));
        }
        let v = self.lower_value(value)?;
        if self.current_result == TypeId::VOID {
            self.terminate(Terminator::Ret(None));
        } else {
            let result = self.current_result;
            let v = self.cast(v, result, &expr.location)?;
            let operand = self.read(&v)?;
            self.terminate(Terminator::Ret(Some(operand)));
        }
        // Code after a return lands in a fresh (unreachable) block.
        let cont = self.new_block("post.ret");
        self.switch_to(cont);
        Ok(None)
    }

    /// `true` when no terminator in the function branches to `block`.
    pub(crate) fn is_unreachable_block(&self, block: crate::ir::BlockId) -> bool {
        let function = self.module().function(self.func);
        !function.blocks.iter().any(|b| match &b.terminator {
            Some(Terminator::Br(t)) => *t == block,
            Some(Terminator::CondBr {
                then_block,
                else_block,
                ..
            }) => *then_block == block || *else_block == block,
            _ => false,
        })
    }

}
