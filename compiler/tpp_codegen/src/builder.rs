//! Builder state, dispatch, scopes, and emission helpers.

use rustc_hash::{FxHashMap, FxHashSet};
use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{Expr, ExprKind, Name, TypeId};
use tpp_types::CompilationSession;

use crate::ir::{
    Block, BlockId, Const, FuncId, Function, Instr, IrType, Module, Operand, Signature,
    Terminator, ValueId,
};
use crate::value::Value;
use crate::verify;

/// Symbol of the synthetic module initializer: module-level expressions
/// and non-constant global initializers are lowered into it.
pub const INIT_SYMBOL: &str = "module.init";

/// Per declared function: its signature pieces and definition state,
/// looked up by generated symbol.
#[derive(Clone, Debug)]
pub struct FunctionInfo {
    pub symbol: Box<str>,
    pub func: FuncId,
    pub result: TypeId,
    pub params: Vec<TypeId>,
    pub variadic: bool,
    pub has_body: bool,
    pub native: bool,
}

/// Lowers AST nodes into an IR [`Module`].
///
/// Holds the module, a cursor at the current insertion point, the scope
/// stack, and the function symbol table. One builder produces one module.
pub struct Builder<'s> {
    pub(crate) session: &'s CompilationSession,
    pub(crate) module: Module,
    /// Current insertion point.
    pub(crate) func: FuncId,
    pub(crate) block: BlockId,
    global_init: FuncId,
    /// Snapshot stack: push copies the bindings, pop restores them.
    scopes: Vec<FxHashMap<String, Value>>,
    /// Current flattened bindings.
    variables: FxHashMap<String, Value>,
    pub(crate) functions: FxHashMap<Box<str>, FunctionInfo>,
    /// Overload sets: source name to declared symbols, in declaration
    /// order.
    pub(crate) overloads: FxHashMap<String, Vec<Box<str>>>,
    /// Number of prologue allocas at the top of each function's entry
    /// block.
    prologue_len: FxHashMap<u32, usize>,
    /// Aggregates whose body is being filled (self-referential guard).
    pub(crate) filling: FxHashSet<Box<str>>,
    /// Where each aggregate was defined, for redefinition diagnostics.
    pub(crate) struct_origins: FxHashMap<Box<str>, tpp_ir::SourceLocation>,
    /// Result type of the function currently being lowered.
    pub(crate) current_result: TypeId,
    /// Whether the function currently being lowered is variadic.
    pub(crate) current_variadic: bool,
    str_count: u32,
}

impl<'s> Builder<'s> {
    pub fn new(session: &'s CompilationSession, module_name: &str) -> Self {
        let mut module = Module::new(module_name);
        let mut init = Function::declaration(
            INIT_SYMBOL,
            Signature {
                result: IrType::Void,
                params: Vec::new(),
                variadic: false,
            },
        );
        init.blocks.push(Block::new("entry"));
        let global_init = module.add_function(init);

        Builder {
            session,
            module,
            func: global_init,
            block: BlockId(0),
            global_init,
            scopes: Vec::new(),
            variables: FxHashMap::default(),
            functions: FxHashMap::default(),
            overloads: FxHashMap::default(),
            prologue_len: FxHashMap::default(),
            filling: FxHashSet::default(),
            struct_origins: FxHashMap::default(),
            current_result: TypeId::VOID,
            current_variadic: false,
            str_count: 0,
        }
    }

    /// Dispatch over the closed AST variant set.
    ///
    /// Returns the node's IR value, if it has one.
    pub fn lower(&mut self, expr: &Expr) -> Result<Option<Value>> {
        tracing::trace!(node = expr.kind.describe(), "lowering");
        match &expr.kind {
            ExprKind::DefStruct { name, fields } => self.lower_def_struct(expr, name, fields),
            ExprKind::DefFunction {
                result,
                name,
                params,
                variadic,
                native,
                body,
            } => self.lower_def_function(
                expr,
                *result,
                name,
                params,
                *variadic,
                native.as_deref(),
                body.as_deref(),
            ),
            ExprKind::DefVariable {
                ty,
                name,
                size,
                init,
            } => self.lower_def_variable(expr, *ty, name, size.as_deref(), init.as_deref()),
            ExprKind::Return { value } => self.lower_return(expr, value),
            ExprKind::For {
                from,
                to,
                step,
                binding,
                body,
            } => self.lower_for(expr, from, to, step.as_deref(), binding.as_deref(), body),
            ExprKind::While { condition, body } => self.lower_while(condition, body),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(expr, condition, then_branch, else_branch.as_deref()),
            ExprKind::Group { body } => self.lower_group(body),
            ExprKind::Binary { op, lhs, rhs } => {
                self.lower_binary(expr, op, lhs, rhs).map(Some)
            }
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args),
            ExprKind::Index { base, index } => self.lower_index(expr, base, index).map(Some),
            ExprKind::Member { base, member } => self.lower_member(expr, base, member).map(Some),
            ExprKind::Ident { name } => self.lower_ident(expr, name).map(Some),
            ExprKind::Number { value } => Ok(Some(self.lower_number(*value))),
            ExprKind::Char { value } => Ok(Some(Value::rvalue(
                TypeId::I8,
                Operand::Const(Const::Int {
                    bits: 8,
                    value: i128::from(u32::from(*value)),
                }),
            ))),
            ExprKind::Str { value } => Ok(Some(self.lower_str(value))),
            ExprKind::VarArgs => Err(Error::new(
                expr.location.clone(),
                ErrorKind::UnsupportedNode {
                    what: "var-args reference outside a call argument",
                },
            )),
            ExprKind::Unary { op, operand } => self.lower_unary(expr, op, operand).map(Some),
            ExprKind::Object { .. } => Err(Error::new(
                expr.location.clone(),
                ErrorKind::UnsupportedNode {
                    what: "object literal without a struct-typed context",
                },
            )),
            ExprKind::ArrayLit { .. } => Err(Error::new(
                expr.location.clone(),
                ErrorKind::UnsupportedNode {
                    what: "array literal without an element type",
                },
            )),
        }
    }

    /// The module as built so far.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Terminate the module initializer, verify it, and hand the module
    /// over.
    pub fn finish(mut self) -> Result<Module> {
        self.func = self.global_init;
        if !self.block_terminated() {
            self.terminate(Terminator::Ret(None));
        }
        let init = self.module.function(self.global_init);
        verify::verify_function(init).map_err(|reason| {
            Error::unlocated(ErrorKind::VerificationFailed {
                function: INIT_SYMBOL.to_string(),
                reason,
            })
        })?;
        tracing::debug!(module = %self.module.name, "module finished");
        Ok(self.module)
    }

    // === Cursor and emission ===

    pub(crate) fn is_global(&self) -> bool {
        self.func == self.global_init
    }

    pub(crate) fn emit(&mut self, instr: Instr) {
        let block = self.block.0 as usize;
        self.module.function_mut(self.func).blocks[block]
            .instrs
            .push(instr);
    }

    pub(crate) fn new_value(&mut self, ty: IrType) -> ValueId {
        self.module.function_mut(self.func).new_value(ty)
    }

    pub(crate) fn new_block(&mut self, label: &str) -> BlockId {
        let function = self.module.function_mut(self.func);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "functions never hold u32::MAX blocks"
        )]
        let id = BlockId(function.blocks.len() as u32);
        function.blocks.push(Block::new(format!("{label}.{}", id.0)));
        id
    }

    pub(crate) fn switch_to(&mut self, block: BlockId) {
        self.block = block;
    }

    /// Set the current block's terminator unless it already has one.
    pub(crate) fn terminate(&mut self, terminator: Terminator) {
        let block = self.block.0 as usize;
        let slot = &mut self.module.function_mut(self.func).blocks[block].terminator;
        if slot.is_none() {
            *slot = Some(terminator);
        }
    }

    pub(crate) fn block_terminated(&self) -> bool {
        self.module.function(self.func).blocks[self.block.0 as usize]
            .terminator
            .is_some()
    }

    /// Reserve stack storage.
    ///
    /// Constant-size allocas go to the function's prologue region at the
    /// top of the entry block, wherever the cursor currently is; dynamic
    /// sizes are emitted at the cursor because their count is computed by
    /// preceding code.
    pub(crate) fn emit_alloca(&mut self, elem: IrType, count: Operand) -> ValueId {
        let dest = self.new_value(IrType::ptr_to(elem.clone()));
        let instr = Instr::Alloca {
            dest,
            ty: elem,
            count: count.clone(),
        };
        if matches!(count, Operand::Const(_)) {
            let at = self.prologue_len.entry(self.func.0).or_insert(0);
            let position = *at;
            *at += 1;
            self.module.function_mut(self.func).blocks[0]
                .instrs
                .insert(position, instr);
        } else {
            self.emit(instr);
        }
        dest
    }

    // === Scopes ===

    /// Enter a block scope: the new frame starts as a copy of the current
    /// bindings.
    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(self.variables.clone());
    }

    /// Leave a block scope, restoring the pre-entry snapshot. Names
    /// introduced inside are discarded, as is any rebinding of an outer
    /// name.
    pub(crate) fn pop_scope(&mut self) {
        if let Some(saved) = self.scopes.pop() {
            self.variables = saved;
        }
    }

    pub(crate) fn define(&mut self, name: &Name, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub(crate) fn lookup(&self, name: &Name) -> Option<Value> {
        self.variables.get(&name.to_string()).cloned()
    }

    // === Value access ===

    /// Materialize a value as an operand: r-values pass through, l-values
    /// load from their storage.
    pub(crate) fn read(&mut self, value: &Value) -> Result<Operand> {
        match value {
            Value::RValue { operand, .. } => Ok(operand.clone()),
            Value::LValue { ty, ptr } => {
                let ir = self.lower_type(*ty);
                let dest = self.new_value(ir.clone());
                self.emit(Instr::Load {
                    dest,
                    ty: ir,
                    ptr: ptr.clone(),
                });
                Ok(Operand::Value(dest))
            }
        }
    }

    /// Store `value` into storage of type `target_ty`, casting first.
    pub(crate) fn store_into(
        &mut self,
        target_ty: TypeId,
        ptr: Operand,
        value: Value,
        location: &tpp_ir::SourceLocation,
    ) -> Result<()> {
        let value = self.cast(value, target_ty, location)?;
        let operand = self.read(&value)?;
        self.emit(Instr::Store {
            ptr,
            value: operand,
        });
        Ok(())
    }

    /// Lower an expression that must produce a value.
    pub(crate) fn lower_value(&mut self, expr: &Expr) -> Result<Value> {
        self.lower(expr)?.ok_or_else(|| {
            Error::new(
                expr.location.clone(),
                ErrorKind::UnsupportedNode {
                    what: "expression that yields no value",
                },
            )
        })
    }

    // === Constants ===

    pub(crate) fn const_i64(value: i64) -> Operand {
        Operand::Const(Const::Int {
            bits: 64,
            value: i128::from(value),
        })
    }

    pub(crate) fn const_i1(value: bool) -> Operand {
        Operand::Const(Const::Int {
            bits: 1,
            value: i128::from(value),
        })
    }

    /// The zero value of a semantic type (the default initializer).
    pub(crate) fn zero_of(&mut self, ty: TypeId) -> Operand {
        let ir = self.lower_type(ty);
        Operand::Const(Const::Zero(ir))
    }

    // === Literals ===

    fn lower_number(&mut self, value: tpp_ir::NumberLit) -> Value {
        match value {
            tpp_ir::NumberLit::Int(v) => Value::rvalue(
                TypeId::I64,
                Operand::Const(Const::Int {
                    bits: 64,
                    value: i128::from(v),
                }),
            ),
            tpp_ir::NumberLit::Float(v) => Value::rvalue(
                TypeId::F64,
                Operand::Const(Const::Float { bits: 64, value: v }),
            ),
        }
    }

    /// A string literal becomes a NUL-terminated byte global; its value
    /// is an `[i8]` pointing at the data.
    fn lower_str(&mut self, text: &str) -> Value {
        let name: Box<str> = format!("str.{}", self.str_count).into();
        self.str_count += 1;
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "byte length of a source literal fits in u64"
        )]
        let count = bytes.len() as u64;
        self.module.add_global(crate::ir::Global {
            name: name.clone(),
            ty: IrType::I8,
            count,
            init: crate::ir::GlobalInit::Bytes(bytes),
        });
        let ty = self.session.types.array_of(TypeId::I8);
        Value::rvalue(ty, Operand::Const(Const::GlobalAddr(name)))
    }

    fn lower_ident(&mut self, expr: &Expr, name: &Name) -> Result<Value> {
        self.lookup(name).ok_or_else(|| {
            Error::new(
                expr.location.clone(),
                ErrorKind::UndeclaredVariable {
                    name: name.to_string(),
                },
            )
        })
    }
}
