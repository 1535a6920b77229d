//! Reference interpreter over the emitted IR.
//!
//! Executes a [`Module`] directly, with slot-addressed memory: every
//! scalar occupies one slot, aggregates are flattened field-by-field, and
//! pointers are (allocation, slot-offset) pairs. It exists to exercise
//! lowered modules end to end in tests and debugging; real execution goes
//! through an external code generator.

use rustc_hash::FxHashMap;

use crate::ir::{
    BinOp, CastKind, CmpOp, Const, Function, GlobalInit, Instr, IrType, Module, Operand,
    Terminator,
};

/// Execution budget: instructions executed before the interpreter gives
/// up, so a malformed loop fails a test instead of hanging it.
const STEP_LIMIT: u64 = 50_000_000;

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    Int(i128),
    Float(f64),
    Ptr(Ptr),
    /// Flattened aggregate contents.
    Agg(Vec<Val>),
    Unit,
}

impl Val {
    pub fn as_int(&self) -> Result<i128, String> {
        match self {
            Val::Int(v) => Ok(*v),
            other => Err(format!("expected an integer, found {other:?}")),
        }
    }

    pub fn as_float(&self) -> Result<f64, String> {
        match self {
            Val::Float(v) => Ok(*v),
            other => Err(format!("expected a float, found {other:?}")),
        }
    }
}

/// A slot address: an allocation plus an offset in slots.
///
/// Pointers fabricated from integers carry no allocation; dereferencing
/// them fails.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ptr {
    pub alloc: Option<usize>,
    pub offset: i64,
}

struct Allocation {
    slots: Vec<Val>,
}

/// Interprets one module.
pub struct Interpreter<'m> {
    module: &'m Module,
    memory: Vec<Allocation>,
    globals: FxHashMap<Box<str>, usize>,
    steps: u64,
}

impl<'m> Interpreter<'m> {
    /// Set up global storage and run the module initializer, if present.
    pub fn new(module: &'m Module) -> Result<Self, String> {
        let mut interp = Interpreter {
            module,
            memory: Vec::new(),
            globals: FxHashMap::default(),
            steps: 0,
        };

        // First pass: storage, so global-address initializers resolve.
        for global in &module.globals {
            let size = interp.size_of(&global.ty);
            let element = interp.flatten(interp.zero_val(&global.ty), size);
            let mut slots = Vec::new();
            for _ in 0..global.count {
                slots.extend(element.iter().cloned());
            }
            let alloc = interp.allocate(slots);
            interp.globals.insert(global.name.clone(), alloc);
        }
        // Second pass: initializers.
        for global in &module.globals {
            let alloc = interp.globals[&global.name];
            match &global.init {
                GlobalInit::Zero => {}
                GlobalInit::Const(c) => {
                    let value = interp.eval_const(c)?;
                    interp.memory[alloc].slots[0] = value;
                }
                GlobalInit::Bytes(bytes) => {
                    for (i, byte) in bytes.iter().enumerate() {
                        interp.memory[alloc].slots[i] = Val::Int(i128::from(*byte));
                    }
                }
            }
        }

        if module.function_by_name(crate::builder::INIT_SYMBOL).is_some() {
            interp.call(crate::builder::INIT_SYMBOL, Vec::new())?;
        }
        Ok(interp)
    }

    /// Call a function by symbol.
    pub fn call(&mut self, symbol: &str, args: Vec<Val>) -> Result<Val, String> {
        let module = self.module;
        let func = module
            .function_by_name(symbol)
            .ok_or_else(|| format!("no function named {symbol}"))?;
        let fixed = func.sig.params.len().min(args.len());
        let varargs = args[fixed..].to_vec();
        let fixed_args = args[..fixed].to_vec();
        self.exec(func, fixed_args, &varargs)
    }

    fn exec(
        &mut self,
        func: &'m Function,
        args: Vec<Val>,
        varargs: &[Val],
    ) -> Result<Val, String> {
        if func.is_declaration() {
            return Err(format!("call to external function {}", func.name));
        }
        let mut values: Vec<Option<Val>> = vec![None; func.value_types.len()];
        for (i, arg) in args.into_iter().enumerate() {
            values[i] = Some(arg);
        }

        let mut block = 0usize;
        loop {
            let current = &func.blocks[block];
            for instr in &current.instrs {
                self.step(&func.name)?;
                self.exec_instr(instr, &mut values, varargs)?;
            }
            match current
                .terminator
                .as_ref()
                .ok_or_else(|| format!("unterminated block in {}", func.name))?
            {
                Terminator::Ret(None) => return Ok(Val::Unit),
                Terminator::Ret(Some(operand)) => {
                    return self.eval(operand, &values);
                }
                Terminator::Br(target) => block = target.0 as usize,
                Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                } => {
                    let taken = self.eval(cond, &values)?.as_int()? != 0;
                    let target = if taken { then_block } else { else_block };
                    block = target.0 as usize;
                }
            }
        }
    }

    #[allow(clippy::too_many_lines, reason = "one arm per instruction kind")]
    fn exec_instr(
        &mut self,
        instr: &Instr,
        values: &mut Vec<Option<Val>>,
        varargs: &[Val],
    ) -> Result<(), String> {
        match instr {
            Instr::Alloca { dest, ty, count } => {
                let count = self.eval(count, values)?.as_int()?;
                let size = self.size_of(ty);
                let zero = self.flatten(self.zero_val(ty), size);
                let mut slots = Vec::new();
                for _ in 0..count.max(0) {
                    slots.extend(zero.iter().cloned());
                }
                let alloc = self.allocate(slots);
                set(values, dest.0, Val::Ptr(Ptr { alloc: Some(alloc), offset: 0 }));
            }
            Instr::Load { dest, ty, ptr } => {
                let ptr = self.eval_ptr(ptr, values)?;
                let size = self.size_of(ty);
                let value = self.read_slots(ptr, size)?;
                set(values, dest.0, value);
            }
            Instr::Store { ptr, value } => {
                let target = self.eval_ptr(ptr, values)?;
                let value = self.eval(value, values)?;
                self.write_slots(target, value)?;
            }
            Instr::Bin {
                dest,
                op,
                ty,
                lhs,
                rhs,
            } => {
                let lhs = self.eval(lhs, values)?;
                let rhs = self.eval(rhs, values)?;
                let result = self.apply_bin(*op, ty, &lhs, &rhs)?;
                set(values, dest.0, result);
            }
            Instr::Cmp {
                dest,
                op,
                ty: _,
                lhs,
                rhs,
            } => {
                let lhs = self.eval(lhs, values)?;
                let rhs = self.eval(rhs, values)?;
                let result = apply_cmp(*op, &lhs, &rhs)?;
                set(values, dest.0, Val::Int(i128::from(result)));
            }
            Instr::Cast {
                dest,
                kind,
                to,
                value,
            } => {
                let value = self.eval(value, values)?;
                let result = apply_cast(*kind, to, &value)?;
                set(values, dest.0, result);
            }
            Instr::Call { dest, callee, args } => {
                let mut call_args = Vec::new();
                for arg in args {
                    if matches!(arg, Operand::VaArgs) {
                        call_args.extend(varargs.iter().cloned());
                    } else {
                        call_args.push(self.eval(arg, values)?);
                    }
                }
                let result = self.call(callee, call_args)?;
                if let Some(dest) = dest {
                    set(values, dest.0, result);
                }
            }
            Instr::Gep {
                dest,
                elem,
                base,
                index,
            } => {
                let base = match self.eval(base, values)? {
                    Val::Ptr(p) => p,
                    other => return Err(format!("gep through non-pointer {other:?}")),
                };
                let index = self.eval(index, values)?.as_int()?;
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_possible_wrap,
                    reason = "slot offsets fit in i64 for any realistic allocation"
                )]
                let offset = base.offset + (index as i64) * (self.size_of(elem) as i64);
                set(
                    values,
                    dest.0,
                    Val::Ptr(Ptr {
                        alloc: base.alloc,
                        offset,
                    }),
                );
            }
            Instr::FieldPtr {
                dest,
                aggregate,
                base,
                field,
            } => {
                let base = match self.eval(base, values)? {
                    Val::Ptr(p) => p,
                    other => return Err(format!("fieldptr through non-pointer {other:?}")),
                };
                let offset = self.field_offset(aggregate, *field)?;
                #[allow(
                    clippy::cast_possible_wrap,
                    reason = "field offsets are small"
                )]
                set(
                    values,
                    dest.0,
                    Val::Ptr(Ptr {
                        alloc: base.alloc,
                        offset: base.offset + offset as i64,
                    }),
                );
            }
        }
        Ok(())
    }

    // === Operand evaluation ===

    fn eval(&self, operand: &Operand, values: &[Option<Val>]) -> Result<Val, String> {
        match operand {
            Operand::Value(id) => values
                .get(id.0 as usize)
                .and_then(Clone::clone)
                .ok_or_else(|| format!("use of undefined value %{}", id.0)),
            Operand::Const(c) => self.eval_const(c),
            Operand::VaArgs => Err("var-args splice outside a call".to_string()),
        }
    }

    fn eval_ptr(&self, operand: &Operand, values: &[Option<Val>]) -> Result<Ptr, String> {
        match self.eval(operand, values)? {
            Val::Ptr(p) => Ok(p),
            other => Err(format!("expected a pointer, found {other:?}")),
        }
    }

    fn eval_const(&self, c: &Const) -> Result<Val, String> {
        Ok(match c {
            Const::Int { bits, value } => Val::Int(wrap_int(*bits, *value)),
            Const::Float { value, .. } => Val::Float(*value),
            Const::GlobalAddr(name) => {
                let alloc = self
                    .globals
                    .get(name)
                    .ok_or_else(|| format!("no global named {name}"))?;
                Val::Ptr(Ptr {
                    alloc: Some(*alloc),
                    offset: 0,
                })
            }
            Const::Zero(ty) => self.zero_val(ty),
        })
    }

    // === Memory ===

    fn allocate(&mut self, slots: Vec<Val>) -> usize {
        self.memory.push(Allocation { slots });
        self.memory.len() - 1
    }

    fn read_slots(&self, ptr: Ptr, size: usize) -> Result<Val, String> {
        let slots = self.slots_at(ptr, size)?;
        Ok(if size == 1 {
            slots[0].clone()
        } else {
            Val::Agg(slots.to_vec())
        })
    }

    fn write_slots(&mut self, ptr: Ptr, value: Val) -> Result<(), String> {
        let flat = match value {
            Val::Agg(parts) => parts,
            single => vec![single],
        };
        let alloc = ptr.alloc.ok_or("store through a dangling pointer")?;
        let start = usize::try_from(ptr.offset).map_err(|_| "negative pointer offset")?;
        let slots = &mut self.memory[alloc].slots;
        if start + flat.len() > slots.len() {
            return Err(format!(
                "store of {} slots at offset {start} overruns allocation of {}",
                flat.len(),
                slots.len()
            ));
        }
        slots[start..start + flat.len()].clone_from_slice(&flat);
        Ok(())
    }

    fn slots_at(&self, ptr: Ptr, size: usize) -> Result<&[Val], String> {
        let alloc = ptr.alloc.ok_or("load through a dangling pointer")?;
        let start = usize::try_from(ptr.offset).map_err(|_| "negative pointer offset")?;
        let slots = &self.memory[alloc].slots;
        if start + size > slots.len() {
            return Err(format!(
                "load of {size} slots at offset {start} overruns allocation of {}",
                slots.len()
            ));
        }
        Ok(&slots[start..start + size])
    }

    // === Layout ===

    /// Size of a type in slots.
    fn size_of(&self, ty: &IrType) -> usize {
        match ty {
            IrType::Void => 0,
            IrType::Aggregate(name) => self
                .module
                .aggregate(name)
                .and_then(|a| a.body.as_ref())
                .map_or(0, |body| body.iter().map(|t| self.size_of(t)).sum()),
            _ => 1,
        }
    }

    fn field_offset(&self, aggregate: &str, field: u32) -> Result<usize, String> {
        let body = self
            .module
            .aggregate(aggregate)
            .and_then(|a| a.body.as_ref())
            .ok_or_else(|| format!("aggregate {aggregate} has no body"))?;
        Ok(body
            .iter()
            .take(field as usize)
            .map(|t| self.size_of(t))
            .sum())
    }

    fn zero_val(&self, ty: &IrType) -> Val {
        match ty {
            IrType::Int { .. } => Val::Int(0),
            IrType::Float { .. } => Val::Float(0.0),
            IrType::Ptr(_) | IrType::Func { .. } => Val::Ptr(Ptr {
                alloc: None,
                offset: 0,
            }),
            IrType::Void => Val::Unit,
            IrType::Aggregate(name) => {
                let body = self.module.aggregate(name).and_then(|a| a.body.clone());
                Val::Agg(
                    body.unwrap_or_default()
                        .iter()
                        .flat_map(|t| self.flatten(self.zero_val(t), self.size_of(t)))
                        .collect(),
                )
            }
        }
    }

    fn flatten(&self, value: Val, size: usize) -> Vec<Val> {
        match value {
            Val::Agg(parts) => parts,
            single if size <= 1 => vec![single],
            single => vec![single],
        }
    }

    // === Arithmetic ===

    fn apply_bin(&self, op: BinOp, ty: &IrType, lhs: &Val, rhs: &Val) -> Result<Val, String> {
        match ty {
            IrType::Int { bits } => {
                let a = lhs.as_int()?;
                let b = rhs.as_int()?;
                let raw = match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::Mul => a.wrapping_mul(b),
                    BinOp::Div => {
                        if b == 0 {
                            return Err("division by zero".to_string());
                        }
                        a.wrapping_div(b)
                    }
                    BinOp::Rem => {
                        if b == 0 {
                            return Err("remainder by zero".to_string());
                        }
                        a.wrapping_rem(b)
                    }
                    BinOp::And => a & b,
                    BinOp::Or => a | b,
                    BinOp::Xor => a ^ b,
                    BinOp::Shl => shift(a, b, *bits, ShiftKind::Left),
                    BinOp::Shr => shift(a, b, *bits, ShiftKind::ArithmeticRight),
                    BinOp::LShr => shift(a, b, *bits, ShiftKind::LogicalRight),
                };
                Ok(Val::Int(wrap_int(*bits, raw)))
            }
            IrType::Float { .. } => {
                let a = lhs.as_float()?;
                let b = rhs.as_float()?;
                let raw = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                    other => return Err(format!("float {other:?} is not defined")),
                };
                Ok(Val::Float(raw))
            }
            IrType::Ptr(_) => {
                // Pointer arithmetic in slot units; the allocation comes
                // from whichever side has one.
                let (pa, pb) = (as_ptr_like(lhs)?, as_ptr_like(rhs)?);
                let offset = match op {
                    BinOp::Add => pa.offset + pb.offset,
                    BinOp::Sub => pa.offset - pb.offset,
                    other => return Err(format!("pointer {other:?} is not defined")),
                };
                Ok(Val::Ptr(Ptr {
                    alloc: pa.alloc.or(pb.alloc),
                    offset,
                }))
            }
            other => Err(format!("binary operation on {other}")),
        }
    }

    fn step(&mut self, function: &str) -> Result<(), String> {
        self.steps += 1;
        if self.steps > STEP_LIMIT {
            return Err(format!("step limit exceeded in {function}"));
        }
        Ok(())
    }
}

enum ShiftKind {
    Left,
    ArithmeticRight,
    LogicalRight,
}

fn shift(value: i128, amount: i128, bits: u32, kind: ShiftKind) -> i128 {
    let Ok(amount) = u32::try_from(amount) else {
        return 0;
    };
    if amount >= bits {
        return 0;
    }
    match kind {
        ShiftKind::Left => value.wrapping_shl(amount),
        ShiftKind::ArithmeticRight => value.wrapping_shr(amount),
        ShiftKind::LogicalRight => {
            let masked = wrap_unsigned(bits, value);
            (masked >> amount) as i128
        }
    }
}

/// Truncate to `bits` and sign-extend back into an `i128`.
fn wrap_int(bits: u32, value: i128) -> i128 {
    if bits >= 128 {
        return value;
    }
    let shift = 128 - bits;
    (value << shift) >> shift
}

fn wrap_unsigned(bits: u32, value: i128) -> u128 {
    let unsigned = value as u128;
    if bits >= 128 {
        unsigned
    } else {
        unsigned & ((1u128 << bits) - 1)
    }
}

fn as_ptr_like(value: &Val) -> Result<Ptr, String> {
    match value {
        Val::Ptr(p) => Ok(*p),
        Val::Int(v) => Ok(Ptr {
            alloc: None,
            #[allow(
                clippy::cast_possible_truncation,
                reason = "fabricated pointer offsets fit in i64"
            )]
            offset: *v as i64,
        }),
        other => Err(format!("expected a pointer-like value, found {other:?}")),
    }
}

fn apply_cmp(op: CmpOp, lhs: &Val, rhs: &Val) -> Result<bool, String> {
    let result = match (lhs, rhs) {
        (Val::Int(a), Val::Int(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (Val::Float(a), Val::Float(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (Val::Ptr(a), Val::Ptr(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a.offset < b.offset,
            CmpOp::Le => a.offset <= b.offset,
            CmpOp::Gt => a.offset > b.offset,
            CmpOp::Ge => a.offset >= b.offset,
        },
        (a, b) => return Err(format!("comparison of {a:?} and {b:?}")),
    };
    Ok(result)
}

fn apply_cast(kind: CastKind, to: &IrType, value: &Val) -> Result<Val, String> {
    Ok(match kind {
        CastKind::IntToInt => {
            let bits = int_bits(to)?;
            Val::Int(wrap_int(bits, value.as_int()?))
        }
        #[allow(
            clippy::cast_precision_loss,
            reason = "int-to-float conversion is defined to round"
        )]
        CastKind::IntToFloat => Val::Float(value.as_int()? as f64),
        CastKind::FloatToInt => {
            let bits = int_bits(to)?;
            let truncated = value.as_float()?.trunc();
            #[allow(
                clippy::cast_possible_truncation,
                reason = "out-of-range conversions wrap like the hardware would"
            )]
            let raw = truncated as i128;
            Val::Int(wrap_int(bits, raw))
        }
        CastKind::FloatToFloat => {
            let v = value.as_float()?;
            match to {
                IrType::Float { bits: 32 } => Val::Float(f64::from(v as f32)),
                _ => Val::Float(v),
            }
        }
        CastKind::IntToPtr => Val::Ptr(Ptr {
            alloc: None,
            #[allow(
                clippy::cast_possible_truncation,
                reason = "fabricated pointer offsets fit in i64"
            )]
            offset: value.as_int()? as i64,
        }),
        CastKind::PtrToInt => match value {
            Val::Ptr(p) => Val::Int(i128::from(p.offset)),
            other => return Err(format!("ptrtoint of {other:?}")),
        },
    })
}

fn int_bits(ty: &IrType) -> Result<u32, String> {
    match ty {
        IrType::Int { bits } => Ok(*bits),
        other => Err(format!("expected an integer type, found {other}")),
    }
}

fn set(values: &mut Vec<Option<Val>>, id: u32, value: Val) {
    let index = id as usize;
    if index >= values.len() {
        values.resize(index + 1, None);
    }
    values[index] = Some(value);
}
