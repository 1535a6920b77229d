//! Human-readable module dump.
//!
//! The format is for people and tests, not for round-tripping.

use std::fmt;

use crate::ir::{
    Block, Const, Function, Global, GlobalInit, Instr, Module, Operand, Terminator,
};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module \"{}\"", self.name)?;

        for aggregate in &self.aggregates {
            match &aggregate.body {
                Some(body) => {
                    let fields: Vec<String> = body.iter().map(ToString::to_string).collect();
                    writeln!(f, "struct %{} {{ {} }}", aggregate.name, fields.join(", "))?;
                }
                None => writeln!(f, "struct %{} opaque", aggregate.name)?,
            }
        }

        for global in &self.globals {
            write!(f, "{global}")?;
        }

        for function in &self.functions {
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global @{}: {}", self.name, self.ty)?;
        if self.count != 1 {
            write!(f, " x {}", self.count)?;
        }
        match &self.init {
            GlobalInit::Zero => writeln!(f, " = zero"),
            GlobalInit::Const(c) => writeln!(f, " = {c}"),
            GlobalInit::Bytes(bytes) => {
                writeln!(f, " = {:?}", String::from_utf8_lossy(bytes))
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\nfn @{}(", self.name)?;
        for (i, param) in self.sig.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param} %{i}")?;
        }
        if self.sig.variadic {
            if !self.sig.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ") -> {}", self.sig.result)?;

        if self.is_declaration() {
            return writeln!(f, ";");
        }
        writeln!(f, " {{")?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instrs {
            writeln!(f, "  {instr}")?;
        }
        match &self.terminator {
            Some(term) => writeln!(f, "  {term}"),
            None => writeln!(f, "  <unterminated>"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "%{}", v.0),
            Operand::Const(c) => write!(f, "{c}"),
            Operand::VaArgs => write!(f, "..."),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Int { bits, value } => write!(f, "i{bits} {value}"),
            Const::Float { bits, value } => write!(f, "f{bits} {value}"),
            Const::GlobalAddr(name) => write!(f, "@{name}"),
            Const::Zero(ty) => write!(f, "{ty} zero"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Alloca { dest, ty, count } => {
                write!(f, "%{} = alloca {ty} x {count}", dest.0)
            }
            Instr::Load { dest, ty, ptr } => write!(f, "%{} = load {ty}, {ptr}", dest.0),
            Instr::Store { ptr, value } => write!(f, "store {value}, {ptr}"),
            Instr::Bin {
                dest,
                op,
                ty,
                lhs,
                rhs,
            } => write!(f, "%{} = {} {ty} {lhs}, {rhs}", dest.0, bin_name(*op)),
            Instr::Cmp {
                dest,
                op,
                ty,
                lhs,
                rhs,
            } => write!(f, "%{} = cmp {} {ty} {lhs}, {rhs}", dest.0, cmp_name(*op)),
            Instr::Cast {
                dest,
                kind,
                to,
                value,
            } => write!(f, "%{} = cast.{kind:?} {value} to {to}", dest.0),
            Instr::Call { dest, callee, args } => {
                if let Some(dest) = dest {
                    write!(f, "%{} = ", dest.0)?;
                }
                write!(f, "call @{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instr::Gep {
                dest,
                elem,
                base,
                index,
            } => write!(f, "%{} = gep {elem}, {base}, {index}", dest.0),
            Instr::FieldPtr {
                dest,
                aggregate,
                base,
                field,
            } => write!(f, "%{} = fieldptr %{aggregate}, {base}, {field}", dest.0),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(value)) => write!(f, "ret {value}"),
            Terminator::Br(block) => write!(f, "br b{}", block.0),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "condbr {cond}, b{}, b{}", then_block.0, else_block.0),
        }
    }
}

fn bin_name(op: crate::ir::BinOp) -> &'static str {
    use crate::ir::BinOp;
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Rem => "rem",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::Shl => "shl",
        BinOp::Shr => "shr",
        BinOp::LShr => "lshr",
    }
}

fn cmp_name(op: crate::ir::CmpOp) -> &'static str {
    use crate::ir::CmpOp;
    match op {
        CmpOp::Eq => "eq",
        CmpOp::Ne => "ne",
        CmpOp::Lt => "lt",
        CmpOp::Le => "le",
        CmpOp::Gt => "gt",
        CmpOp::Ge => "ge",
    }
}
