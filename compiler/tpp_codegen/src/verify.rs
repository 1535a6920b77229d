//! Structural verification of generated functions.
//!
//! Plays the role module verification plays in a production backend:
//! catches malformed output of the builder before it is handed to a code
//! generator. Failures surface as `VerificationFailed`.

use crate::ir::{Function, Instr, IrType, Operand, Terminator};

/// Check one function: every block terminated, every branch target and
/// operand in range, return arity matching the signature.
pub fn verify_function(func: &Function) -> Result<(), String> {
    if func.is_declaration() {
        return Ok(());
    }
    let block_count = func.blocks.len();

    for block in &func.blocks {
        for instr in &block.instrs {
            for operand in instr_operands(instr) {
                check_operand(func, operand)
                    .map_err(|e| format!("in block {}: {e}", block.label))?;
            }
            for dest in instr_dests(instr) {
                if dest as usize >= func.value_types.len() {
                    return Err(format!(
                        "in block {}: destination %{dest} has no recorded type",
                        block.label
                    ));
                }
            }
        }

        match &block.terminator {
            None => return Err(format!("block {} is not terminated", block.label)),
            Some(Terminator::Ret(operand)) => {
                let is_void = func.sig.result == IrType::Void;
                match operand {
                    None if !is_void => {
                        return Err(format!(
                            "block {} returns no value from a non-void function",
                            block.label
                        ));
                    }
                    Some(_) if is_void => {
                        return Err(format!(
                            "block {} returns a value from a void function",
                            block.label
                        ));
                    }
                    Some(operand) => check_operand(func, operand)
                        .map_err(|e| format!("in block {}: {e}", block.label))?,
                    None => {}
                }
            }
            Some(Terminator::Br(target)) => {
                if target.0 as usize >= block_count {
                    return Err(format!(
                        "block {} branches to missing block b{}",
                        block.label, target.0
                    ));
                }
            }
            Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            }) => {
                check_operand(func, cond)
                    .map_err(|e| format!("in block {}: {e}", block.label))?;
                for target in [then_block, else_block] {
                    if target.0 as usize >= block_count {
                        return Err(format!(
                            "block {} branches to missing block b{}",
                            block.label, target.0
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_operand(func: &Function, operand: &Operand) -> Result<(), String> {
    match operand {
        Operand::Value(id) => {
            if id.0 as usize >= func.value_types.len() {
                return Err(format!("operand %{} has no recorded type", id.0));
            }
            Ok(())
        }
        Operand::Const(_) | Operand::VaArgs => Ok(()),
    }
}

fn instr_operands(instr: &Instr) -> Vec<&Operand> {
    match instr {
        Instr::Alloca { count, .. } => vec![count],
        Instr::Load { ptr, .. } => vec![ptr],
        Instr::Store { ptr, value } => vec![ptr, value],
        Instr::Bin { lhs, rhs, .. } | Instr::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
        Instr::Cast { value, .. } => vec![value],
        Instr::Call { args, .. } => args.iter().collect(),
        Instr::Gep { base, index, .. } => vec![base, index],
        Instr::FieldPtr { base, .. } => vec![base],
    }
}

fn instr_dests(instr: &Instr) -> Vec<u32> {
    match instr {
        Instr::Alloca { dest, .. }
        | Instr::Load { dest, .. }
        | Instr::Bin { dest, .. }
        | Instr::Cmp { dest, .. }
        | Instr::Cast { dest, .. }
        | Instr::Gep { dest, .. }
        | Instr::FieldPtr { dest, .. } => vec![dest.0],
        Instr::Call { dest, .. } => dest.iter().map(|d| d.0).collect(),
        Instr::Store { .. } => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, BlockId, Signature, ValueId};

    fn void_sig() -> Signature {
        Signature {
            result: IrType::Void,
            params: Vec::new(),
            variadic: false,
        }
    }

    #[test]
    fn declarations_verify_trivially() {
        let func = Function::declaration("f", void_sig());
        assert_eq!(verify_function(&func), Ok(()));
    }

    #[test]
    fn unterminated_block_is_rejected() {
        let mut func = Function::declaration("f", void_sig());
        func.blocks.push(Block::new("entry"));
        let err = verify_function(&func).expect_err("must fail");
        assert!(err.contains("not terminated"));
    }

    #[test]
    fn branch_target_must_exist() {
        let mut func = Function::declaration("f", void_sig());
        let mut entry = Block::new("entry");
        entry.terminator = Some(Terminator::Br(BlockId(7)));
        func.blocks.push(entry);
        let err = verify_function(&func).expect_err("must fail");
        assert!(err.contains("missing block"));
    }

    #[test]
    fn return_arity_must_match_signature() {
        let mut func = Function::declaration(
            "f",
            Signature {
                result: IrType::Int { bits: 32 },
                params: Vec::new(),
                variadic: false,
            },
        );
        let mut entry = Block::new("entry");
        entry.terminator = Some(Terminator::Ret(None));
        func.blocks.push(entry);
        let err = verify_function(&func).expect_err("must fail");
        assert!(err.contains("non-void"));
    }

    #[test]
    fn operands_need_recorded_types() {
        let mut func = Function::declaration("f", void_sig());
        let mut entry = Block::new("entry");
        entry.instrs.push(Instr::Store {
            ptr: Operand::Value(ValueId(3)),
            value: Operand::Value(ValueId(4)),
        });
        entry.terminator = Some(Terminator::Ret(None));
        func.blocks.push(entry);
        let err = verify_function(&func).expect_err("must fail");
        assert!(err.contains("no recorded type"));
    }
}
