//! Emission (§4.8(8c)): a two-pass "link and assemble" over the lowered
//! IR — first resolve every label to the instruction address it precedes,
//! then translate each non-label instruction into a packed `Instr`.

use std::collections::HashMap;

use crate::error::InternalError;
use crate::ir::{CopySource, Expr, Step};
use crate::types::Type;
use crate::value::ConstValue;

use super::lowering::LoweredIr;
use super::opcodes::{self, OperandType};
use super::recipe::Instr;
use super::resource_allocator::Allocation;

pub fn emit(lowered: &LoweredIr, allocation: &Allocation) -> Result<(Vec<Instr>, Vec<Instr>), InternalError> {
    let pre = emit_partition(&lowered.pre_trial_steps, allocation)?;
    let per = emit_partition(&lowered.per_trial_steps, allocation)?;
    Ok((pre, per))
}

fn emit_partition(steps: &[Step], allocation: &Allocation) -> Result<Vec<Instr>, InternalError> {
    let mut label_map: HashMap<&str, u32> = HashMap::new();
    let mut addressable: Vec<&Step> = Vec::new();
    for step in steps {
        if let Step::Label { name, .. } = step {
            label_map.insert(name.as_str(), addressable.len() as u32);
        } else {
            addressable.push(step);
        }
    }

    addressable.iter().map(|step| emit_instruction(step, &label_map, allocation)).collect()
}

fn emit_instruction(step: &Step, label_map: &HashMap<&str, u32>, allocation: &Allocation) -> Result<Instr, InternalError> {
    let line = step.line();
    match step {
        Step::LiteralAssignment { result, value, .. } => {
            let dests = vec![resolve_operand_var(&result[0], allocation)?];
            let srcs = vec![resolve_operand_const(value, allocation)?];
            let op = resolve_opcode("copy", &[var_type(&result[0], allocation)?], &[value.type_of()])?;
            Ok(Instr { op: op as u32, dests, srcs, line })
        }
        Step::Copy { result, source: CopySource::Single(src), .. } => {
            let dests = vec![resolve_operand_var(&result[0], allocation)?];
            let srcs = vec![resolve_operand_var(src, allocation)?];
            let op = resolve_opcode("copy", &[var_type(&result[0], allocation)?], &[var_type(src, allocation)?])?;
            Ok(Instr { op: op as u32, dests, srcs, line })
        }
        Step::Copy { result, source: CopySource::Multi(_), .. } => Err(InternalError::new(format!(
            "unexpected multi-source copy reaching the emitter for '{}'",
            result.join(",")
        ))),
        Step::ExecutionAssignment { result, function, args, .. } => {
            let dest_types: Vec<Type> = result.iter().map(|r| var_type(r, allocation)).collect::<Result<_, _>>()?;
            let src_types: Vec<Type> = args.iter().map(|a| expr_type(a, allocation)).collect::<Result<_, _>>()?;
            let op = resolve_opcode(function, &dest_types, &src_types)?;
            let dests = result.iter().map(|r| resolve_operand_var(r, allocation)).collect::<Result<_, _>>()?;
            let srcs = args.iter().map(|a| resolve_operand_expr(a, allocation)).collect::<Result<_, _>>()?;
            Ok(Instr { op: op as u32, dests, srcs, line })
        }
        Step::Jump { target, .. } => {
            let addr = *label_map
                .get(target.as_str())
                .ok_or_else(|| InternalError::new(format!("unresolved jump target '{target}'")))?;
            Ok(Instr { op: opcodes::OpCode::Jump as u32, dests: vec![], srcs: vec![addr], line })
        }
        Step::JumpIfFalse { condition, target, .. } => {
            let addr = *label_map
                .get(target.as_str())
                .ok_or_else(|| InternalError::new(format!("unresolved jump target '{target}'")))?;
            let cond_op = resolve_operand_expr(condition, allocation)?;
            Ok(Instr { op: opcodes::OpCode::JumpIfFalse as u32, dests: vec![], srcs: vec![cond_op, addr], line })
        }
        Step::ConditionalAssignment { .. } => Err(InternalError::new(
            "a conditional_assignment reached the emitter unlowered".to_string(),
        )),
        Step::Label { name, .. } => {
            Err(InternalError::new(format!("a label '{name}' reached the emitter as an addressable instruction")))
        }
    }
}

fn var_type(name: &str, allocation: &Allocation) -> Result<Type, InternalError> {
    allocation
        .variable_map
        .get(name)
        .map(|(t, _)| t.clone())
        .ok_or_else(|| InternalError::new(format!("no register allocated for variable '{name}'")))
}

fn expr_type(expr: &Expr, allocation: &Allocation) -> Result<Type, InternalError> {
    match expr {
        Expr::Const(value) => Ok(value.type_of()),
        Expr::Variable(name) => var_type(name, allocation),
        other => Err(InternalError::new(format!(
            "unexpected nested expression reaching the emitter: {other:?}"
        ))),
    }
}

fn resolve_operand_var(name: &str, allocation: &Allocation) -> Result<u32, InternalError> {
    let (ty, index) = allocation
        .variable_map
        .get(name)
        .cloned()
        .ok_or_else(|| InternalError::new(format!("no register allocated for variable '{name}'")))?;
    Ok(opcodes::pack_operand(register_operand_type(&ty), index))
}

fn resolve_operand_const(value: &ConstValue, allocation: &Allocation) -> Result<u32, InternalError> {
    let key = value.canonical_key();
    let (ty, index) = allocation
        .constant_map
        .get(&key)
        .cloned()
        .ok_or_else(|| InternalError::new(format!("no constant pool slot allocated for '{key}'")))?;
    Ok(opcodes::pack_operand(const_operand_type(&ty), index))
}

fn resolve_operand_expr(expr: &Expr, allocation: &Allocation) -> Result<u32, InternalError> {
    match expr {
        Expr::Const(value) => resolve_operand_const(value, allocation),
        Expr::Variable(name) => resolve_operand_var(name, allocation),
        other => Err(InternalError::new(format!("unexpected nested expression as an operand: {other:?}"))),
    }
}

fn register_operand_type(ty: &Type) -> OperandType {
    match ty {
        Type::Scalar => OperandType::ScalarReg,
        Type::Vector => OperandType::VectorReg,
        Type::Boolean => OperandType::BooleanReg,
        Type::String => OperandType::StringReg,
        other => unreachable!("non-register type {other} reached operand packing"),
    }
}

fn const_operand_type(ty: &Type) -> OperandType {
    match ty {
        Type::Scalar => OperandType::ScalarConst,
        Type::Vector => OperandType::VectorConst,
        Type::Boolean => OperandType::BooleanConst,
        Type::String => OperandType::StringConst,
        other => unreachable!("non-constant type {other} reached operand packing"),
    }
}

fn type_char(ty: &Type) -> &'static str {
    match ty {
        Type::Scalar => "S",
        Type::Vector => "V",
        Type::Boolean => "B",
        Type::String => "STR",
        other => unreachable!("non-ISA type {other} reached opcode resolution"),
    }
}

/// Builds the sanitized ISA key and resolves it. `ComposeVector` collapses
/// every source-type slot into one `S` marker regardless of arity — its
/// instruction format already carries an arbitrary-length `srcs` list, so
/// the opcode only needs to say "scalar sources", not how many.
fn resolve_opcode(function: &str, dest_types: &[Type], src_types: &[Type]) -> Result<opcodes::OpCode, InternalError> {
    let sanitized = function.strip_prefix("__").and_then(|s| s.strip_suffix("__")).unwrap_or(function);
    let dest_key: String = dest_types.iter().map(|t| type_char(t)).collect();

    let isa_key = if sanitized == "ComposeVector" {
        format!("{sanitized}_{dest_key}_S")
    } else {
        let src_key: String = src_types.iter().map(|t| type_char(t)).collect();
        format!("{sanitized}_{dest_key}_{src_key}")
    };

    opcodes::resolve(&isa_key)
        .ok_or_else(|| InternalError::new(format!("no opcode registered for instruction key '{isa_key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Expr;
    use std::collections::HashMap as Map;

    fn allocation_with(vars: &[(&str, Type, u32)], consts: &[(&str, Type, u32)]) -> Allocation {
        let mut variable_map = Map::new();
        for (name, ty, idx) in vars {
            variable_map.insert((*name).to_string(), (ty.clone(), *idx));
        }
        let mut constant_map = Map::new();
        for (key, ty, idx) in consts {
            constant_map.insert((*key).to_string(), (ty.clone(), *idx));
        }
        Allocation {
            variable_map,
            constant_map,
            register_counts: (0, 0, 0, 0),
            constant_pools: super::super::recipe::ConstantPools::default(),
        }
    }

    #[test]
    fn emits_a_literal_as_a_copy_instruction() {
        let allocation = allocation_with(&[("x", Type::Scalar, 0)], &[("s_1", Type::Scalar, 0)]);
        let step = Step::LiteralAssignment { result: vec!["x".into()], value: ConstValue::Scalar(1.0), line: 4 };
        let instr = emit_instruction(&step, &Map::new(), &allocation).unwrap();
        assert_eq!(instr.op, opcodes::OpCode::copy_S_S as u32);
        assert_eq!(instr.line, 4);
    }

    #[test]
    fn emits_a_binary_add_with_resolved_operands() {
        let allocation = allocation_with(
            &[("a", Type::Scalar, 0), ("b", Type::Scalar, 1), ("c", Type::Scalar, 2)],
            &[],
        );
        let step = Step::ExecutionAssignment {
            result: vec!["c".into()],
            function: "add".into(),
            args: vec![Expr::var("a"), Expr::var("b")],
            line: 1,
        };
        let instr = emit_instruction(&step, &Map::new(), &allocation).unwrap();
        assert_eq!(instr.op, opcodes::OpCode::add_S_SS as u32);
        assert_eq!(instr.dests.len(), 1);
        assert_eq!(instr.srcs.len(), 2);
    }

    #[test]
    fn links_a_jump_to_its_label_address() {
        let allocation = allocation_with(&[], &[]);
        let mut labels = Map::new();
        labels.insert("end", 3u32);
        let step = Step::Jump { target: "end".into(), line: 2 };
        let instr = emit_instruction(&step, &labels, &allocation).unwrap();
        assert_eq!(instr.srcs, vec![3]);
    }
}
