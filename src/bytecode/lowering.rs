//! Lowering (§4.8(8a)): flattens nested expressions into a strictly linear
//! sequence of simple instructions, decomposes variadic calls into a
//! left-folded chain of binary ones, and rewrites `conditional_assignment`
//! and `identity` into the procedural shapes the emitter expects
//! (`jump`/`jump_if_false`/`label` and `copy`).
//!
//! This is the one stage that mutates the symbol table in place: every
//! lifted sub-expression needs a fresh, typed temporary registered so the
//! resource allocator can see it later.

use crate::builtins;
use crate::error::InternalError;
use crate::ir::{CopySource, Expr, Ir, Step};
use crate::partitioner::Partition;
use crate::symbols::{GlobalVariable, SymbolTable};
use crate::types::Type;

const VARIADIC_FUNCTIONS: [&str; 4] = ["add", "multiply", "__and__", "__or__"];

pub struct LoweredIr {
    pub pre_trial_steps: Ir,
    pub per_trial_steps: Ir,
}

struct LowerCtx<'a> {
    table: &'a mut SymbolTable,
    temp_counter: usize,
    label_counter: usize,
}

impl LowerCtx<'_> {
    fn new_temp(&mut self, ty: Type, is_stochastic: bool, line: usize) -> Result<String, InternalError> {
        match ty {
            Type::Any => {
                return Err(InternalError::new(
                    "lowering attempted to create a temporary with an unresolved 'any' type",
                ));
            }
            Type::Tuple(_) => {
                return Err(InternalError::new(
                    "lowering attempted to create a temporary binding a multi-value result",
                ));
            }
            _ => {}
        }
        self.temp_counter += 1;
        let name = format!("__temp_lifted_{}", self.temp_counter);
        self.table.global_variables.insert(name.clone(), GlobalVariable {
            line,
            source_path: self.table.main_file_path.clone(),
            inferred_type: Some(ty),
            is_stochastic: Some(is_stochastic),
        });
        Ok(name)
    }

    fn next_label_pair(&mut self) -> (String, String) {
        let base = self.label_counter;
        self.label_counter += 2;
        (format!("__else_label_{base}"), format!("__end_label_{}", base + 1))
    }
}

pub fn lower(partition: Partition, table: &mut SymbolTable) -> Result<LoweredIr, InternalError> {
    let mut ctx = LowerCtx { table, temp_counter: 0, label_counter: 0 };
    let pre_trial_steps = lower_ir_list(partition.pre_trial_steps, &mut ctx)?;
    let per_trial_steps = lower_ir_list(partition.per_trial_steps, &mut ctx)?;
    Ok(LoweredIr { pre_trial_steps, per_trial_steps })
}

fn lower_ir_list(ir: Ir, ctx: &mut LowerCtx) -> Result<Ir, InternalError> {
    let flattened = flatten_ir_list(ir, ctx)?;
    lower_control_flow(flattened, ctx)
}

fn flatten_ir_list(ir: Ir, ctx: &mut LowerCtx) -> Result<Ir, InternalError> {
    let mut out = Vec::new();
    for step in ir {
        let (mut lifted, new_step) = process_and_lift(step, ctx)?;
        out.append(&mut lifted);
        out.extend(decompose_variadic(new_step, ctx)?);
    }
    Ok(out)
}

fn process_and_lift(step: Step, ctx: &mut LowerCtx) -> Result<(Vec<Step>, Step), InternalError> {
    let mut lifted = Vec::new();
    let step = match step {
        Step::ExecutionAssignment { result, function, args, line } => {
            let mut new_args = Vec::with_capacity(args.len());
            for a in args {
                new_args.push(lift(a, &mut lifted, line, ctx)?);
            }
            Step::ExecutionAssignment { result, function, args: new_args, line }
        }
        Step::ConditionalAssignment { result, condition, then_expr, else_expr, line } => {
            let condition = lift(condition, &mut lifted, line, ctx)?;
            let then_expr = lift(then_expr, &mut lifted, line, ctx)?;
            let else_expr = lift(else_expr, &mut lifted, line, ctx)?;
            Step::ConditionalAssignment { result, condition, then_expr, else_expr, line }
        }
        Step::JumpIfFalse { condition, target, line } => {
            let condition = lift(condition, &mut lifted, line, ctx)?;
            Step::JumpIfFalse { condition, target, line }
        }
        other => other,
    };
    Ok((lifted, step))
}

/// Recursively lifts a nested call or conditional expression into its own
/// instruction, leaving behind a bare variable reference. Leaves, literals
/// and bare variables pass through unchanged.
fn lift(expr: Expr, lifted: &mut Vec<Step>, line: usize, ctx: &mut LowerCtx) -> Result<Expr, InternalError> {
    match expr {
        Expr::Const(_) | Expr::Variable(_) => Ok(expr),
        Expr::Call { function, args } => {
            let mut new_args = Vec::with_capacity(args.len());
            for a in args {
                new_args.push(lift(a, lifted, line, ctx)?);
            }
            let (ty, stochastic) =
                expr_details(&Expr::Call { function: function.clone(), args: new_args.clone() }, ctx.table)?;
            let temp = ctx.new_temp(ty, stochastic, line)?;
            lifted.push(Step::ExecutionAssignment {
                result: vec![temp.clone()],
                function,
                args: new_args,
                line,
            });
            Ok(Expr::Variable(temp))
        }
        Expr::Conditional { condition, then_expr, else_expr } => {
            let condition = lift(*condition, lifted, line, ctx)?;
            let then_expr = lift(*then_expr, lifted, line, ctx)?;
            let else_expr = lift(*else_expr, lifted, line, ctx)?;
            let (ty, stochastic) = expr_details(
                &Expr::Conditional {
                    condition: Box::new(condition.clone()),
                    then_expr: Box::new(then_expr.clone()),
                    else_expr: Box::new(else_expr.clone()),
                },
                ctx.table,
            )?;
            let temp = ctx.new_temp(ty, stochastic, line)?;
            lifted.push(Step::ConditionalAssignment {
                result: vec![temp.clone()],
                condition,
                then_expr,
                else_expr,
                line,
            });
            Ok(Expr::Variable(temp))
        }
    }
}

fn decompose_variadic(step: Step, ctx: &mut LowerCtx) -> Result<Vec<Step>, InternalError> {
    let Step::ExecutionAssignment { result, function, args, line } = step else {
        return Ok(vec![step]);
    };
    if !VARIADIC_FUNCTIONS.contains(&function.as_str()) || args.len() <= 2 {
        return Ok(vec![Step::ExecutionAssignment { result, function, args, line }]);
    }

    let sig = builtins::lookup(&function)
        .ok_or_else(|| InternalError::new(format!("unknown variadic function '{function}' during lowering")))?;

    let mut decomposed = Vec::new();
    let mut current = args[0].clone();
    let n = args.len();
    for (i, arg) in args.into_iter().enumerate().skip(1) {
        let is_last = i == n - 1;
        let result_i = if is_last {
            result.clone()
        } else {
            let (left_ty, left_stoch) = expr_details(&current, ctx.table)?;
            let (right_ty, right_stoch) = expr_details(&arg, ctx.table)?;
            let ret_ty = sig.return_type_for(&[left_ty, right_ty]);
            vec![ctx.new_temp(ret_ty, left_stoch || right_stoch, line)?]
        };
        decomposed.push(Step::ExecutionAssignment {
            result: result_i.clone(),
            function: function.clone(),
            args: vec![current.clone(), arg],
            line,
        });
        current = Expr::Variable(result_i.into_iter().next().unwrap());
    }
    Ok(decomposed)
}

fn lower_control_flow(ir: Ir, ctx: &mut LowerCtx) -> Result<Ir, InternalError> {
    let mut out = Vec::new();
    for step in ir {
        match step {
            Step::ConditionalAssignment { result, condition, then_expr, else_expr, line } => {
                out.extend(lower_one_conditional(result, condition, then_expr, else_expr, line, ctx));
            }
            Step::ExecutionAssignment { result, function, args, line } if function == "identity" => {
                out.extend(lower_identity(result, args, line)?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn lower_one_conditional(
    result: Vec<String>,
    condition: Expr,
    then_expr: Expr,
    else_expr: Expr,
    line: usize,
    ctx: &mut LowerCtx,
) -> Vec<Step> {
    let (else_label, end_label) = ctx.next_label_pair();
    vec![
        Step::JumpIfFalse { condition, target: else_label.clone(), line },
        assignment_from_expr(result.clone(), then_expr, line),
        Step::Jump { target: end_label.clone(), line },
        Step::Label { name: else_label, line },
        assignment_from_expr(result, else_expr, line),
        Step::Label { name: end_label, line },
    ]
}

fn assignment_from_expr(result: Vec<String>, expr: Expr, line: usize) -> Step {
    match expr {
        Expr::Call { function, args } => Step::ExecutionAssignment { result, function, args, line },
        Expr::Variable(name) => Step::Copy { result, source: CopySource::Single(name), line },
        Expr::Const(value) => Step::LiteralAssignment { result, value, line },
        Expr::Conditional { .. } => {
            unreachable!("conditional branches are lifted before control-flow lowering")
        }
    }
}

fn lower_identity(result: Vec<String>, args: Vec<Expr>, line: usize) -> Result<Vec<Step>, InternalError> {
    if result.len() == 1 {
        let value = args
            .into_iter()
            .next()
            .ok_or_else(|| InternalError::new("identity call with no argument during lowering"))?;
        return Ok(vec![single_binding(result, value, line)?]);
    }
    if args.len() != result.len() {
        return Err(InternalError::new("identity call result/argument arity mismatch during lowering"));
    }
    result.into_iter().zip(args).map(|(r, a)| single_binding(vec![r], a, line)).collect()
}

fn single_binding(result: Vec<String>, value: Expr, line: usize) -> Result<Step, InternalError> {
    match value {
        Expr::Variable(name) => Ok(Step::Copy { result, source: CopySource::Single(name), line }),
        Expr::Const(value) => Ok(Step::LiteralAssignment { result, value, line }),
        _ => Err(InternalError::new("identity call argument was not a simple value after flattening")),
    }
}

/// The type and stochastic-taint of an IR expression, resolved against the
/// symbol table. Used both to size a freshly lifted temporary and to decide
/// a decomposed binary op's intermediate type.
pub(super) fn expr_details(expr: &Expr, table: &SymbolTable) -> Result<(Type, bool), InternalError> {
    match expr {
        Expr::Const(c) => Ok((c.type_of(), false)),
        Expr::Variable(name) => variable_info(table, name),
        Expr::Call { function, args } => {
            let sig = builtins::lookup(function)
                .ok_or_else(|| InternalError::new(format!("unknown function '{function}' during lowering")))?;
            let mut stochastic = sig.is_stochastic;
            let mut arg_types = Vec::with_capacity(args.len());
            for a in args {
                let (t, s) = expr_details(a, table)?;
                stochastic |= s;
                arg_types.push(t);
            }
            Ok((sig.return_type_for(&arg_types), stochastic))
        }
        Expr::Conditional { condition, then_expr, else_expr } => {
            let (_, cond_stoch) = expr_details(condition, table)?;
            let (then_ty, then_stoch) = expr_details(then_expr, table)?;
            let (_, else_stoch) = expr_details(else_expr, table)?;
            Ok((then_ty, cond_stoch || then_stoch || else_stoch))
        }
    }
}

/// Resolves a variable's type either as a global (including temporaries
/// already registered by an earlier lowering step) or as a mangled
/// UDF-local. Falls back to `scalar` for an IR-generator-introduced
/// `__temp_N` that never got a model entry — the same blind spot the
/// reference lowerer has, since those names never flow through type
/// inference.
pub(super) fn variable_info(table: &SymbolTable, name: &str) -> Result<(Type, bool), InternalError> {
    if let Some(gv) = table.global_variables.get(name) {
        let ty = gv
            .inferred_type
            .clone()
            .ok_or_else(|| InternalError::new(format!("variable '{name}' has no inferred type")))?;
        return Ok((ty, gv.is_stochastic.unwrap_or(false)));
    }
    if let Some((func, local)) = mangled_parts(name) {
        if let Some((ty, stochastic)) =
            table.local_types.get(&func).and_then(|locals| locals.get(&local))
        {
            return Ok((ty.clone(), *stochastic));
        }
    }
    if name.starts_with("__temp_") {
        return Ok((Type::Scalar, false));
    }
    Err(InternalError::new(format!("could not resolve type for variable '{name}' during bytecode generation")))
}

/// Splits a UDF-inlining mangled name `__<func>_<call-count>__<local>` into
/// its function and local-variable parts.
fn mangled_parts(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix("__")?;
    let sep = rest.find("__")?;
    let (func_and_count, local) = rest.split_at(sep);
    let local = &local[2..];
    let digits_start = func_and_count.rfind('_')?;
    let (func, count) = func_and_count.split_at(digits_start);
    let count = &count[1..];
    if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) {
        Some((func.to_string(), local.to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ConstValue;
    use std::path::PathBuf;

    fn table() -> SymbolTable {
        SymbolTable { main_file_path: PathBuf::from("main.vs"), ..Default::default() }
    }

    fn partition_of(ir: Ir) -> Partition {
        Partition { pre_trial_steps: ir, per_trial_steps: Vec::new() }
    }

    #[test]
    fn lifts_a_nested_call_into_its_own_temporary() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["x".into()],
            function: "add".into(),
            args: vec![
                Expr::Call { function: "log".into(), args: vec![Expr::Const(ConstValue::Scalar(2.0))] },
                Expr::Const(ConstValue::Scalar(1.0)),
            ],
            line: 1,
        }];
        let mut table = table();
        let out = lower(partition_of(ir), &mut table).unwrap();
        assert_eq!(out.pre_trial_steps.len(), 2);
        assert!(matches!(&out.pre_trial_steps[0], Step::ExecutionAssignment { function, .. } if function == "log"));
        assert!(matches!(&out.pre_trial_steps[1], Step::ExecutionAssignment { function, .. } if function == "add"));
    }

    #[test]
    fn decomposes_a_three_argument_add_into_a_binary_chain() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["total".into()],
            function: "add".into(),
            args: vec![
                Expr::Const(ConstValue::Scalar(1.0)),
                Expr::Const(ConstValue::Scalar(2.0)),
                Expr::Const(ConstValue::Scalar(3.0)),
            ],
            line: 1,
        }];
        let mut table = table();
        let out = lower(partition_of(ir), &mut table).unwrap();
        assert_eq!(out.pre_trial_steps.len(), 2);
        assert_eq!(out.pre_trial_steps.last().unwrap().result(), &["total".to_string()]);
    }

    #[test]
    fn rewrites_a_conditional_assignment_into_jumps_and_labels() {
        let ir = vec![Step::ConditionalAssignment {
            result: vec!["x".into()],
            condition: Expr::var("c"),
            then_expr: Expr::Const(ConstValue::Scalar(1.0)),
            else_expr: Expr::Const(ConstValue::Scalar(2.0)),
            line: 1,
        }];
        let mut table = table();
        table.global_variables.insert("c".into(), GlobalVariable {
            line: 1,
            source_path: PathBuf::from("main.vs"),
            inferred_type: Some(Type::Boolean),
            is_stochastic: Some(false),
        });
        let out = lower(partition_of(ir), &mut table).unwrap();
        assert_eq!(out.pre_trial_steps.len(), 6);
        assert!(matches!(out.pre_trial_steps[0], Step::JumpIfFalse { .. }));
        assert!(matches!(out.pre_trial_steps[5], Step::Label { .. }));
    }

    #[test]
    fn rewrites_identity_of_a_variable_into_a_copy() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["y".into()],
            function: "identity".into(),
            args: vec![Expr::var("x")],
            line: 1,
        }];
        let mut table = table();
        table.global_variables.insert("x".into(), GlobalVariable {
            line: 1,
            source_path: PathBuf::from("main.vs"),
            inferred_type: Some(Type::Scalar),
            is_stochastic: Some(false),
        });
        let out = lower(partition_of(ir), &mut table).unwrap();
        assert_eq!(out.pre_trial_steps.len(), 1);
        assert!(matches!(&out.pre_trial_steps[0], Step::Copy { source: CopySource::Single(n), .. } if n == "x"));
    }
}
