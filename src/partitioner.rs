//! Partitioning (§4.7): splits the optimized IR into `pre_trial_steps`
//! (computed once) and `per_trial_steps` (computed once per Monte Carlo
//! trial).
//!
//! A step belongs in `per_trial_steps` if any of its own outputs is
//! "stochastic-tainted": it either calls a stochastic builtin directly, or
//! it consumes a variable that was itself tainted. Taint is found with a
//! fixed-point pass over the IR rather than a single forward sweep, because
//! the optimizer is free to reorder and forward values in ways that no
//! longer guarantee a tainted source appears before every one of its
//! dependents in a single linear scan.

use std::collections::HashSet;

use crate::builtins;
use crate::ir::{Expr, Ir, Step};

pub struct Partition {
    pub pre_trial_steps: Ir,
    pub per_trial_steps: Ir,
}

pub fn partition(ir: Ir) -> Partition {
    let stochastic_vars = run_tainting_pass(&ir);

    let mut pre_trial_steps = Vec::new();
    let mut per_trial_steps = Vec::new();
    for step in ir {
        if step.result().iter().any(|v| stochastic_vars.contains(v)) {
            per_trial_steps.push(step);
        } else {
            pre_trial_steps.push(step);
        }
    }

    Partition { pre_trial_steps, per_trial_steps }
}

/// Whether `step` calls a stochastic builtin anywhere in its expressions,
/// including nested non-UDF calls the IR generator leaves unlifted (e.g.
/// `multiply(base, Normal(1, 0.1))` is one `ExecutionAssignment` whose own
/// function is `multiply`, with `Normal` nested inside an argument).
fn step_calls_stochastic_builtin(step: &Step) -> bool {
    match step {
        Step::ExecutionAssignment { function, args, .. } => {
            builtins::is_stochastic_builtin(function) || args.iter().any(expr_contains_stochastic_call)
        }
        Step::ConditionalAssignment { condition, then_expr, else_expr, .. } => {
            expr_contains_stochastic_call(condition)
                || expr_contains_stochastic_call(then_expr)
                || expr_contains_stochastic_call(else_expr)
        }
        Step::JumpIfFalse { condition, .. } => expr_contains_stochastic_call(condition),
        Step::LiteralAssignment { .. } | Step::Copy { .. } | Step::Jump { .. } | Step::Label { .. } => false,
    }
}

fn expr_contains_stochastic_call(expr: &Expr) -> bool {
    match expr {
        Expr::Const(_) | Expr::Variable(_) => false,
        Expr::Call { function, args } => {
            builtins::is_stochastic_builtin(function) || args.iter().any(expr_contains_stochastic_call)
        }
        Expr::Conditional { condition, then_expr, else_expr } => {
            expr_contains_stochastic_call(condition)
                || expr_contains_stochastic_call(then_expr)
                || expr_contains_stochastic_call(else_expr)
        }
    }
}

fn run_tainting_pass(ir: &Ir) -> HashSet<String> {
    let mut tainted: HashSet<String> = HashSet::new();

    for step in ir {
        if step_calls_stochastic_builtin(step) {
            tainted.extend(step.result().iter().cloned());
        }
    }

    loop {
        let mut newly_tainted = Vec::new();
        for step in ir {
            let outputs = step.result();
            if outputs.iter().all(|v| tainted.contains(v)) {
                continue;
            }
            let inputs = step.used_variables();
            if inputs.iter().any(|v| tainted.contains(v)) {
                for v in outputs {
                    if !tainted.contains(v) {
                        newly_tainted.push(v.clone());
                    }
                }
            }
        }
        if newly_tainted.is_empty() {
            break;
        }
        tainted.extend(newly_tainted);
    }

    tainted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Expr;
    use crate::value::ConstValue;

    #[test]
    fn a_pure_constant_chain_stays_pre_trial() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(1.0), line: 1 },
            Step::ExecutionAssignment {
                result: vec!["b".into()],
                function: "identity".into(),
                args: vec![Expr::var("a")],
                line: 2,
            },
        ];
        let p = partition(ir);
        assert_eq!(p.pre_trial_steps.len(), 2);
        assert!(p.per_trial_steps.is_empty());
    }

    #[test]
    fn taint_propagates_through_a_dependent_chain() {
        let ir = vec![
            Step::ExecutionAssignment {
                result: vec!["draw".into()],
                function: "Normal".into(),
                args: vec![Expr::Const(ConstValue::Scalar(0.0)), Expr::Const(ConstValue::Scalar(1.0))],
                line: 1,
            },
            Step::ExecutionAssignment {
                result: vec!["scaled".into()],
                function: "multiply".into(),
                args: vec![Expr::var("draw"), Expr::Const(ConstValue::Scalar(2.0))],
                line: 2,
            },
            Step::LiteralAssignment { result: vec!["unrelated".into()], value: ConstValue::Scalar(9.0), line: 3 },
        ];
        let p = partition(ir);
        assert_eq!(p.per_trial_steps.len(), 2);
        assert_eq!(p.pre_trial_steps.len(), 1);
    }

    #[test]
    fn a_stochastic_call_nested_inside_another_call_still_taints_its_step() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["revenue".into()],
            function: "multiply".into(),
            args: vec![
                Expr::var("base"),
                Expr::Call {
                    function: "Normal".into(),
                    args: vec![Expr::Const(ConstValue::Scalar(1.0)), Expr::Const(ConstValue::Scalar(0.1))],
                },
            ],
            line: 1,
        }];
        let p = partition(ir);
        assert_eq!(p.per_trial_steps.len(), 1);
        assert!(p.pre_trial_steps.is_empty());
    }
}
