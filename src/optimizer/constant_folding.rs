//! Constant folding (§4.6 pass 4).
//!
//! Propagates literal values forward through a `HashMap<String, ConstValue>`
//! built as we go, evaluating any pure built-in call whose arguments are all
//! constant, and collapsing an `if` whose condition folds to a constant
//! boolean to whichever branch it picked. Runs to a fixed point: folding one
//! step can expose a new opportunity earlier steps didn't have, so a single
//! forward sweep is not enough until nothing changes.

use std::collections::HashMap;

use crate::builtins;
use crate::ir::{Expr, Ir, Step};
use crate::value::ConstValue;

pub fn run(ir: Ir) -> Ir {
    let mut current = ir;
    loop {
        let before = current.clone();
        current = one_pass(current);
        if current == before {
            break;
        }
    }
    current
}

fn one_pass(ir: Ir) -> Ir {
    let mut constants: HashMap<String, ConstValue> = HashMap::new();
    ir.into_iter().map(|step| process_step(step, &mut constants)).collect()
}

fn process_step(step: Step, constants: &mut HashMap<String, ConstValue>) -> Step {
    match step {
        Step::LiteralAssignment { result, value, line } => {
            if result.len() == 1 {
                constants.insert(result[0].clone(), value.clone());
            }
            Step::LiteralAssignment { result, value, line }
        }
        Step::ExecutionAssignment { result, function, args, line } => {
            let args: Vec<Expr> = args.into_iter().map(|a| evaluate(a, constants)).collect();
            match try_fold_call(&function, &args) {
                Some(value) => {
                    if result.len() == 1 {
                        constants.insert(result[0].clone(), value.clone());
                    }
                    Step::LiteralAssignment { result, value, line }
                }
                None => Step::ExecutionAssignment { result, function, args, line },
            }
        }
        Step::ConditionalAssignment { result, condition, then_expr, else_expr, line } => {
            let condition = evaluate(condition, constants);
            let then_expr = evaluate(then_expr, constants);
            let else_expr = evaluate(else_expr, constants);
            match &condition {
                Expr::Const(ConstValue::Boolean(b)) => {
                    let picked = if *b { then_expr } else { else_expr };
                    rewrite_as_assignment(result, picked, line, constants)
                }
                _ => Step::ConditionalAssignment { result, condition, then_expr, else_expr, line },
            }
        }
        Step::JumpIfFalse { condition, target, line } => {
            Step::JumpIfFalse { condition: evaluate(condition, constants), target, line }
        }
        other => other,
    }
}

fn rewrite_as_assignment(
    result: Vec<String>,
    value: Expr,
    line: usize,
    constants: &mut HashMap<String, ConstValue>,
) -> Step {
    match value {
        Expr::Const(c) => {
            if result.len() == 1 {
                constants.insert(result[0].clone(), c.clone());
            }
            Step::LiteralAssignment { result, value: c, line }
        }
        Expr::Call { function, args } => Step::ExecutionAssignment { result, function, args, line },
        other => Step::ExecutionAssignment { result, function: "identity".to_string(), args: vec![other], line },
    }
}

fn evaluate(expr: Expr, constants: &HashMap<String, ConstValue>) -> Expr {
    match expr {
        Expr::Variable(name) => match constants.get(&name) {
            Some(v) => Expr::Const(v.clone()),
            None => Expr::Variable(name),
        },
        Expr::Call { function, args } => {
            let args: Vec<Expr> = args.into_iter().map(|a| evaluate(a, constants)).collect();
            match try_fold_call(&function, &args) {
                Some(v) => Expr::Const(v),
                None => Expr::Call { function, args },
            }
        }
        Expr::Conditional { condition, then_expr, else_expr } => {
            let condition = evaluate(*condition, constants);
            let then_expr = evaluate(*then_expr, constants);
            let else_expr = evaluate(*else_expr, constants);
            match &condition {
                Expr::Const(ConstValue::Boolean(b)) => if *b { then_expr } else { else_expr },
                _ => Expr::Conditional {
                    condition: Box::new(condition),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
            }
        }
        other => other,
    }
}

fn try_fold_call(function: &str, args: &[Expr]) -> Option<ConstValue> {
    let values: Vec<ConstValue> = args
        .iter()
        .map(|a| match a {
            Expr::Const(c) => Some(c.clone()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    let sig = builtins::lookup(function)?;
    let folder = sig.const_folder?;
    folder(&values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_a_chain_of_arithmetic() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(2.0), line: 1 },
            Step::LiteralAssignment { result: vec!["b".into()], value: ConstValue::Scalar(3.0), line: 2 },
            Step::ExecutionAssignment {
                result: vec!["c".into()],
                function: "add".into(),
                args: vec![Expr::var("a"), Expr::var("b")],
                line: 3,
            },
            Step::ExecutionAssignment {
                result: vec!["d".into()],
                function: "multiply".into(),
                args: vec![Expr::var("c"), Expr::Const(ConstValue::Scalar(10.0))],
                line: 4,
            },
        ];
        let out = run(ir);
        assert_eq!(
            out.last().unwrap(),
            &Step::LiteralAssignment { result: vec!["d".into()], value: ConstValue::Scalar(50.0), line: 4 }
        );
    }

    #[test]
    fn leaves_division_by_zero_unfolded() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["x".into()],
            function: "divide".into(),
            args: vec![Expr::Const(ConstValue::Scalar(1.0)), Expr::Const(ConstValue::Scalar(0.0))],
            line: 1,
        }];
        let out = run(ir.clone());
        assert_eq!(out, ir);
    }

    #[test]
    fn collapses_a_constant_conditional() {
        let ir = vec![Step::ConditionalAssignment {
            result: vec!["x".into()],
            condition: Expr::Const(ConstValue::Boolean(true)),
            then_expr: Expr::Const(ConstValue::Scalar(1.0)),
            else_expr: Expr::Const(ConstValue::Scalar(2.0)),
            line: 1,
        }];
        let out = run(ir);
        assert_eq!(
            out,
            vec![Step::LiteralAssignment { result: vec!["x".into()], value: ConstValue::Scalar(1.0), line: 1 }]
        );
    }

    #[test]
    fn does_not_fold_a_stochastic_call() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["x".into()],
            function: "Normal".into(),
            args: vec![Expr::Const(ConstValue::Scalar(0.0)), Expr::Const(ConstValue::Scalar(1.0))],
            line: 1,
        }];
        let out = run(ir.clone());
        assert_eq!(out, ir);
    }
}
