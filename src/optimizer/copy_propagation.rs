//! Copy propagation (§4.6 pass 1).
//!
//! The IR generator binds every inlined UDF parameter through a synthetic
//! `let __f_1__p = identity(arg)` step. This pass finds those — mangled
//! targets starting with `__` — forwards `arg` into every later use of
//! `__f_1__p`, and drops the now-dead binding.

use std::collections::HashMap;

use crate::ir::{Expr, Ir, Step};

pub fn run(ir: Ir) -> Ir {
    let mut replacements: HashMap<String, Expr> = HashMap::new();
    let mut drop: Vec<bool> = vec![false; ir.len()];

    for (i, step) in ir.iter().enumerate() {
        if let Step::ExecutionAssignment { result, function, args, .. } = step {
            if function == "identity" && result.len() == 1 && result[0].starts_with("__") {
                replacements.insert(result[0].clone(), args[0].clone());
                drop[i] = true;
            }
        }
    }

    if replacements.is_empty() {
        return ir;
    }

    resolve_chains(&mut replacements);

    ir.into_iter()
        .enumerate()
        .filter(|(i, _)| !drop[*i])
        .map(|(_, step)| substitute_step(step, &replacements))
        .collect()
}

/// A replaced value that is itself just a bare variable reference to
/// another replaced temporary needs to be followed to its final value
/// before substitution, or the later temporary would survive.
fn resolve_chains(map: &mut HashMap<String, Expr>) {
    loop {
        let mut changed = false;
        let snapshot = map.clone();
        for (k, v) in &snapshot {
            if let Expr::Variable(name) = v {
                if let Some(target) = snapshot.get(name) {
                    if target != v {
                        map.insert(k.clone(), target.clone());
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
}

fn substitute_step(step: Step, map: &HashMap<String, Expr>) -> Step {
    match step {
        Step::ExecutionAssignment { result, function, args, line } => Step::ExecutionAssignment {
            result,
            function,
            args: args.into_iter().map(|a| substitute_expr(a, map)).collect(),
            line,
        },
        Step::ConditionalAssignment { result, condition, then_expr, else_expr, line } => {
            Step::ConditionalAssignment {
                result,
                condition: substitute_expr(condition, map),
                then_expr: substitute_expr(then_expr, map),
                else_expr: substitute_expr(else_expr, map),
                line,
            }
        }
        Step::JumpIfFalse { condition, target, line } => {
            Step::JumpIfFalse { condition: substitute_expr(condition, map), target, line }
        }
        other => other,
    }
}

fn substitute_expr(expr: Expr, map: &HashMap<String, Expr>) -> Expr {
    match expr {
        Expr::Variable(name) => map.get(&name).cloned().unwrap_or(Expr::Variable(name)),
        Expr::Call { function, args } => {
            Expr::Call { function, args: args.into_iter().map(|a| substitute_expr(a, map)).collect() }
        }
        Expr::Conditional { condition, then_expr, else_expr } => Expr::Conditional {
            condition: Box::new(substitute_expr(*condition, map)),
            then_expr: Box::new(substitute_expr(*then_expr, map)),
            else_expr: Box::new(substitute_expr(*else_expr, map)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ConstValue;

    #[test]
    fn forwards_a_parameter_binding_and_drops_it() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["y".into()], value: ConstValue::Scalar(4.0), line: 1 },
            Step::ExecutionAssignment {
                result: vec!["__f_1__p".into()],
                function: "identity".into(),
                args: vec![Expr::var("y")],
                line: 2,
            },
            Step::ExecutionAssignment {
                result: vec!["z".into()],
                function: "add".into(),
                args: vec![Expr::var("__f_1__p"), Expr::var("__f_1__p")],
                line: 3,
            },
        ];
        let out = run(ir);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1],
            Step::ExecutionAssignment {
                result: vec!["z".into()],
                function: "add".into(),
                args: vec![Expr::var("y"), Expr::var("y")],
                line: 3,
            }
        );
    }

    #[test]
    fn leaves_unmangled_identities_alone() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["x".into()],
            function: "identity".into(),
            args: vec![Expr::Const(ConstValue::Scalar(1.0))],
            line: 1,
        }];
        let out = run(ir.clone());
        assert_eq!(out, ir);
    }
}
